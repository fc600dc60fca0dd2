//! Resilient client-side WebSocket sessions.
//!
//! A [`Session`] keeps one logical connection to a room alive across
//! authentication failures, refused connections, dropped sockets and silent
//! peers. Every attempt re-runs the full handshake: authenticate, open a
//! socket, then watch it with a heartbeat.
//!
//! # Features
//!
//! - **Generation guard** that turns every late completion into a no-op
//! - **Backoff tables** per stage, with separate retry budgets
//! - **Stop-retry signal** from the authenticator or the peer (close code 4000)
//! - **Heartbeat** with `PING`/`PONG` text tokens and a probe timeout
//! - **Event streams** for stage transitions and inbound messages
//! - **Pluggable transport**, with a `tokio-tungstenite` one by default
//!
//! # Example
//!
//! ```no_run
//! use roomlink::{AuthParams, Session, Stage};
//!
//! # async fn run() -> roomlink::SessionResult<()> {
//! let session = Session::builder()
//!     .host("rooms.example.com")
//!     .room("lobby")
//!     .auth(|| async { Ok(AuthParams::new().param("token", "secret")) })
//!     .build()?;
//!
//! let mut stages = session.subscribe_stages();
//! session.start();
//!
//! while let Ok(event) = stages.recv().await {
//!     if event.stage == Stage::Connected {
//!         session.send_text("hello");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Session Flow                          │
//! │                                                              │
//! │  start() ──► authenticating ──► connecting ──► connected     │
//! │                   │                 │              │         │
//! │                   ▼                 ▼              ▼         │
//! │              auth_error     connection_error   pong timeout  │
//! │                   │                 │          error / close │
//! │                   ▼                 ▼              │         │
//! │          backoff or failed  backoff or failed      │         │
//! │                   │                 │              │         │
//! │                   └────────► authenticating ◄──────┘         │
//! │                                                              │
//! │  close 4000 ──► initial (no retry)                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Stages and Status
//!
//! [`Stage`] is the fine-grained state; [`Status`] is the caller-facing
//! view derived from the stage and the [`Generation`]:
//!
//! - `initial` is [`Status::Initial`] before anything happened and
//!   [`Status::Closed`] afterwards
//! - `authenticating`, `connecting` and the two error stages are
//!   [`Status::Connecting`] in generation zero and [`Status::Reconnecting`]
//!   afterwards
//! - `failed` is [`Status::Disconnected`]
//!
//! # Logging
//!
//! Everything is logged through `tracing` with a `generation` field. Use
//! [`init_logging`] with [`RoomConfig::log_config`] to install a
//! subscriber honoring the configured [`LogLevel`].

pub mod auth;
pub mod backoff;
pub mod connect;
pub mod error;
pub mod events;
pub mod generation;
mod heartbeat;
pub mod message;
pub mod session;
pub mod stage;
pub mod timeout;
pub mod transport;
pub mod url;
pub mod ws;

// Re-exports for convenience
pub use auth::{auth_fn, AuthFn, AuthParams};
pub use backoff::{Backoff, RetryDecision};
pub use connect::{ConnectionResolver, ReadyAck};
pub use error::{CloseCode, SessionError, SessionResult};
pub use events::{EventHub, StageEvent, DEFAULT_EVENT_CAPACITY};
pub use generation::{Generation, GenerationGuard};
pub use message::{Message, PING, PONG};
pub use session::{Session, SessionBuilder};
pub use stage::{Stage, Status};
pub use timeout::with_timeout;
pub use transport::{
    BoxFuture, Outbound, PeerHandle, ReadyState, Socket, SocketId, SocketPeer, SocketSender,
    SocketSignal, Transport,
};
pub use url::RoomAddress;
pub use ws::WsTransport;

pub use roomlink_config::{ConfigError, ConfigLoader, ConnectionConfig, RoomConfig};
pub use roomlink_telemetry::{init_logging, LogConfig, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exports() {
        let _config = RoomConfig::default();
        let _params = AuthParams::new();
        let _msg = Message::text("hello");
        let _close = CloseCode::StopRetry;
        let _guard = GenerationGuard::new();
        let _transport = WsTransport::new();
        assert_eq!(Stage::default(), Stage::Initial);
    }
}
