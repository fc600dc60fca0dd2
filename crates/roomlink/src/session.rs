//! The session handle and its control surface.
//!
//! A [`Session`] owns one logical connection. All state lives behind a
//! single lock and every transition happens while holding it; the lock is
//! never held across an `.await`. Asynchronous work (authentication, socket
//! attempts, backoff timers, heartbeats, pong timeouts) runs in spawned
//! tasks that carry the [`Generation`] they were started under and re-check
//! it after taking the lock.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use roomlink_config::{ConfigError, ConnectionConfig, RoomConfig};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{auth_fn, AuthFn, AuthParams};
use crate::connect::{ConnectionResolver, ReadyAck};
use crate::error::{CloseCode, SessionResult};
use crate::events::{EventHub, StageEvent, DEFAULT_EVENT_CAPACITY};
use crate::generation::{Generation, GenerationGuard};
use crate::heartbeat::PendingProbe;
use crate::message::Message;
use crate::stage::{Stage, Status};
use crate::transport::{SocketSender, Transport};
use crate::ws::WsTransport;

/// A resilient logical connection to one room.
///
/// Cloning a session yields another handle to the same connection. When the
/// last handle is dropped the session stops as if [`stop`](Self::stop) had
/// been called: the socket is closed and every pending timer goes stale.
///
/// # Example
///
/// ```no_run
/// use roomlink::{Session, Stage};
///
/// # async fn run() -> roomlink::SessionResult<()> {
/// let session = Session::builder()
///     .host("rooms.example.com")
///     .room("lobby")
///     .auth(|| async { Ok(roomlink::AuthParams::new().param("token", "secret")) })
///     .build()?;
///
/// let mut messages = session.subscribe_messages();
/// session.start();
/// session.wait_for_stage(Stage::Connected).await;
/// session.send_text("hello");
///
/// while let Ok(message) = messages.recv().await {
///     if !message.is_pong() {
///         println!("{message:?}");
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
    _owner: Arc<Owner>,
}

/// Shared by the public handles only; spawned tasks never hold it.
struct Owner {
    inner: Arc<Inner>,
}

impl Drop for Owner {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        if state.started {
            self.inner.shutdown(&mut state, "session dropped");
        }
    }
}

/// Shared state behind a [`Session`].
pub(crate) struct Inner {
    pub(crate) config: RoomConfig,
    pub(crate) user_id: String,
    pub(crate) auth: Option<AuthFn>,
    pub(crate) resolver: Option<ConnectionResolver>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) events: EventHub,
    pub(crate) state: Mutex<SessionState>,
}

/// Everything that changes on a transition.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) started: bool,
    pub(crate) stage: Stage,
    pub(crate) generation: GenerationGuard,
    pub(crate) auth_retry: u32,
    pub(crate) conn_retry: u32,
    pub(crate) active: Option<ActiveSocket>,
    pub(crate) probes: Vec<PendingProbe>,
    pub(crate) next_probe: u64,
}

/// The installed socket and the task forwarding its signals.
#[derive(Debug)]
pub(crate) struct ActiveSocket {
    pub(crate) sender: SocketSender,
    pub(crate) pump: JoinHandle<()>,
}

impl Inner {
    pub(crate) fn connection(&self) -> &ConnectionConfig {
        &self.config.connection
    }

    /// Set and publish the stage.
    pub(crate) fn transition(&self, state: &mut SessionState, stage: Stage) {
        state.stage = stage;
        let generation = state.generation.current();
        info!(generation = generation.value(), stage = %stage, "Stage changed");
        self.events.publish_stage(StageEvent { stage, generation });
    }

    /// Detach the active socket, then request its close.
    ///
    /// Outstanding probes belonged to that socket and are dropped with it.
    pub(crate) fn detach_active(&self, state: &mut SessionState, code: CloseCode, reason: &str) {
        state.probes.clear();
        if let Some(active) = state.active.take() {
            active.pump.abort();
            debug!(
                generation = state.generation.current().value(),
                socket_id = %active.sender.id(),
                reason,
                "Socket detached"
            );
            active.sender.close(code, reason);
        }
    }

    /// Terminal failure: publish `failed` and invalidate everything pending.
    pub(crate) fn fail(&self, state: &mut SessionState) {
        self.transition(state, Stage::Failed);
        state.generation.bump();
    }

    /// Re-enter authentication after `delay`, unless `tag` is superseded
    /// first.
    pub(crate) fn schedule_reauth(self: &Arc<Self>, tag: Generation, delay: Duration) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = inner.state.lock();
            if state.generation.is_stale(tag) {
                debug!(generation = tag.value(), "Stale retry timer skipped");
                return;
            }
            inner.enter_auth(&mut state);
        });
    }

    /// Stop for good: invalidate pending work, close the socket, reset to
    /// `initial`.
    pub(crate) fn shutdown(&self, state: &mut SessionState, reason: &str) {
        state.started = false;
        let generation = state.generation.bump();
        info!(generation = generation.value(), reason, "Session stopped");
        self.detach_active(state, CloseCode::Normal, reason);
        self.transition(state, Stage::Initial);
    }

    /// Drop the live socket and start over from authentication.
    pub(crate) fn teardown_and_reauth(self: &Arc<Self>, state: &mut SessionState, reason: &str) {
        self.detach_active(state, CloseCode::Normal, reason);
        let generation = state.generation.bump();
        warn!(generation = generation.value(), reason, "Connection lost, re-authenticating");
        self.enter_auth(state);
    }
}

impl Session {
    /// Create a session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Create a session from a configuration with the WebSocket transport
    /// and no authentication.
    pub fn new(config: RoomConfig) -> SessionResult<Self> {
        Self::builder().config(config).build()
    }

    /// Start connecting.
    ///
    /// Warns and does nothing if already started.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.started {
            warn!("Session already started");
            return;
        }

        state.started = true;
        info!(generation = state.generation.current().value(), "Session started");
        self.inner.enter_auth(&mut state);
    }

    /// Stop for good: close the socket, reset to `initial`, and never
    /// recover automatically.
    ///
    /// Warns and does nothing if not started.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if !state.started {
            warn!("Session not started, nothing to stop");
            return;
        }

        self.inner.shutdown(&mut state, "session stopped");
    }

    /// Drop the current attempt or socket and authenticate again
    /// immediately, bypassing any backoff.
    ///
    /// Also the way out of `failed` and of a closed session.
    pub fn reconnect(&self) {
        let mut state = self.inner.state.lock();
        if !state.started {
            warn!("Session not started, cannot reconnect");
            return;
        }

        self.inner
            .detach_active(&mut state, CloseCode::Normal, "reconnect requested");
        let generation = state.generation.bump();
        info!(generation = generation.value(), "Reconnecting");
        self.inner.transition(&mut state, Stage::Initial);
        self.inner.enter_auth(&mut state);
    }

    /// Drop the current attempt or socket and stay idle until
    /// [`reconnect`](Self::reconnect).
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if !state.started {
            warn!("Session not started, cannot close");
            return;
        }

        self.inner
            .detach_active(&mut state, CloseCode::Normal, "close requested");
        let generation = state.generation.bump();
        info!(generation = generation.value(), "Session closed");
        self.inner.transition(&mut state, Stage::Initial);
    }

    /// Send a message on the active socket.
    ///
    /// Without an open socket the message is logged and dropped; nothing is
    /// buffered.
    pub fn send(&self, message: impl Into<Message>) {
        let message = message.into();
        let state = self.inner.state.lock();
        let generation = state.generation.current().value();

        match &state.active {
            None => {
                warn!(generation, len = message.len(), "Socket not connected yet, message dropped");
            }
            Some(active) if !active.sender.is_open() => {
                warn!(generation, len = message.len(), "Socket no longer open, message dropped");
            }
            Some(active) => {
                if let Err(error) = active.sender.send(message) {
                    warn!(generation, error = %error, "Message dropped");
                }
            }
        }
    }

    /// Send a text message.
    pub fn send_text(&self, text: impl Into<String>) {
        self.send(Message::text(text));
    }

    /// Send a binary message.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) {
        self.send(Message::binary(data));
    }

    /// Send a value as JSON text.
    ///
    /// Only encoding errors are returned; delivery follows [`send`](Self::send).
    pub fn send_json<T: Serialize>(&self, value: &T) -> SessionResult<()> {
        self.send(Message::from_json(value)?);
        Ok(())
    }

    /// Check liveness now, outside the heartbeat schedule.
    ///
    /// Intended for platform signals such as regained focus or a network
    /// change. Does nothing unless started and connected. A missing pong
    /// takes the usual timeout path.
    pub fn probe(&self) -> bool {
        let mut state = self.inner.state.lock();
        if !state.started || state.stage != Stage::Connected {
            debug!(stage = %state.stage, "Probe skipped");
            return false;
        }

        let tag = state.generation.current();
        info!(generation = tag.value(), "Manual probe");
        self.inner.send_probe(&mut state, tag, true)
    }

    /// The caller-facing status.
    pub fn status(&self) -> Status {
        let state = self.inner.state.lock();
        state.stage.status(state.generation.current())
    }

    /// The current stage.
    pub fn stage(&self) -> Stage {
        self.inner.state.lock().stage
    }

    /// The live generation.
    pub fn generation(&self) -> Generation {
        self.inner.state.lock().generation.current()
    }

    /// Whether [`start`](Self::start) is in effect.
    pub fn is_started(&self) -> bool {
        self.inner.state.lock().started
    }

    /// The user id sent with every attempt.
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// The configuration this session runs with.
    pub fn config(&self) -> &RoomConfig {
        &self.inner.config
    }

    /// Subscribe to stage transitions.
    pub fn subscribe_stages(&self) -> broadcast::Receiver<StageEvent> {
        self.inner.events.subscribe_stages()
    }

    /// Subscribe to inbound messages, heartbeat tokens included.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<Message> {
        self.inner.events.subscribe_messages()
    }

    /// Watch the latest stage.
    pub fn watch_stage(&self) -> watch::Receiver<StageEvent> {
        self.inner.events.watch_stage()
    }

    /// Wait until the session is in `stage`.
    ///
    /// Returns immediately if it already is.
    pub async fn wait_for_stage(&self, stage: Stage) -> Option<StageEvent> {
        let mut rx = self.watch_stage();
        rx.wait_for(|event| event.stage == stage)
            .await
            .ok()
            .map(|event| *event)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Session")
            .field("user_id", &self.inner.user_id)
            .field("started", &state.started)
            .field("stage", &state.stage)
            .field("generation", &state.generation.current())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    config: RoomConfig,
    auth: Option<AuthFn>,
    resolver: Option<ConnectionResolver>,
    transport: Option<Arc<dyn Transport>>,
    event_capacity: usize,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            config: RoomConfig::default(),
            auth: None,
            resolver: None,
            transport: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    ///
    /// Call this before the per-field setters.
    pub fn config(mut self, config: RoomConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the room.
    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.config.room = room.into();
        self
    }

    /// Set the party.
    pub fn party(mut self, party: impl Into<String>) -> Self {
        self.config.party = Some(party.into());
        self
    }

    /// Set a static user id.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.user_id = Some(user_id.into());
        self
    }

    /// Require the connection resolver to acknowledge each socket.
    pub fn wait_for_room(mut self, wait: bool) -> Self {
        self.config.wait_for_room = wait;
        self
    }

    /// Set the timing and retry policy.
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.config.connection = connection;
        self
    }

    /// Set the authentication operation.
    pub fn auth<F, Fut>(mut self, auth: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SessionResult<AuthParams>> + Send + 'static,
    {
        self.auth = Some(auth_fn(auth));
        self
    }

    /// Set an already boxed authentication operation.
    pub fn auth_fn(mut self, auth: AuthFn) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the connection resolver consulted when `wait_for_room` is set.
    pub fn connection_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Message, &ReadyAck) + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Use a custom transport instead of WebSockets.
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set the per-subscriber event buffer.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate the configuration and build the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if the configuration is invalid or
    /// `wait_for_room` is set without a connection resolver.
    pub fn build(self) -> SessionResult<Session> {
        self.config.validate()?;
        if self.config.wait_for_room && self.resolver.is_none() {
            return Err(ConfigError::invalid_value(
                "wait_for_room",
                "requires a connection resolver",
            )
            .into());
        }

        let user_id = self
            .config
            .user_id
            .clone()
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        let inner = Arc::new(Inner {
            config: self.config,
            user_id,
            auth: self.auth,
            resolver: self.resolver,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(WsTransport::new())),
            events: EventHub::new(self.event_capacity),
            state: Mutex::new(SessionState::default()),
        });
        Ok(Session {
            _owner: Arc::new(Owner {
                inner: Arc::clone(&inner),
            }),
            inner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults() {
        let session = Session::builder().build().unwrap();
        assert_eq!(session.stage(), Stage::Initial);
        assert_eq!(session.status(), Status::Initial);
        assert_eq!(session.generation(), Generation::ZERO);
        assert!(!session.is_started());
        assert!(!session.user_id().is_empty());
    }

    #[test]
    fn test_static_user_id() {
        let session = Session::builder().user_id("user-7").build().unwrap();
        assert_eq!(session.user_id(), "user-7");
    }

    #[test]
    fn test_generated_user_ids_differ() {
        let a = Session::builder().build().unwrap();
        let b = Session::builder().build().unwrap();
        assert_ne!(a.user_id(), b.user_id());
    }

    #[test]
    fn test_wait_for_room_requires_resolver() {
        let err = Session::builder().wait_for_room(true).build().unwrap_err();
        assert!(err.to_string().contains("wait_for_room"));

        let ok = Session::builder()
            .wait_for_room(true)
            .connection_resolver(|_, ack| ack.ack())
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Session::builder().room("").build().unwrap_err();
        assert!(matches!(err, crate::SessionError::Config(_)));
    }

    #[test]
    fn test_controls_before_start_only_warn() {
        let session = Session::builder().build().unwrap();
        session.stop();
        session.reconnect();
        session.close();
        session.send_text("dropped");
        assert!(!session.probe());
        assert_eq!(session.stage(), Stage::Initial);
        assert_eq!(session.generation(), Generation::ZERO);
    }

    #[test]
    fn test_debug_output() {
        let session = Session::builder().user_id("dbg").build().unwrap();
        let debug = format!("{session:?}");
        assert!(debug.contains("dbg"));
        assert!(debug.contains("Initial"));
    }
}
