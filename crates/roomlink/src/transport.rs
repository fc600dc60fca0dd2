//! The transport contract.
//!
//! A [`Transport`] opens one socket per attempt and hands back a
//! [`Socket`]: a cloneable [`SocketSender`] plus a stream of
//! [`SocketSignal`]s. Implementations drive the other end through a
//! [`SocketPeer`].
//!
//! ```text
//!   Session                         Transport task
//!   ───────                         ──────────────
//!   SocketSender ── Outbound ─────► SocketPeer::next_outbound()
//!   Socket::next_signal() ◄── SocketSignal ── PeerHandle::deliver()/fail()/closed()
//!               shared ReadyState (AtomicU8)
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{CloseCode, SessionError, SessionResult};
use crate::message::Message;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opens sockets.
pub trait Transport: Send + Sync + 'static {
    /// Open one socket to `url`.
    ///
    /// The returned socket must already be open. Dropping the future
    /// abandons the attempt.
    fn open(&self, url: &str) -> BoxFuture<'static, SessionResult<Socket>>;
}

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique socket identifier, assigned in opening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketId(u64);

impl SocketId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-level state of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Usable.
    Open = 1,
    /// A close was requested.
    Closing = 2,
    /// Closed.
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Something a socket reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketSignal {
    /// An inbound message.
    Message(Message),
    /// A transport error. A `Closed` signal usually follows.
    Error(String),
    /// The socket closed.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
}

/// A request from the session to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a message.
    Message(Message),
    /// Close the socket.
    Close {
        /// Close code to send.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Cloneable handle for sending on, and closing, a socket.
#[derive(Debug, Clone)]
pub struct SocketSender {
    id: SocketId,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: Arc<AtomicU8>,
}

impl SocketSender {
    /// Get the socket ID.
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Current transport state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether messages can be sent.
    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Queue a message.
    pub fn send(&self, message: Message) -> SessionResult<()> {
        if !self.is_open() {
            return Err(SessionError::send_failed(format!(
                "socket {} is {:?}",
                self.id,
                self.ready_state()
            )));
        }
        self.outbound
            .send(Outbound::Message(message))
            .map_err(|_| SessionError::send_failed("transport task has stopped"))
    }

    /// Request a close. Does nothing if a close was already requested.
    pub fn close(&self, code: CloseCode, reason: impl Into<String>) {
        let closing = ReadyState::Closing as u8;
        let requested = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s < closing).then_some(closing)
            })
            .is_ok();
        if requested {
            let _ = self.outbound.send(Outbound::Close {
                code: code.as_u16(),
                reason: reason.into(),
            });
        }
    }
}

/// The session's end of an open socket.
///
/// Dropping a socket requests a normal close.
#[derive(Debug)]
pub struct Socket {
    sender: SocketSender,
    signals: mpsc::UnboundedReceiver<SocketSignal>,
}

impl Socket {
    /// Create a connected socket/peer pair in the `Connecting` state.
    pub fn pair() -> (Self, SocketPeer) {
        let id = SocketId::next();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));

        let socket = Self {
            sender: SocketSender {
                id,
                outbound: outbound_tx,
                state: Arc::clone(&state),
            },
            signals: signal_rx,
        };
        let peer = SocketPeer {
            handle: PeerHandle {
                id,
                signals: signal_tx,
                state,
            },
            outbound: outbound_rx,
        };
        (socket, peer)
    }

    /// Get the socket ID.
    pub fn id(&self) -> SocketId {
        self.sender.id
    }

    /// Get the sending handle.
    pub fn sender(&self) -> &SocketSender {
        &self.sender
    }

    /// Request a close.
    pub fn close(&self, code: CloseCode, reason: impl Into<String>) {
        self.sender.close(code, reason);
    }

    /// Receive the next signal.
    ///
    /// Returns `None` once the transport side is gone.
    pub async fn next_signal(&mut self) -> Option<SocketSignal> {
        self.signals.recv().await
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.sender.close(CloseCode::Normal, "socket dropped");
    }
}

/// Cloneable transport-side handle for reporting signals.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: SocketId,
    signals: mpsc::UnboundedSender<SocketSignal>,
    state: Arc<AtomicU8>,
}

impl PeerHandle {
    /// Get the socket ID.
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Current transport state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Mark the socket usable.
    pub fn mark_open(&self) {
        self.state.store(ReadyState::Open as u8, Ordering::Release);
    }

    /// Report an inbound message. Returns `false` if nobody is listening.
    pub fn deliver(&self, message: Message) -> bool {
        self.signals.send(SocketSignal::Message(message)).is_ok()
    }

    /// Report a transport error.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        self.signals.send(SocketSignal::Error(error.into())).is_ok()
    }

    /// Mark the socket closed and report it.
    pub fn closed(&self, code: Option<u16>, reason: impl Into<String>) -> bool {
        self.state.store(ReadyState::Closed as u8, Ordering::Release);
        self.signals
            .send(SocketSignal::Closed {
                code,
                reason: reason.into(),
            })
            .is_ok()
    }

    /// Whether the session side has dropped its socket.
    pub fn is_detached(&self) -> bool {
        self.signals.is_closed()
    }
}

/// The transport's end of a socket.
#[derive(Debug)]
pub struct SocketPeer {
    handle: PeerHandle,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl SocketPeer {
    /// Get a cloneable signal handle.
    pub fn handle(&self) -> &PeerHandle {
        &self.handle
    }

    /// Receive the next request from the session.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Split into the signal handle and the request stream.
    pub fn into_parts(self) -> (PeerHandle, mpsc::UnboundedReceiver<Outbound>) {
        (self.handle, self.outbound)
    }
}
