//! Scripted in-memory transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use roomlink::{
    BoxFuture, Message, Outbound, PeerHandle, ReadyState, SessionError, SessionResult, Socket,
    SocketId, Transport,
};

/// What one open attempt does.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// Open immediately.
    Accept,
    /// Open, then deliver these messages.
    AcceptWith(Vec<Message>),
    /// Open after a delay.
    AcceptAfter(Duration),
    /// Fail with a connect error.
    Refuse(String),
    /// Fail with the stop-retry signal.
    StopRetry(String),
    /// Fail as if the peer closed the pending socket with this code.
    CloseWith(u16, String),
    /// Never complete.
    Hang,
}

#[derive(Debug)]
struct State {
    script: VecDeque<Attempt>,
    fallback: Attempt,
    urls: Vec<String>,
    sockets: Vec<MockSocket>,
}

/// An in-memory [`Transport`] whose attempts follow a script.
///
/// Once the script runs out every attempt uses the fallback, which
/// defaults to [`Attempt::Accept`]. Opened sockets answer `PING` with
/// `PONG` unless auto-pong is switched off.
///
/// # Example
///
/// ```
/// use roomlink_test::{Attempt, MockTransport};
///
/// let transport = MockTransport::new()
///     .then(Attempt::Refuse("down".into()))
///     .then(Attempt::Accept);
/// assert_eq!(transport.attempts(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
    auto_pong: Arc<AtomicBool>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a transport that accepts every attempt.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                script: VecDeque::new(),
                fallback: Attempt::Accept,
                urls: Vec::new(),
                sockets: Vec::new(),
            })),
            auto_pong: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a transport whose every attempt does `attempt`.
    pub fn always(attempt: Attempt) -> Self {
        Self::new().otherwise(attempt)
    }

    /// Queue the next scripted attempt.
    pub fn then(self, attempt: Attempt) -> Self {
        self.push(attempt);
        self
    }

    /// Set the behavior once the script runs out.
    pub fn otherwise(self, attempt: Attempt) -> Self {
        self.state.lock().fallback = attempt;
        self
    }

    /// Queue an attempt on a shared transport.
    pub fn push(&self, attempt: Attempt) {
        self.state.lock().script.push_back(attempt);
    }

    /// Switch automatic `PONG` replies on or off.
    pub fn set_auto_pong(&self, enabled: bool) {
        self.auto_pong.store(enabled, Ordering::SeqCst);
    }

    /// Number of open attempts so far.
    pub fn attempts(&self) -> usize {
        self.state.lock().urls.len()
    }

    /// URL of every attempt, in order.
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }

    /// Every socket opened so far, in order.
    pub fn sockets(&self) -> Vec<MockSocket> {
        self.state.lock().sockets.clone()
    }

    /// The most recently opened socket.
    pub fn last_socket(&self) -> Option<MockSocket> {
        self.state.lock().sockets.last().cloned()
    }

    /// The socket opened by the attempt at `index`, if that attempt opened
    /// one.
    pub fn socket_for_attempt(&self, index: usize) -> Option<MockSocket> {
        self.state
            .lock()
            .sockets
            .iter()
            .find(|s| s.attempt == index)
            .cloned()
    }

    fn accept(&self, url: &str, attempt: usize, messages: Vec<Message>) -> Socket {
        let (socket, peer) = Socket::pair();
        let (handle, mut outbound) = peer.into_parts();
        handle.mark_open();

        let mock = MockSocket {
            url: url.to_string(),
            attempt,
            handle: handle.clone(),
            log: Arc::new(Mutex::new(SocketLog::default())),
        };
        self.state.lock().sockets.push(mock.clone());

        for message in messages {
            handle.deliver(message);
        }

        let auto_pong = Arc::clone(&self.auto_pong);
        tokio::spawn(async move {
            while let Some(request) = outbound.recv().await {
                match request {
                    Outbound::Message(message) => {
                        let ping = message.is_ping();
                        mock.log.lock().sent.push(message);
                        if ping && auto_pong.load(Ordering::SeqCst) {
                            handle.deliver(Message::pong());
                        }
                    }
                    Outbound::Close { code, reason } => {
                        mock.log.lock().closes.push((code, reason.clone()));
                        handle.closed(Some(code), reason);
                        break;
                    }
                }
            }
        });

        socket
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, SessionResult<Socket>> {
        let (attempt, index) = {
            let mut state = self.state.lock();
            let index = state.urls.len();
            state.urls.push(url.to_string());
            let attempt = state
                .script
                .pop_front()
                .unwrap_or_else(|| state.fallback.clone());
            (attempt, index)
        };

        let this = self.clone();
        let url = url.to_string();
        Box::pin(async move {
            match attempt {
                Attempt::Accept => Ok(this.accept(&url, index, Vec::new())),
                Attempt::AcceptWith(messages) => Ok(this.accept(&url, index, messages)),
                Attempt::AcceptAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(this.accept(&url, index, Vec::new()))
                }
                Attempt::Refuse(reason) => Err(SessionError::connect(reason)),
                Attempt::StopRetry(reason) => Err(SessionError::stop_retry(reason)),
                Attempt::CloseWith(code, reason) => {
                    Err(SessionError::connection_closed(Some(code), reason))
                }
                Attempt::Hang => std::future::pending().await,
            }
        })
    }
}

#[derive(Debug, Default)]
struct SocketLog {
    sent: Vec<Message>,
    closes: Vec<(u16, String)>,
}

/// The far end of a socket opened by [`MockTransport`].
///
/// Records what the session sent and lets a test play the server.
#[derive(Debug, Clone)]
pub struct MockSocket {
    url: String,
    attempt: usize,
    handle: PeerHandle,
    log: Arc<Mutex<SocketLog>>,
}

impl MockSocket {
    /// Get the socket ID.
    pub fn id(&self) -> SocketId {
        self.handle.id()
    }

    /// URL the socket was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Index of the attempt that opened it.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Every message the session sent, probes included.
    pub fn sent(&self) -> Vec<Message> {
        self.log.lock().sent.clone()
    }

    /// Messages the session sent, probes excluded.
    pub fn sent_data(&self) -> Vec<Message> {
        self.log
            .lock()
            .sent
            .iter()
            .filter(|m| !m.is_ping())
            .cloned()
            .collect()
    }

    /// Number of probes received.
    pub fn pings(&self) -> usize {
        self.log.lock().sent.iter().filter(|m| m.is_ping()).count()
    }

    /// Every close the session requested, as `(code, reason)`.
    pub fn closes(&self) -> Vec<(u16, String)> {
        self.log.lock().closes.clone()
    }

    /// Whether the socket is closed, by either side.
    pub fn is_closed(&self) -> bool {
        self.handle.ready_state() == ReadyState::Closed
    }

    /// Current transport state.
    pub fn ready_state(&self) -> ReadyState {
        self.handle.ready_state()
    }

    /// Deliver a message to the session. Returns `false` if the session
    /// no longer listens to this socket.
    pub fn deliver(&self, message: impl Into<Message>) -> bool {
        self.handle.deliver(message.into())
    }

    /// Deliver a `PONG`.
    pub fn pong(&self) -> bool {
        self.handle.deliver(Message::pong())
    }

    /// Report a transport error.
    pub fn error(&self, error: impl Into<String>) -> bool {
        self.handle.fail(error)
    }

    /// Close from the server side.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.handle.closed(Some(code), reason)
    }
}
