//! Connection stage and signal handling for the installed socket.
//!
//! One attempt opens a socket through the [`Transport`](crate::Transport),
//! optionally waits for the connection resolver to acknowledge a "room
//! ready" message, and is bounded as a whole by `socket_connect_timeout`.
//! A socket that completes after its generation was superseded is closed
//! and never installed.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

use crate::auth::AuthParams;
use crate::backoff::{Backoff, RetryDecision};
use crate::error::{CloseCode, SessionError, SessionResult};
use crate::events::StageEvent;
use crate::generation::Generation;
use crate::message::Message;
use crate::session::{ActiveSocket, Inner, SessionState};
use crate::stage::Stage;
use crate::timeout::with_timeout;
use crate::transport::{Socket, SocketId, SocketSignal};
use crate::url::RoomAddress;

/// Decides when a freshly opened socket is ready, when `wait_for_room` is
/// set.
///
/// Called with every inbound message while the attempt is pending. Calling
/// [`ReadyAck::ack`] completes the attempt.
pub type ConnectionResolver = Arc<dyn Fn(&Message, &ReadyAck) + Send + Sync>;

/// Acknowledges that a pending socket is ready.
///
/// Cloneable, so a resolver may acknowledge later from another task.
#[derive(Debug, Clone)]
pub struct ReadyAck {
    slot: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ReadyAck {
    pub(crate) fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Mark the socket ready. Later calls do nothing.
    pub fn ack(&self) {
        if let Some(tx) = self.slot.lock().take() {
            let _ = tx.send(());
        }
    }

    /// Whether [`ack`](Self::ack) has been called.
    pub fn is_acked(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl Inner {
    /// Enter `connecting` and start one socket attempt tagged with `tag`.
    pub(crate) fn enter_connecting(
        self: &Arc<Self>,
        state: &mut SessionState,
        tag: Generation,
        params: AuthParams,
    ) {
        self.transition(state, Stage::Connecting);
        state.auth_retry = 0;

        let url = RoomAddress::resolve(&self.config, &self.user_id, &params).url();
        info!(generation = tag.value(), url = %url, "Opening socket");

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.open_socket(&url).await;
            inner.on_connect_complete(tag, result);
        });
    }

    async fn open_socket(&self, url: &str) -> SessionResult<Socket> {
        let timeout = self.connection().socket_connect_timeout;
        with_timeout("socket connect", timeout, async {
            let mut socket = self.transport.open(url).await?;
            if let (true, Some(resolver)) = (self.config.wait_for_room, &self.resolver) {
                self.await_room_ready(&mut socket, resolver).await?;
            }
            Ok(socket)
        })
        .await
    }

    async fn await_room_ready(
        &self,
        socket: &mut Socket,
        resolver: &ConnectionResolver,
    ) -> SessionResult<()> {
        let (ack, mut ready) = ReadyAck::new();
        debug!(socket_id = %socket.id(), "Waiting for room");

        loop {
            tokio::select! {
                biased;
                _ = &mut ready => return Ok(()),
                signal = socket.next_signal() => match signal {
                    Some(SocketSignal::Message(message)) => {
                        resolver(&message, &ack);
                        self.events.publish_message(message);
                    }
                    Some(SocketSignal::Error(error)) => {
                        return Err(SessionError::connect(error));
                    }
                    Some(SocketSignal::Closed { code, reason }) => {
                        return Err(SessionError::connection_closed(code, reason));
                    }
                    None => {
                        return Err(SessionError::connect("transport ended before the room was ready"));
                    }
                },
            }
        }
    }

    fn on_connect_complete(self: &Arc<Self>, tag: Generation, result: SessionResult<Socket>) {
        let mut state = self.state.lock();
        if state.generation.is_stale(tag) {
            match result {
                Ok(socket) => {
                    debug!(
                        generation = tag.value(),
                        socket_id = %socket.id(),
                        "Stale socket opened, closing"
                    );
                    socket.close(CloseCode::Normal, "stale connection");
                }
                Err(error) => {
                    debug!(generation = tag.value(), error = %error, "Stale connection failure discarded");
                }
            }
            return;
        }

        match result {
            Ok(socket) => {
                info!(generation = tag.value(), socket_id = %socket.id(), "Socket open");
                self.install(&mut state, socket);
                self.enter_connected(&mut state, tag);
            }
            Err(error) if CloseCode::is_stop_retry(error.close_code()) => {
                self.stop_retry_close(&mut state);
            }
            Err(error) => self.connection_error(&mut state, tag, error),
        }
    }

    fn connection_error(
        self: &Arc<Self>,
        state: &mut SessionState,
        tag: Generation,
        error: SessionError,
    ) {
        self.transition(state, Stage::ConnectionError);

        match Backoff::connection(self.connection()).decide(state.conn_retry, &error) {
            RetryDecision::GiveUp => {
                error!(
                    generation = tag.value(),
                    retry = state.conn_retry,
                    error = %error,
                    "Connection failed, giving up"
                );
                self.fail(state);
            }
            RetryDecision::RetryAfter(delay) => {
                info!(
                    generation = tag.value(),
                    retry = state.conn_retry,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Connection failed, retry scheduled"
                );
                self.schedule_reauth(tag, delay);
                state.conn_retry += 1;
            }
        }
    }

    /// Make `socket` the active one and start forwarding its signals.
    fn install(self: &Arc<Self>, state: &mut SessionState, mut socket: Socket) {
        self.detach_active(state, CloseCode::Normal, "replaced");

        let id = socket.id();
        let sender = socket.sender().clone();
        let inner = Arc::clone(self);
        let pump = tokio::spawn(async move {
            while let Some(signal) = socket.next_signal().await {
                inner.on_socket_signal(id, signal);
            }
            debug!(socket_id = %id, "Socket signals ended");
        });

        state.active = Some(ActiveSocket { sender, pump });
    }

    fn on_socket_signal(self: &Arc<Self>, id: SocketId, signal: SocketSignal) {
        let mut state = self.state.lock();
        if state.active.as_ref().map(|a| a.sender.id()) != Some(id) {
            debug!(socket_id = %id, "Signal from detached socket ignored");
            return;
        }

        let generation = state.generation.current().value();
        match signal {
            SocketSignal::Message(message) => {
                trace!(generation, len = message.len(), "Message received");
                if message.is_pong() {
                    self.on_pong(&mut state);
                }
                self.events.publish_message(message);
            }
            SocketSignal::Error(error) => {
                warn!(generation, error = %error, "Socket error");
                if state.stage == Stage::Connected {
                    self.teardown_and_reauth(&mut state, "socket error");
                }
            }
            SocketSignal::Closed { code, reason } => {
                warn!(generation, close_code = ?code, reason = %reason, "Socket closed");
                if CloseCode::is_stop_retry(code) {
                    self.stop_retry_close(&mut state);
                } else if state.stage == Stage::Connected {
                    self.teardown_and_reauth(&mut state, "socket closed");
                }
            }
        }
    }

    /// The peer closed with the stop-retry code: back to `initial`, no
    /// retry, no publication.
    fn stop_retry_close(&self, state: &mut SessionState) {
        self.detach_active(state, CloseCode::Normal, "stop retry");
        let generation = state.generation.bump();
        state.stage = Stage::Initial;
        self.events.record_stage(StageEvent {
            stage: Stage::Initial,
            generation,
        });
        warn!(generation = generation.value(), "Peer asked to stop retrying");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_ack_fires_once() {
        let (ack, rx) = ReadyAck::new();
        assert!(!ack.is_acked());

        let clone = ack.clone();
        clone.ack();
        ack.ack();

        assert!(ack.is_acked());
        assert!(rx.await.is_ok());
    }

    #[test]
    fn test_ready_ack_wakes_waiter() {
        let (ack, rx) = ReadyAck::new();
        let mut waiter = tokio_test::task::spawn(rx);
        tokio_test::assert_pending!(waiter.poll());

        ack.ack();
        assert!(waiter.is_woken());
        tokio_test::assert_ready_ok!(waiter.poll());
    }

    #[tokio::test]
    async fn test_ready_ack_from_another_task() {
        let (ack, rx) = ReadyAck::new();
        tokio::spawn(async move { ack.ack() });
        assert!(rx.await.is_ok());
    }
}
