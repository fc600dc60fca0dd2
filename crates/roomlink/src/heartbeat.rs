//! Heartbeat monitor.
//!
//! While connected, a probe (the [`PING`](crate::message::PING) token) is
//! sent every `heartbeat_interval`. Any [`PONG`](crate::message::PONG)
//! answers every outstanding probe. A probe left unanswered for
//! `probe_timeout` tears the socket down and restarts authentication.
//!
//! The pong wait goes through [`with_timeout`], like the authentication
//! call and the socket open.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::generation::Generation;
use crate::message::Message;
use crate::session::{Inner, SessionState};
use crate::stage::Stage;
use crate::timeout::with_timeout;

/// A probe waiting for its pong.
#[derive(Debug)]
pub(crate) struct PendingProbe {
    pub(crate) id: u64,
    pub(crate) generation: Generation,
    /// Out-of-band probes do not reschedule the heartbeat.
    pub(crate) single_use: bool,
    /// Fired on pong. Dropped when the probe is discarded with its socket.
    pub(crate) answered: oneshot::Sender<()>,
}

impl Inner {
    /// Enter `connected` and arm the first heartbeat.
    pub(crate) fn enter_connected(self: &Arc<Self>, state: &mut SessionState, tag: Generation) {
        self.transition(state, Stage::Connected);
        state.conn_retry = 0;
        self.schedule_heartbeat(tag);
    }

    fn schedule_heartbeat(self: &Arc<Self>, tag: Generation) {
        let interval = self.connection().heartbeat_interval;
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let mut state = inner.state.lock();
            if state.generation.is_stale(tag) {
                debug!(generation = tag.value(), "Stale heartbeat skipped");
                return;
            }
            inner.send_probe(&mut state, tag, false);
        });
    }

    /// Send a probe on the active socket and arm its timeout.
    ///
    /// Returns `false` if there is no active socket.
    pub(crate) fn send_probe(
        self: &Arc<Self>,
        state: &mut SessionState,
        tag: Generation,
        single_use: bool,
    ) -> bool {
        {
            let Some(active) = &state.active else {
                debug!(generation = tag.value(), "No socket to probe");
                return false;
            };
            if let Err(error) = active.sender.send(Message::ping()) {
                // The timeout below still fires and handles the dead socket.
                debug!(generation = tag.value(), error = %error, "Probe not sent");
            }
        }

        let id = state.next_probe;
        state.next_probe += 1;
        let (answered, pong) = oneshot::channel();
        state.probes.push(PendingProbe {
            id,
            generation: tag,
            single_use,
            answered,
        });
        debug!(generation = tag.value(), probe = id, single_use, "Probe sent");

        let timeout = self.connection().probe_timeout;
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let wait = async {
                pong.await
                    .map_err(|_| SessionError::connection_closed(None, "probe discarded"))
            };
            match with_timeout("pong", timeout, wait).await {
                Ok(()) => {}
                Err(error) if error.is_timeout() => inner.on_probe_timeout(id, tag),
                Err(_) => debug!(generation = tag.value(), probe = id, "Probe discarded"),
            }
        });
        true
    }

    /// Settle every outstanding probe.
    pub(crate) fn on_pong(self: &Arc<Self>, state: &mut SessionState) {
        for probe in std::mem::take(&mut state.probes) {
            let _ = probe.answered.send(());
            if state.generation.is_stale(probe.generation) {
                debug!(generation = probe.generation.value(), "Stale pong ignored");
                continue;
            }
            debug!(generation = probe.generation.value(), probe = probe.id, "Pong received");
            if !probe.single_use {
                self.schedule_heartbeat(probe.generation);
            }
        }
    }

    fn on_probe_timeout(self: &Arc<Self>, id: u64, tag: Generation) {
        let mut state = self.state.lock();
        let Some(index) = state.probes.iter().position(|p| p.id == id) else {
            return;
        };
        state.probes.remove(index);

        if state.generation.is_stale(tag) {
            debug!(generation = tag.value(), "Stale pong timeout ignored");
            return;
        }

        warn!(generation = tag.value(), probe = id, "Pong timeout");
        self.teardown_and_reauth(&mut state, "heartbeat timeout");
    }
}
