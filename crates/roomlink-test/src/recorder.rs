//! Recording published stages.

use std::time::Duration;

use roomlink::{Session, Stage, StageEvent};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::error::TestError;

/// Collects the stage events a session publishes.
///
/// Subscribe before the action under test; only later events are seen.
#[derive(Debug)]
pub struct StageRecorder {
    rx: broadcast::Receiver<StageEvent>,
}

impl StageRecorder {
    /// Start recording `session`.
    pub fn new(session: &Session) -> Self {
        Self {
            rx: session.subscribe_stages(),
        }
    }

    /// Take every event published so far.
    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return events,
            }
        }
    }

    /// Take the stages published so far.
    pub fn drain(&mut self) -> Vec<Stage> {
        self.drain_events().into_iter().map(|e| e.stage).collect()
    }

    /// Wait for the next event.
    pub async fn next(&mut self, within: Duration) -> Result<StageEvent, TestError> {
        match tokio::time::timeout(within, self.rx.recv()).await {
            Err(_) => Err(TestError::Timeout(within)),
            Ok(Ok(event)) => Ok(event),
            Ok(Err(RecvError::Closed)) => Err(TestError::StreamClosed),
            Ok(Err(RecvError::Lagged(n))) => Err(TestError::Lagged(n)),
        }
    }

    /// Wait for the next event and check its stage.
    pub async fn expect(&mut self, stage: Stage, within: Duration) -> Result<StageEvent, TestError> {
        let event = self.next(within).await?;
        if event.stage == stage {
            Ok(event)
        } else {
            Err(TestError::UnexpectedStage {
                expected: stage,
                actual: event.stage,
            })
        }
    }

    /// Wait until `stage` is published, skipping everything before it.
    pub async fn until(&mut self, stage: Stage, within: Duration) -> Result<StageEvent, TestError> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            let event = self.next(left).await?;
            if event.stage == stage {
                return Ok(event);
            }
        }
    }
}

/// Let every ready task run without advancing the clock.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
