//! Fan-out of stage changes and inbound messages.
//!
//! Subscribers get a `tokio::sync::broadcast` receiver; dropping it
//! unsubscribes. Late subscribers only see events published after they
//! subscribed. A `watch` channel additionally mirrors the latest stage so
//! callers can await a particular one.

use tokio::sync::{broadcast, watch};

use crate::generation::Generation;
use crate::message::Message;
use crate::stage::Stage;

/// Default buffer per subscriber before it starts lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A published stage transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageEvent {
    /// The stage entered.
    pub stage: Stage,
    /// The generation live at the transition.
    pub generation: Generation,
}

/// Publisher side of the session's event streams.
#[derive(Debug)]
pub struct EventHub {
    stages: broadcast::Sender<StageEvent>,
    messages: broadcast::Sender<Message>,
    latest: watch::Sender<StageEvent>,
}

impl EventHub {
    /// Create a hub with the given per-subscriber capacity.
    pub fn new(capacity: usize) -> Self {
        let (stages, _) = broadcast::channel(capacity.max(1));
        let (messages, _) = broadcast::channel(capacity.max(1));
        let (latest, _) = watch::channel(StageEvent {
            stage: Stage::Initial,
            generation: Generation::ZERO,
        });
        Self {
            stages,
            messages,
            latest,
        }
    }

    /// Subscribe to stage transitions.
    pub fn subscribe_stages(&self) -> broadcast::Receiver<StageEvent> {
        self.stages.subscribe()
    }

    /// Subscribe to inbound messages.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<Message> {
        self.messages.subscribe()
    }

    /// Watch the latest stage.
    pub fn watch_stage(&self) -> watch::Receiver<StageEvent> {
        self.latest.subscribe()
    }

    /// Publish a stage transition to every subscriber.
    pub fn publish_stage(&self, event: StageEvent) {
        self.latest.send_replace(event);
        // No subscribers is not an error.
        let _ = self.stages.send(event);
    }

    /// Update the latest stage without notifying stage subscribers.
    pub fn record_stage(&self, event: StageEvent) {
        self.latest.send_replace(event);
    }

    /// Publish an inbound message to every subscriber.
    pub fn publish_message(&self, message: Message) {
        let _ = self.messages.send(message);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn event(stage: Stage) -> StageEvent {
        StageEvent {
            stage,
            generation: Generation::ZERO,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = EventHub::default();
        hub.publish_stage(event(Stage::Authenticating));
        hub.publish_message(Message::text("dropped"));
        assert_eq!(hub.watch_stage().borrow().stage, Stage::Authenticating);
    }

    #[test]
    fn test_fan_out_in_order() {
        let hub = EventHub::default();
        let mut a = hub.subscribe_stages();
        let mut b = hub.subscribe_stages();

        hub.publish_stage(event(Stage::Authenticating));
        hub.publish_stage(event(Stage::Connecting));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.try_recv().unwrap().stage, Stage::Authenticating);
            assert_eq!(rx.try_recv().unwrap().stage, Stage::Connecting);
            assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    #[test]
    fn test_late_subscriber_sees_only_new_events() {
        let hub = EventHub::default();
        hub.publish_message(Message::text("early"));

        let mut rx = hub.subscribe_messages();
        hub.publish_message(Message::text("late"));

        assert_eq!(rx.try_recv().unwrap(), Message::text("late"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_record_stage_is_silent() {
        let hub = EventHub::default();
        let mut rx = hub.subscribe_stages();

        hub.record_stage(event(Stage::Initial));

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(hub.watch_stage().borrow().stage, Stage::Initial);
    }
}
