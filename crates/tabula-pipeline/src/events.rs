//! Pipeline event system for observability.
//!
//! Emits [`ListEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! external observers (loggers, metrics collectors, UI, etc.) can follow step
//! execution without coupling to the engine. Sending never blocks, so the
//! synchronous engine can emit without a runtime.

use serde::{Deserialize, Serialize};

/// Events emitted while a pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ListEvent {
    StepStarted {
        pipeline: String,
        step: String,
        implementation: String,
    },
    StepCompleted {
        pipeline: String,
        step: String,
        duration_ms: u64,
    },
    StepFailed {
        pipeline: String,
        step: String,
        error: String,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<ListEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: ListEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ListEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitter_sends_and_receives() {
        let emitter = EventEmitter::new(16);
        let mut rx = emitter.subscribe();

        emitter.emit(ListEvent::StepStarted {
            pipeline: "people".into(),
            step: "sort".into(),
            implementation: "sort".into(),
        });

        let event = rx.recv().await.unwrap();
        match event {
            ListEvent::StepStarted { pipeline, step, .. } => {
                assert_eq!(pipeline, "people");
                assert_eq!(step, "sort");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let emitter = EventEmitter::new(16);
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();

        emitter.emit(ListEvent::StepCompleted {
            pipeline: "people".into(),
            step: "retrieve".into(),
            duration_ms: 3,
        });

        assert_eq!(rx1.recv().await.unwrap(), rx2.recv().await.unwrap());
    }

    #[test]
    fn emit_with_no_subscribers_does_not_panic() {
        let emitter = EventEmitter::new(16);
        emitter.emit(ListEvent::StepFailed {
            pipeline: "people".into(),
            step: "paginate".into(),
            error: "boom".into(),
        });
    }

    #[test]
    fn subscriber_can_drain_without_runtime() {
        let emitter = EventEmitter::default();
        let mut rx = emitter.subscribe();
        emitter.emit(ListEvent::StepFailed {
            pipeline: "p".into(),
            step: "s".into(),
            error: "e".into(),
        });
        assert!(matches!(rx.try_recv(), Ok(ListEvent::StepFailed { .. })));
        assert!(rx.try_recv().is_err());
    }
}
