//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`AnalysisEvent`]s.
//! It is shared via `Arc<EventBus>` between the API handlers and the
//! pipeline workers.

use chrono::{DateTime, Utc};
use matchlens_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// AnalysisEvent
// ---------------------------------------------------------------------------

/// A domain event emitted by the analysis backend.
///
/// Event types in use: `job.queued`, `job.running`, `job.done`,
/// `job.partial`, `job.error`, `review.flagged`, `review.resolved`,
/// `stats.recalculated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEvent {
    /// Dot-separated event name, e.g. `"job.done"`.
    pub event_type: String,

    /// The match this event concerns.
    pub match_id: DbId,

    /// The job this event concerns, when job-scoped.
    pub job_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl AnalysisEvent {
    /// Create a new event for a match with only the required fields.
    pub fn new(event_type: impl Into<String>, match_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            match_id,
            job_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the job this event concerns.
    pub fn with_job(mut self, job_id: DbId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`AnalysisEvent`].
pub struct EventBus {
    sender: broadcast::Sender<AnalysisEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// all durable state lives in Postgres, the bus only signals change.
    pub fn publish(&self, event: AnalysisEvent) {
        // A SendError only means there are zero receivers right now.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = AnalysisEvent::new("job.done", 3)
            .with_job(11)
            .with_payload(serde_json::json!({"half": "first"}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "job.done");
        assert_eq!(received.match_id, 3);
        assert_eq!(received.job_id, Some(11));
        assert_eq!(received.payload["half"], "first");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(AnalysisEvent::new("review.flagged", 1));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, "review.flagged");
        assert_eq!(e2.event_type, "review.flagged");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(AnalysisEvent::new("stats.recalculated", 9));
    }

    #[test]
    fn new_event_has_empty_optional_fields() {
        let event = AnalysisEvent::new("job.queued", 5);
        assert_eq!(event.event_type, "job.queued");
        assert_eq!(event.match_id, 5);
        assert!(event.job_id.is_none());
        assert!(event.payload.is_object());
    }
}
