//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`AnalysisEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the service.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use dbpulse_core::detection::Detection;
use dbpulse_core::snapshot::NormalizedSnapshot;
use dbpulse_core::types::UnixSeconds;

use crate::topics;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Terminal outcome of a remediation action, as reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Completed,
    Failed,
}

/// Published on `actions.completed` when the executor finishes an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCompleted {
    pub action_id: String,
    pub detection_id: String,
    pub detection_key: String,
    pub action_type: String,
    pub database_id: String,
    pub status: CompletionStatus,
    /// Solution text stamped onto the detection record when resolved.
    pub solution: String,
    pub message: String,
    /// When the executor completed the action (unix seconds). Used by the
    /// verification tracker for last-remediation-wins ordering.
    pub timestamp: UnixSeconds,
}

/// Published on `rollback.requested` when verification exhausts its window
/// without observing the fault clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub action_id: String,
    pub detection_id: String,
    pub action_type: String,
    pub database_id: String,
    pub reason: String,
    pub timestamp: UnixSeconds,
}

/// A typed event on the analysis bus, one variant per topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum AnalysisEvent {
    #[serde(rename = "snapshots")]
    Snapshot(NormalizedSnapshot),
    #[serde(rename = "detections")]
    Detection(Detection),
    #[serde(rename = "actions.completed")]
    ActionCompleted(ActionCompleted),
    #[serde(rename = "rollback.requested")]
    RollbackRequested(RollbackRequest),
}

impl AnalysisEvent {
    /// Canonical topic string for this event.
    pub fn topic(&self) -> &'static str {
        match self {
            AnalysisEvent::Snapshot(_) => topics::TOPIC_SNAPSHOTS,
            AnalysisEvent::Detection(_) => topics::TOPIC_DETECTIONS,
            AnalysisEvent::ActionCompleted(_) => topics::TOPIC_ACTIONS_COMPLETED,
            AnalysisEvent::RollbackRequested(_) => topics::TOPIC_ROLLBACK_REQUESTED,
        }
    }
}

/// Envelope stamped onto every published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    /// Process-monotonic publish sequence. Not a cross-restart ordering
    /// guarantee; consumers needing durable ordering use payload timestamps.
    pub seq: u64,
    /// When the message was published (UTC).
    pub published_at: DateTime<Utc>,
    pub event: AnalysisEvent,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`BusMessage`]. When the buffer is
/// full, the oldest un-consumed messages are dropped and slow receivers
/// observe `RecvError::Lagged` — tolerated per the at-least-once,
/// lossy-under-pressure transport contract.
pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
    next_seq: AtomicU64,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    /// Returns the sequence number stamped onto the message.
    pub fn publish(&self, event: AnalysisEvent) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let message = BusMessage {
            seq,
            published_at: Utc::now(),
            event,
        };
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(message);
        seq
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
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
    use dbpulse_core::detection::{DetectionCategory, DetectionSeverity};

    fn sample_detection() -> Detection {
        let mut d = Detection::new(
            "low_cache_hit_rate",
            DetectionCategory::Cache,
            DetectionSeverity::Warning,
            "db-1",
            1_700_000_000,
        );
        d.assign_key();
        d
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(AnalysisEvent::Detection(sample_detection()));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event.topic(), "detections");
        match received.event {
            AnalysisEvent::Detection(d) => assert_eq!(d.database_id, "db-1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(AnalysisEvent::RollbackRequested(RollbackRequest {
            action_id: "action-1".into(),
            detection_id: "det-1".into(),
            action_type: "create_index".into(),
            database_id: "db-1".into(),
            reason: "re-detected".into(),
            timestamp: 1_700_000_100,
        }));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event.topic(), "rollback.requested");
        assert_eq!(e2.event.topic(), "rollback.requested");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(AnalysisEvent::Detection(sample_detection()));
    }

    #[tokio::test]
    async fn sequence_is_monotonic() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        for _ in 0..3 {
            bus.publish(AnalysisEvent::Detection(sample_detection()));
        }

        let a = rx.recv().await.unwrap().seq;
        let b = rx.recv().await.unwrap().seq;
        let c = rx.recv().await.unwrap().seq;
        assert!(a < b && b < c);
    }

    #[test]
    fn action_completed_round_trips() {
        let event = AnalysisEvent::ActionCompleted(ActionCompleted {
            action_id: "action-1".into(),
            detection_id: "det-1".into(),
            detection_key: "db-1:missing_index:users.email".into(),
            action_type: "create_index".into(),
            database_id: "db-1".into(),
            status: CompletionStatus::Completed,
            solution: "index created".into(),
            message: "CREATE INDEX CONCURRENTLY finished".into(),
            timestamp: 1_700_000_200,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""topic":"actions.completed""#));

        let back: AnalysisEvent = serde_json::from_str(&json).unwrap();
        match back {
            AnalysisEvent::ActionCompleted(e) => {
                assert_eq!(e.status, CompletionStatus::Completed);
                assert_eq!(e.detection_key, "db-1:missing_index:users.email");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
