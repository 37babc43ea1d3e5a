//! Well-known topic names.
//!
//! These are the canonical topic strings used when bridging the in-process
//! bus onto an external broker, and in log output.

/// Normalized snapshots arriving from the collector.
pub const TOPIC_SNAPSHOTS: &str = "snapshots";

/// Newly registered detections, one message per accepted registration.
pub const TOPIC_DETECTIONS: &str = "detections";

/// Remediation action completion notifications from the executor.
pub const TOPIC_ACTIONS_COMPLETED: &str = "actions.completed";

/// Explicit remediation rollback requests raised after failed verification.
pub const TOPIC_ROLLBACK_REQUESTED: &str = "rollback.requested";
