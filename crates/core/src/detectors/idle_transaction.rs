//! Idle-in-transaction detector.
//!
//! Fires when a connection has sat idle inside an open transaction past the
//! configured duration. Idle transactions hold locks, block VACUUM, and pin
//! connection slots. Severity bands: `>= 15 min` critical, `>= 10 min`
//! warning, else info.

use serde_json::json;

use crate::detection::{Detection, DetectionCategory, DetectionSeverity};
use crate::detectors::Detector;
use crate::snapshot::NormalizedSnapshot;

const DEFAULT_IDLE_THRESHOLD_SECS: f64 = 300.0;

/// Collector keys describing the longest-idle transaction.
const METRIC_IDLE_DURATION: &str = "pg.idle_txn_duration_secs";
const LABEL_IDLE_PID: &str = "pg.idle_txn_pid";
const LABEL_IDLE_USER: &str = "pg.idle_txn_user";
const LABEL_IDLE_QUERY: &str = "pg.idle_txn_query";

pub struct IdleTransactionDetector {
    threshold_secs: f64,
}

impl IdleTransactionDetector {
    pub fn new() -> Self {
        Self {
            threshold_secs: DEFAULT_IDLE_THRESHOLD_SECS,
        }
    }

    /// Override the idle duration threshold (seconds).
    pub fn set_threshold(&mut self, threshold_secs: f64) {
        self.threshold_secs = threshold_secs;
    }

    fn severity_for(duration_secs: f64) -> DetectionSeverity {
        if duration_secs >= 900.0 {
            DetectionSeverity::Critical
        } else if duration_secs >= 600.0 {
            DetectionSeverity::Warning
        } else {
            DetectionSeverity::Info
        }
    }
}

impl Default for IdleTransactionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for IdleTransactionDetector {
    fn name(&self) -> &'static str {
        "idle_transaction"
    }

    fn category(&self) -> DetectionCategory {
        DetectionCategory::Connection
    }

    fn evaluate(&self, snapshot: &NormalizedSnapshot) -> Option<Detection> {
        let duration = snapshot
            .extended_metrics
            .get(METRIC_IDLE_DURATION)
            .copied()?;
        if duration < self.threshold_secs {
            return None;
        }

        // Without a backend pid there is nothing the executor can act on.
        let pid = snapshot.labels.get(LABEL_IDLE_PID)?;
        let username = snapshot
            .labels
            .get(LABEL_IDLE_USER)
            .map(String::as_str)
            .unwrap_or("");
        let query = snapshot
            .labels
            .get(LABEL_IDLE_QUERY)
            .map(String::as_str)
            .unwrap_or("");

        let duration_mins = duration / 60.0;

        let mut detection = Detection::new(
            self.name(),
            self.category(),
            Self::severity_for(duration),
            &snapshot.database_id,
            snapshot.timestamp,
        );

        detection.title = format!("Idle transaction detected ({duration_mins:.0} minutes)");
        detection.description = format!(
            "Connection held by user '{username}' has been idle in transaction for \
             {duration_mins:.0} minutes. Idle transactions hold locks, block VACUUM, and \
             consume connection slots. Last query: {query}"
        );

        detection.evidence.insert("pid".into(), json!(pid));
        detection.evidence.insert("username".into(), json!(username));
        detection.evidence.insert("query".into(), json!(query));
        detection
            .evidence
            .insert("idle_duration_secs".into(), json!(duration));
        detection
            .evidence
            .insert("idle_duration_mins".into(), json!(duration_mins));

        detection.recommendation = format!(
            "Terminate the idle connection (PID {pid}) to release locks and free the \
             connection slot. Investigate the application code to ensure transactions \
             are properly committed or rolled back."
        );

        detection.action_type = Some("terminate_query".into());
        detection.action_metadata.insert("pid".into(), json!(pid));
        detection
            .action_metadata
            .insert("username".into(), json!(username));
        // Idle transactions are terminated outright, never cancelled first.
        detection.action_metadata.insert("graceful".into(), json!(false));

        detection.assign_key();
        Some(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_snapshot(duration_secs: f64) -> NormalizedSnapshot {
        let mut snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        snapshot
            .extended_metrics
            .insert(METRIC_IDLE_DURATION.into(), duration_secs);
        snapshot.labels.insert(LABEL_IDLE_PID.into(), "4242".into());
        snapshot.labels.insert(LABEL_IDLE_USER.into(), "app".into());
        snapshot
            .labels
            .insert(LABEL_IDLE_QUERY.into(), "SELECT 1".into());
        snapshot
    }

    #[test]
    fn short_idle_produces_nothing() {
        let detector = IdleTransactionDetector::new();
        assert!(detector.evaluate(&idle_snapshot(120.0)).is_none());
    }

    #[test]
    fn absent_metric_produces_nothing() {
        let detector = IdleTransactionDetector::new();
        let snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        assert!(detector.evaluate(&snapshot).is_none());
    }

    #[test]
    fn missing_pid_produces_nothing() {
        let detector = IdleTransactionDetector::new();
        let mut snapshot = idle_snapshot(700.0);
        snapshot.labels.remove(LABEL_IDLE_PID);
        assert!(detector.evaluate(&snapshot).is_none());
    }

    #[test]
    fn severity_bands() {
        let detector = IdleTransactionDetector::new();
        let info = detector.evaluate(&idle_snapshot(400.0)).unwrap();
        assert_eq!(info.severity, DetectionSeverity::Info);

        let warning = detector.evaluate(&idle_snapshot(700.0)).unwrap();
        assert_eq!(warning.severity, DetectionSeverity::Warning);

        let critical = detector.evaluate(&idle_snapshot(1_000.0)).unwrap();
        assert_eq!(critical.severity, DetectionSeverity::Critical);
    }

    #[test]
    fn termination_is_not_graceful() {
        let detector = IdleTransactionDetector::new();
        let detection = detector.evaluate(&idle_snapshot(700.0)).unwrap();
        assert_eq!(detection.action_type.as_deref(), Some("terminate_query"));
        assert_eq!(detection.action_metadata["graceful"], json!(false));
        assert_eq!(detection.action_metadata["pid"], json!("4242"));
    }

    #[test]
    fn custom_threshold_is_honored() {
        let mut detector = IdleTransactionDetector::new();
        detector.set_threshold(60.0);
        assert!(detector.evaluate(&idle_snapshot(90.0)).is_some());
    }

    #[test]
    fn key_falls_back_to_category() {
        let detector = IdleTransactionDetector::new();
        let detection = detector.evaluate(&idle_snapshot(700.0)).unwrap();
        assert_eq!(detection.key, "db-1:idle_transaction:connection");
    }
}
