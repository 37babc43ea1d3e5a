//! Long-running query detector.
//!
//! Fires when the longest currently running query exceeds the configured
//! duration. Severity bands: `>= 120 s` critical, `>= 60 s` warning, else
//! info.

use serde_json::json;

use crate::detection::{Detection, DetectionCategory, DetectionSeverity};
use crate::detectors::Detector;
use crate::snapshot::NormalizedSnapshot;

const DEFAULT_QUERY_THRESHOLD_SECS: f64 = 30.0;

/// Collector keys describing the longest running query.
const METRIC_QUERY_DURATION: &str = "pg.longest_query_duration_secs";
const LABEL_QUERY_PID: &str = "pg.longest_query_pid";
const LABEL_QUERY_USER: &str = "pg.longest_query_user";
const LABEL_QUERY_TEXT: &str = "pg.longest_query_text";

pub struct LongRunningQueryDetector {
    threshold_secs: f64,
}

impl LongRunningQueryDetector {
    pub fn new() -> Self {
        Self {
            threshold_secs: DEFAULT_QUERY_THRESHOLD_SECS,
        }
    }

    /// Override the query duration threshold (seconds).
    pub fn set_threshold(&mut self, threshold_secs: f64) {
        self.threshold_secs = threshold_secs;
    }

    fn severity_for(duration_secs: f64) -> DetectionSeverity {
        if duration_secs >= 120.0 {
            DetectionSeverity::Critical
        } else if duration_secs >= 60.0 {
            DetectionSeverity::Warning
        } else {
            DetectionSeverity::Info
        }
    }
}

impl Default for LongRunningQueryDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for LongRunningQueryDetector {
    fn name(&self) -> &'static str {
        "long_running_query"
    }

    fn category(&self) -> DetectionCategory {
        DetectionCategory::Query
    }

    fn evaluate(&self, snapshot: &NormalizedSnapshot) -> Option<Detection> {
        let duration = snapshot
            .extended_metrics
            .get(METRIC_QUERY_DURATION)
            .copied()?;
        if duration < self.threshold_secs {
            return None;
        }

        let pid = snapshot.labels.get(LABEL_QUERY_PID)?;
        let username = snapshot
            .labels
            .get(LABEL_QUERY_USER)
            .map(String::as_str)
            .unwrap_or("");
        let query_text = snapshot
            .labels
            .get(LABEL_QUERY_TEXT)
            .map(String::as_str)
            .unwrap_or("");

        let mut detection = Detection::new(
            self.name(),
            self.category(),
            Self::severity_for(duration),
            &snapshot.database_id,
            snapshot.timestamp,
        );

        detection.title = format!("Long-running query detected ({duration:.0}s)");
        detection.description = format!(
            "Query running for {duration:.0} seconds by user '{username}'. Long-running \
             queries can hold locks, consume resources, and block other operations. \
             Query: {query_text}"
        );

        detection.evidence.insert("pid".into(), json!(pid));
        detection.evidence.insert("username".into(), json!(username));
        detection.evidence.insert("query".into(), json!(query_text));
        detection
            .evidence
            .insert("duration_secs".into(), json!(duration));

        detection.recommendation = format!(
            "Consider terminating the query (PID {pid}) if it is not critical. \
             Investigate why the query is running slowly; it may need index \
             optimization or query restructuring."
        );

        detection.action_type = Some("terminate_query".into());
        detection.action_metadata.insert("pid".into(), json!(pid));
        detection
            .action_metadata
            .insert("username".into(), json!(username));
        // Cancel first, terminate only if the cancel is ignored.
        detection.action_metadata.insert("graceful".into(), json!(true));

        detection.assign_key();
        Some(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slow_query_snapshot(duration_secs: f64) -> NormalizedSnapshot {
        let mut snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        snapshot
            .extended_metrics
            .insert(METRIC_QUERY_DURATION.into(), duration_secs);
        snapshot.labels.insert(LABEL_QUERY_PID.into(), "777".into());
        snapshot
            .labels
            .insert(LABEL_QUERY_USER.into(), "report".into());
        snapshot
            .labels
            .insert(LABEL_QUERY_TEXT.into(), "SELECT * FROM orders".into());
        snapshot
    }

    #[test]
    fn fast_query_produces_nothing() {
        let detector = LongRunningQueryDetector::new();
        assert!(detector.evaluate(&slow_query_snapshot(10.0)).is_none());
    }

    #[test]
    fn absent_metric_produces_nothing() {
        let detector = LongRunningQueryDetector::new();
        let snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        assert!(detector.evaluate(&snapshot).is_none());
    }

    #[test]
    fn missing_pid_produces_nothing() {
        let detector = LongRunningQueryDetector::new();
        let mut snapshot = slow_query_snapshot(90.0);
        snapshot.labels.remove(LABEL_QUERY_PID);
        assert!(detector.evaluate(&snapshot).is_none());
    }

    #[test]
    fn severity_bands() {
        let detector = LongRunningQueryDetector::new();
        let info = detector.evaluate(&slow_query_snapshot(45.0)).unwrap();
        assert_eq!(info.severity, DetectionSeverity::Info);

        let warning = detector.evaluate(&slow_query_snapshot(90.0)).unwrap();
        assert_eq!(warning.severity, DetectionSeverity::Warning);

        let critical = detector.evaluate(&slow_query_snapshot(180.0)).unwrap();
        assert_eq!(critical.severity, DetectionSeverity::Critical);
    }

    #[test]
    fn termination_is_graceful() {
        let detector = LongRunningQueryDetector::new();
        let detection = detector.evaluate(&slow_query_snapshot(90.0)).unwrap();
        assert_eq!(detection.action_type.as_deref(), Some("terminate_query"));
        assert_eq!(detection.action_metadata["graceful"], json!(true));
    }

    #[test]
    fn key_falls_back_to_category() {
        let detector = LongRunningQueryDetector::new();
        let detection = detector.evaluate(&slow_query_snapshot(90.0)).unwrap();
        assert_eq!(detection.key, "db-1:long_running_query:query");
    }
}
