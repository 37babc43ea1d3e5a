//! Query latency percentile detector.
//!
//! Fires when p95 query latency exceeds the configured threshold. Severity
//! bands relative to the threshold: `> 3x` critical, `> 2x` warning, else
//! info.

use serde_json::json;

use crate::detection::{Detection, DetectionCategory, DetectionSeverity};
use crate::detectors::{is_postgres, Detector};
use crate::snapshot::NormalizedSnapshot;

const DEFAULT_P95_THRESHOLD_MS: f64 = 500.0;

pub struct QueryLatencyDetector {
    p95_threshold_ms: f64,
}

impl QueryLatencyDetector {
    pub fn new() -> Self {
        Self {
            p95_threshold_ms: DEFAULT_P95_THRESHOLD_MS,
        }
    }

    /// Override the p95 latency threshold (milliseconds).
    pub fn set_threshold(&mut self, threshold_ms: f64) {
        self.p95_threshold_ms = threshold_ms;
    }

    fn severity_for(&self, latency_ms: f64) -> DetectionSeverity {
        if latency_ms > self.p95_threshold_ms * 3.0 {
            DetectionSeverity::Critical
        } else if latency_ms > self.p95_threshold_ms * 2.0 {
            DetectionSeverity::Warning
        } else {
            DetectionSeverity::Info
        }
    }

    fn recommendation(database_type: &str, latency_ms: f64) -> String {
        if is_postgres(database_type) {
            format!(
                "p95 query latency is high ({latency_ms:.0}ms). Enable pg_stat_statements, \
                 identify the slowest queries, and run EXPLAIN ANALYZE on them to find \
                 missing indexes or inefficient plans. Consider VACUUM ANALYZE to refresh \
                 planner statistics."
            )
        } else if database_type == "mysql" {
            format!(
                "p95 query latency is high ({latency_ms:.0}ms). Enable the slow query log, \
                 review logged statements, and run EXPLAIN on them to find missing indexes. \
                 Refresh statistics with ANALYZE TABLE."
            )
        } else {
            format!(
                "p95 query latency is high ({latency_ms:.0}ms). Profile slow queries, \
                 analyze their execution plans, and create indexes on filtered or joined \
                 columns."
            )
        }
    }
}

impl Default for QueryLatencyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for QueryLatencyDetector {
    fn name(&self) -> &'static str {
        "high_query_latency"
    }

    fn category(&self) -> DetectionCategory {
        DetectionCategory::Query
    }

    fn evaluate(&self, snapshot: &NormalizedSnapshot) -> Option<Detection> {
        let p95 = snapshot.measurements.p95_query_latency_ms?;

        if p95 <= self.p95_threshold_ms {
            return None;
        }

        let mut detection = Detection::new(
            self.name(),
            self.category(),
            self.severity_for(p95),
            &snapshot.database_id,
            snapshot.timestamp,
        );

        detection.title = format!("High p95 query latency ({p95:.0}ms)");
        detection.description = format!(
            "95th percentile query latency is {p95:.0}ms (threshold: {:.0}ms). Slow queries \
             degrade application responsiveness. Common causes include missing indexes, \
             inefficient queries, lock contention, or insufficient resources.",
            self.p95_threshold_ms,
        );

        detection.evidence.insert("p95_latency_ms".into(), json!(p95));
        detection
            .evidence
            .insert("threshold_ms".into(), json!(self.p95_threshold_ms));
        if let Some(p99) = snapshot.measurements.p99_query_latency_ms {
            detection.evidence.insert("p99_latency_ms".into(), json!(p99));
        }
        if let Some(avg) = snapshot.measurements.avg_query_latency_ms {
            detection.evidence.insert("avg_latency_ms".into(), json!(avg));
        }

        detection.recommendation = Self::recommendation(&snapshot.database_type, p95);

        detection.action_type = Some("tune_config_high_latency".into());
        detection.action_metadata.insert("priority".into(), json!("high"));
        detection
            .action_metadata
            .insert("database_type".into(), json!(snapshot.database_type));
        detection
            .action_metadata
            .insert("current_latency_ms".into(), json!(p95));

        detection.assign_key();
        Some(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_p95(p95: Option<f64>) -> NormalizedSnapshot {
        let mut snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        snapshot.measurements.p95_query_latency_ms = p95;
        snapshot
    }

    #[test]
    fn below_threshold_produces_nothing() {
        let detector = QueryLatencyDetector::new();
        assert!(detector.evaluate(&snapshot_with_p95(Some(200.0))).is_none());
    }

    #[test]
    fn absent_measurement_produces_nothing() {
        let detector = QueryLatencyDetector::new();
        assert!(detector.evaluate(&snapshot_with_p95(None)).is_none());
    }

    #[test]
    fn just_over_threshold_is_info() {
        let detector = QueryLatencyDetector::new();
        let detection = detector
            .evaluate(&snapshot_with_p95(Some(600.0)))
            .expect("should fire");
        assert_eq!(detection.severity, DetectionSeverity::Info);
    }

    #[test]
    fn double_threshold_is_warning() {
        let detector = QueryLatencyDetector::new();
        let detection = detector
            .evaluate(&snapshot_with_p95(Some(1_100.0)))
            .expect("should fire");
        assert_eq!(detection.severity, DetectionSeverity::Warning);
    }

    #[test]
    fn triple_threshold_is_critical() {
        let detector = QueryLatencyDetector::new();
        let detection = detector
            .evaluate(&snapshot_with_p95(Some(2_000.0)))
            .expect("should fire");
        assert_eq!(detection.severity, DetectionSeverity::Critical);
        assert_eq!(
            detection.action_type.as_deref(),
            Some("tune_config_high_latency")
        );
    }

    #[test]
    fn p99_included_in_evidence_when_present() {
        let detector = QueryLatencyDetector::new();
        let mut snapshot = snapshot_with_p95(Some(2_000.0));
        snapshot.measurements.p99_query_latency_ms = Some(3_500.0);
        let detection = detector.evaluate(&snapshot).unwrap();
        assert_eq!(detection.evidence["p99_latency_ms"], json!(3_500.0));
    }

    #[test]
    fn custom_threshold_shifts_bands() {
        let mut detector = QueryLatencyDetector::new();
        detector.set_threshold(100.0);
        let detection = detector
            .evaluate(&snapshot_with_p95(Some(350.0)))
            .expect("should fire");
        assert_eq!(detection.severity, DetectionSeverity::Critical);
    }
}
