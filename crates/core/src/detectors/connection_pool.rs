//! Connection pool utilization detector.
//!
//! Fires when active connections approach the configured maximum. Severity
//! bands: `>= 0.95` critical, `>= 0.85` warning, above the threshold info.

use serde_json::json;

use crate::detection::{Detection, DetectionCategory, DetectionSeverity};
use crate::detectors::{is_postgres, Detector};
use crate::snapshot::NormalizedSnapshot;

const DEFAULT_USAGE_THRESHOLD: f64 = 0.80;

pub struct ConnectionPoolDetector {
    usage_threshold: f64,
}

impl ConnectionPoolDetector {
    pub fn new() -> Self {
        Self {
            usage_threshold: DEFAULT_USAGE_THRESHOLD,
        }
    }

    /// Override the utilization ratio above which the detector fires.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.usage_threshold = threshold;
    }

    fn severity_for(usage_ratio: f64) -> DetectionSeverity {
        if usage_ratio >= 0.95 {
            DetectionSeverity::Critical
        } else if usage_ratio >= 0.85 {
            DetectionSeverity::Warning
        } else {
            DetectionSeverity::Info
        }
    }

    fn recommended_tool(database_type: &str) -> &'static str {
        if is_postgres(database_type) {
            "pgbouncer"
        } else {
            match database_type {
                "mysql" => "proxysql",
                "mongodb" => "driver_config",
                _ => "unknown",
            }
        }
    }

    fn recommendation(database_type: &str, usage_pct: i64) -> String {
        if is_postgres(database_type) {
            format!(
                "Deploy PgBouncer to manage PostgreSQL connections efficiently. PgBouncer \
                 reduces connection overhead by pooling and reusing connections. \
                 Current usage: {usage_pct}%."
            )
        } else if database_type == "mysql" {
            format!(
                "Deploy ProxySQL to manage MySQL connections efficiently. ProxySQL provides \
                 connection pooling and query routing. Current usage: {usage_pct}%."
            )
        } else if database_type == "mongodb" {
            "MongoDB drivers include built-in connection pooling. Increase maxPoolSize in \
             your connection string or driver configuration."
                .to_string()
        } else {
            "Connection pool exhaustion detected. Deploy a connection pooler appropriate \
             for your database."
                .to_string()
        }
    }
}

impl Default for ConnectionPoolDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for ConnectionPoolDetector {
    fn name(&self) -> &'static str {
        "connection_pool_saturation"
    }

    fn category(&self) -> DetectionCategory {
        DetectionCategory::Connection
    }

    fn evaluate(&self, snapshot: &NormalizedSnapshot) -> Option<Detection> {
        let active = snapshot.measurements.active_connections? as f64;
        let max = snapshot.measurements.max_connections? as f64;

        if max == 0.0 {
            return None;
        }

        let usage_ratio = active / max;
        if usage_ratio < self.usage_threshold {
            return None;
        }

        let usage_pct = (usage_ratio * 100.0) as i64;

        let mut detection = Detection::new(
            self.name(),
            self.category(),
            Self::severity_for(usage_ratio),
            &snapshot.database_id,
            snapshot.timestamp,
        );

        detection.title = format!("Connection pool at {usage_pct}% capacity");
        detection.description = format!(
            "Database connection pool is using {} out of {} available connections ({:.1}%). \
             When the pool is exhausted, new connections are queued or refused, causing \
             timeouts and degraded user experience.",
            active as i64,
            max as i64,
            usage_ratio * 100.0,
        );

        detection
            .evidence
            .insert("active_connections".into(), json!(active as i64));
        detection
            .evidence
            .insert("max_connections".into(), json!(max as i64));
        detection.evidence.insert("usage_ratio".into(), json!(usage_ratio));
        detection.evidence.insert("usage_percent".into(), json!(usage_pct));

        detection.recommendation = Self::recommendation(&snapshot.database_type, usage_pct);

        detection.action_type = Some("deploy_connection_pooler".into());
        detection.action_metadata.insert("priority".into(), json!("high"));
        detection
            .action_metadata
            .insert("database_type".into(), json!(snapshot.database_type));
        detection.action_metadata.insert(
            "recommended_tool".into(),
            json!(Self::recommended_tool(&snapshot.database_type)),
        );
        detection
            .action_metadata
            .insert("current_usage".into(), json!(usage_pct));

        detection.assign_key();
        Some(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_pool(active: Option<i32>, max: Option<i32>) -> NormalizedSnapshot {
        let mut snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        snapshot.measurements.active_connections = active;
        snapshot.measurements.max_connections = max;
        snapshot
    }

    #[test]
    fn low_usage_produces_nothing() {
        let detector = ConnectionPoolDetector::new();
        assert!(detector
            .evaluate(&snapshot_with_pool(Some(40), Some(100)))
            .is_none());
    }

    #[test]
    fn missing_measurements_produce_nothing() {
        let detector = ConnectionPoolDetector::new();
        assert!(detector.evaluate(&snapshot_with_pool(None, Some(100))).is_none());
        assert!(detector.evaluate(&snapshot_with_pool(Some(40), None)).is_none());
    }

    #[test]
    fn zero_max_connections_produces_nothing() {
        let detector = ConnectionPoolDetector::new();
        assert!(detector.evaluate(&snapshot_with_pool(Some(5), Some(0))).is_none());
    }

    #[test]
    fn high_usage_is_warning() {
        let detector = ConnectionPoolDetector::new();
        let detection = detector
            .evaluate(&snapshot_with_pool(Some(88), Some(100)))
            .expect("should fire");
        assert_eq!(detection.severity, DetectionSeverity::Warning);
    }

    #[test]
    fn near_exhaustion_is_critical() {
        let detector = ConnectionPoolDetector::new();
        let detection = detector
            .evaluate(&snapshot_with_pool(Some(97), Some(100)))
            .expect("should fire");
        assert_eq!(detection.severity, DetectionSeverity::Critical);
        assert_eq!(
            detection.action_type.as_deref(),
            Some("deploy_connection_pooler")
        );
        assert_eq!(
            detection.action_metadata["recommended_tool"],
            serde_json::json!("pgbouncer")
        );
    }

    #[test]
    fn above_threshold_below_warning_is_info() {
        let detector = ConnectionPoolDetector::new();
        let detection = detector
            .evaluate(&snapshot_with_pool(Some(82), Some(100)))
            .expect("should fire");
        assert_eq!(detection.severity, DetectionSeverity::Info);
    }
}
