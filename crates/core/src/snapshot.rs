//! Normalized metrics snapshot — the read-only input to every detection run.
//!
//! Snapshots are produced by an external collector, one per database per
//! collection tick. Every measurement is optional: a database engine that
//! cannot report a metric simply leaves it unset, and detectors that depend
//! on it skip silently.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::UnixSeconds;

/// Engine-agnostic measurement bundle for a single collection tick.
///
/// Field availability varies by database engine; `None` means the metric was
/// not reported, never that it was zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measurements {
    // Connections
    pub active_connections: Option<i32>,
    pub max_connections: Option<i32>,

    // Query latency
    pub avg_query_latency_ms: Option<f64>,
    pub p95_query_latency_ms: Option<f64>,
    pub p99_query_latency_ms: Option<f64>,

    // Table access patterns
    pub sequential_scans: Option<i64>,

    // Cache
    pub cache_hit_rate: Option<f64>,
}

/// One database-engine-agnostic bundle of measurements for one tick.
///
/// Immutable and read-only to the analysis core. Serde round-trippable so it
/// can travel over any transport the deployment chooses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSnapshot {
    /// Stable identifier of the monitored database.
    pub database_id: String,
    /// Database engine name (e.g. `"postgres"`, `"mysql"`); used to
    /// specialize recommendation text.
    pub database_type: String,
    /// When the measurements were taken (unix seconds).
    pub timestamp: UnixSeconds,

    /// Cache subsystem health score in `0.0..=1.0`.
    pub cache_health: f64,

    /// Typed measurements shared by all engines.
    pub measurements: Measurements,

    /// Engine-specific numeric metrics keyed by dotted name
    /// (e.g. `"pg.table.users.seq_scans"`).
    #[serde(default)]
    pub extended_metrics: HashMap<String, f64>,

    /// Engine-specific string annotations
    /// (e.g. `"pg.worst_seq_scan_table"`).
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Per-metric change since the previous tick, when the collector has a
    /// previous tick to diff against.
    #[serde(default)]
    pub metric_deltas: Option<HashMap<String, f64>>,
}

impl NormalizedSnapshot {
    /// Create an empty snapshot for the given database.
    ///
    /// Useful as a starting point in tests and for collectors that fill in
    /// measurements incrementally.
    pub fn new(
        database_id: impl Into<String>,
        database_type: impl Into<String>,
        timestamp: UnixSeconds,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            database_type: database_type.into(),
            timestamp,
            cache_health: 1.0,
            measurements: Measurements::default(),
            extended_metrics: HashMap::new(),
            labels: HashMap::new(),
            metric_deltas: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_all_fields() {
        let mut snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        snapshot.cache_health = 0.42;
        snapshot.measurements.cache_hit_rate = Some(0.81);
        snapshot.measurements.active_connections = Some(37);
        snapshot
            .extended_metrics
            .insert("pg.table.users.seq_scans".into(), 120.0);
        snapshot
            .labels
            .insert("pg.worst_seq_scan_table".into(), "users".into());
        snapshot.metric_deltas = Some(HashMap::from([("sequential_scans".into(), 15.0)]));

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: NormalizedSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(back.database_id, "db-1");
        assert_eq!(back.database_type, "postgres");
        assert_eq!(back.timestamp, 1_700_000_000);
        assert_eq!(back.cache_health, 0.42);
        assert_eq!(back.measurements.cache_hit_rate, Some(0.81));
        assert_eq!(back.measurements.active_connections, Some(37));
        assert_eq!(
            back.extended_metrics.get("pg.table.users.seq_scans"),
            Some(&120.0)
        );
        assert_eq!(
            back.labels.get("pg.worst_seq_scan_table").map(String::as_str),
            Some("users")
        );
        assert_eq!(
            back.metric_deltas.unwrap().get("sequential_scans"),
            Some(&15.0)
        );
    }

    #[test]
    fn missing_optional_sections_deserialize_to_defaults() {
        let json = r#"{
            "database_id": "db-2",
            "database_type": "mysql",
            "timestamp": 1700000001,
            "cache_health": 1.0,
            "measurements": {}
        }"#;

        let snapshot: NormalizedSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.measurements.cache_hit_rate.is_none());
        assert!(snapshot.extended_metrics.is_empty());
        assert!(snapshot.labels.is_empty());
        assert!(snapshot.metric_deltas.is_none());
    }
}
