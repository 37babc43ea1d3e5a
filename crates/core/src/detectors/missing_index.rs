//! Missing index heuristic.
//!
//! Fires when sequential scan activity suggests a frequently filtered column
//! has no index. Prefers per-tick scan deltas when the collector provides
//! them; falls back to the absolute counter otherwise. Requires the
//! collector's query analysis labels to name the worst table and candidate
//! column — without them there is nothing actionable to report.

use serde_json::json;

use crate::detection::{Detection, DetectionCategory, DetectionSeverity};
use crate::detectors::Detector;
use crate::snapshot::NormalizedSnapshot;

const DEFAULT_SCAN_COUNT_THRESHOLD: i64 = 1;
const DEFAULT_SCAN_DELTA_THRESHOLD: f64 = 10.0;

/// Label keys populated by the collector's query analysis.
const LABEL_WORST_TABLE: &str = "pg.worst_seq_scan_table";
const LABEL_RECOMMENDED_COLUMN: &str = "pg.recommended_index_column";

pub struct MissingIndexDetector {
    scan_count_threshold: i64,
    scan_delta_threshold: f64,
}

impl MissingIndexDetector {
    pub fn new() -> Self {
        Self {
            scan_count_threshold: DEFAULT_SCAN_COUNT_THRESHOLD,
            scan_delta_threshold: DEFAULT_SCAN_DELTA_THRESHOLD,
        }
    }

    /// Override the absolute sequential-scan count threshold.
    pub fn set_count_threshold(&mut self, threshold: i64) {
        self.scan_count_threshold = threshold;
    }

    /// Override the per-tick sequential-scan delta threshold.
    pub fn set_delta_threshold(&mut self, threshold: f64) {
        self.scan_delta_threshold = threshold;
    }
}

impl Default for MissingIndexDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for MissingIndexDetector {
    fn name(&self) -> &'static str {
        "missing_index"
    }

    fn category(&self) -> DetectionCategory {
        DetectionCategory::Query
    }

    fn evaluate(&self, snapshot: &NormalizedSnapshot) -> Option<Detection> {
        let seq_scans = snapshot.measurements.sequential_scans?;

        // Deltas distinguish ongoing scan activity from a stale counter.
        let delta = snapshot
            .metric_deltas
            .as_ref()
            .and_then(|d| d.get("sequential_scans").copied());
        match delta {
            Some(delta) if delta <= self.scan_delta_threshold => return None,
            Some(_) => {}
            None if seq_scans <= self.scan_count_threshold => return None,
            None => {}
        }

        let worst_table = snapshot.labels.get(LABEL_WORST_TABLE)?;
        let column = snapshot.labels.get(LABEL_RECOMMENDED_COLUMN)?;
        if worst_table.is_empty() || column.is_empty() {
            return None;
        }

        let prefix = format!("pg.table.{worst_table}");
        let table_seq_scans = snapshot
            .extended_metrics
            .get(&format!("{prefix}.seq_scans"))
            .copied()
            .unwrap_or(0.0) as i64;
        let rows_read = snapshot
            .extended_metrics
            .get(&format!("{prefix}.seq_tup_read"))
            .copied()
            .unwrap_or(0.0) as i64;

        let mut detection = Detection::new(
            self.name(),
            self.category(),
            DetectionSeverity::Warning,
            &snapshot.database_id,
            snapshot.timestamp,
        );

        detection.title = format!("Sequential scans detected on table '{worst_table}'");
        detection.description = format!(
            "Table '{worst_table}' is performing {table_seq_scans} sequential scans \
             ({rows_read} rows read). Column '{column}' is frequently filtered in queries \
             without an index, causing full table scans."
        );

        detection.evidence.insert("table_name".into(), json!(worst_table));
        detection.evidence.insert("column_name".into(), json!(column));
        detection
            .evidence
            .insert("sequential_scans".into(), json!(table_seq_scans));
        detection.evidence.insert("rows_read".into(), json!(rows_read));
        if let Some(delta) = delta {
            detection
                .evidence
                .insert("sequential_scans_delta".into(), json!(delta));
        }

        detection.recommendation = format!(
            "Create an index on {worst_table}.{column} to optimize query performance. \
             This column was identified through query analysis. Use CREATE INDEX \
             CONCURRENTLY to avoid blocking production queries."
        );

        detection.action_type = Some("create_index".into());
        detection
            .action_metadata
            .insert("table_name".into(), json!(worst_table));
        detection
            .action_metadata
            .insert("column_name".into(), json!(column));
        detection.action_metadata.insert("priority".into(), json!("high"));

        detection.assign_key();
        Some(detection)
    }
}
