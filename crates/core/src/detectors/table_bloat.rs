//! Table bloat detector.
//!
//! Fires when the worst table's dead-tuple ratio exceeds the configured
//! threshold. Severity bands: `>= 0.30` critical, `>= 0.20` warning, else
//! info.

use serde_json::json;

use crate::detection::{Detection, DetectionCategory, DetectionSeverity};
use crate::detectors::Detector;
use crate::snapshot::NormalizedSnapshot;

const DEFAULT_BLOAT_RATIO_THRESHOLD: f64 = 0.1;

/// Collector keys describing the most bloated table.
const LABEL_WORST_BLOAT_TABLE: &str = "pg.worst_bloat_table";
const METRIC_WORST_BLOAT_RATIO: &str = "pg.worst_bloat_ratio";

pub struct TableBloatDetector {
    bloat_ratio_threshold: f64,
}

impl TableBloatDetector {
    pub fn new() -> Self {
        Self {
            bloat_ratio_threshold: DEFAULT_BLOAT_RATIO_THRESHOLD,
        }
    }

    /// Override the dead-tuple ratio threshold (in `0.0..=1.0`).
    pub fn set_threshold(&mut self, threshold: f64) {
        self.bloat_ratio_threshold = threshold;
    }

    fn severity_for(bloat_ratio: f64) -> DetectionSeverity {
        if bloat_ratio >= 0.3 {
            DetectionSeverity::Critical
        } else if bloat_ratio >= 0.2 {
            DetectionSeverity::Warning
        } else {
            DetectionSeverity::Info
        }
    }

    fn priority_for(bloat_ratio: f64) -> &'static str {
        if bloat_ratio >= 0.3 {
            "high"
        } else if bloat_ratio >= 0.2 {
            "medium"
        } else {
            "low"
        }
    }
}

impl Default for TableBloatDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for TableBloatDetector {
    fn name(&self) -> &'static str {
        "table_bloat"
    }

    fn category(&self) -> DetectionCategory {
        DetectionCategory::Storage
    }

    fn evaluate(&self, snapshot: &NormalizedSnapshot) -> Option<Detection> {
        let worst_table = snapshot.labels.get(LABEL_WORST_BLOAT_TABLE)?;
        if worst_table.is_empty() {
            return None;
        }

        let bloat_ratio = snapshot
            .extended_metrics
            .get(METRIC_WORST_BLOAT_RATIO)
            .copied()?;
        if bloat_ratio < self.bloat_ratio_threshold {
            return None;
        }

        let prefix = format!("pg.table.{worst_table}");
        let live_tuples = snapshot
            .extended_metrics
            .get(&format!("{prefix}.live_tuples"))
            .copied()
            .unwrap_or(0.0) as i64;
        let dead_tuples = snapshot
            .extended_metrics
            .get(&format!("{prefix}.dead_tuples"))
            .copied()
            .unwrap_or(0.0) as i64;

        let bloat_percent = (bloat_ratio * 100.0) as i64;

        let mut detection = Detection::new(
            self.name(),
            self.category(),
            Self::severity_for(bloat_ratio),
            &snapshot.database_id,
            snapshot.timestamp,
        );

        detection.title =
            format!("Table bloat detected on '{worst_table}' ({bloat_percent}% dead tuples)");
        detection.description = format!(
            "Table '{worst_table}' has {dead_tuples} dead tuples out of {live_tuples} live \
             tuples ({:.1}% bloat). Dead tuples consume disk space and slow down queries. \
             Running VACUUM will reclaim space and improve performance.",
            bloat_ratio * 100.0,
        );

        detection
            .evidence
            .insert("table_name".into(), json!(worst_table));
        detection
            .evidence
            .insert("live_tuples".into(), json!(live_tuples));
        detection
            .evidence
            .insert("dead_tuples".into(), json!(dead_tuples));
        detection
            .evidence
            .insert("bloat_ratio".into(), json!(bloat_ratio));
        detection
            .evidence
            .insert("bloat_percent".into(), json!(bloat_percent));

        detection.recommendation = format!(
            "Run VACUUM ANALYZE on table '{worst_table}' to reclaim space from dead tuples \
             and update query planner statistics. This operation is non-blocking and safe \
             to run on production databases."
        );

        detection.action_type = Some("vacuum_table".into());
        detection
            .action_metadata
            .insert("table_name".into(), json!(worst_table));
        detection
            .action_metadata
            .insert("priority".into(), json!(Self::priority_for(bloat_ratio)));

        detection.assign_key();
        Some(detection)
    }
}
