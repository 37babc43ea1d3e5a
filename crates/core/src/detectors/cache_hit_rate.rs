//! Cache hit rate detector.
//!
//! Fires when the database cache hit rate falls below the configured floor.
//! Severity bands: `< 0.70` critical, `< 0.85` warning, below the floor info.

use serde_json::json;

use crate::detection::{Detection, DetectionCategory, DetectionSeverity};
use crate::detectors::{is_postgres, Detector};
use crate::snapshot::NormalizedSnapshot;

const DEFAULT_HIT_RATE_FLOOR: f64 = 0.90;

pub struct CacheHitRateDetector {
    hit_rate_floor: f64,
}

impl CacheHitRateDetector {
    pub fn new() -> Self {
        Self {
            hit_rate_floor: DEFAULT_HIT_RATE_FLOOR,
        }
    }

    /// Override the hit-rate floor (ratio in `0.0..=1.0`).
    pub fn set_floor(&mut self, floor: f64) {
        self.hit_rate_floor = floor;
    }

    fn severity_for(hit_rate: f64) -> DetectionSeverity {
        if hit_rate < 0.70 {
            DetectionSeverity::Critical
        } else if hit_rate < 0.85 {
            DetectionSeverity::Warning
        } else {
            DetectionSeverity::Info
        }
    }

    fn safe_option_title(database_type: &str) -> &'static str {
        if is_postgres(database_type) {
            "Increase PostgreSQL shared_buffers"
        } else {
            match database_type {
                "mysql" => "Increase MySQL InnoDB buffer pool",
                "mongodb" => "Increase MongoDB WiredTiger cache",
                "sqlite" => "Increase SQLite cache size",
                _ => "Increase database cache",
            }
        }
    }

    fn recommendation(database_type: &str, hit_rate: f64) -> String {
        let pct = hit_rate * 100.0;
        if is_postgres(database_type) {
            format!(
                "Cache hit rate is low ({pct:.1}%). Two options: \
                 1) increase shared_buffers in postgresql.conf (requires restart), or \
                 2) deploy Redis for application-level caching (requires code changes)."
            )
        } else if database_type == "mysql" {
            format!(
                "Cache hit rate is low ({pct:.1}%). Two options: \
                 1) increase innodb_buffer_pool_size in my.cnf (requires restart), or \
                 2) deploy Redis for application-level caching (requires code changes)."
            )
        } else {
            format!(
                "Cache hit rate is low ({pct:.1}%). Review database cache configuration \
                 or consider deploying Redis for application-level caching."
            )
        }
    }
}

impl Default for CacheHitRateDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for CacheHitRateDetector {
    fn name(&self) -> &'static str {
        "low_cache_hit_rate"
    }

    fn category(&self) -> DetectionCategory {
        DetectionCategory::Cache
    }

    fn evaluate(&self, snapshot: &NormalizedSnapshot) -> Option<Detection> {
        let hit_rate = snapshot.measurements.cache_hit_rate?;

        if hit_rate >= self.hit_rate_floor {
            return None;
        }

        let hit_pct = (hit_rate * 100.0) as i64;
        let miss_pct = 100 - hit_pct;

        let mut detection = Detection::new(
            self.name(),
            self.category(),
            Self::severity_for(hit_rate),
            &snapshot.database_id,
            snapshot.timestamp,
        );

        detection.title = format!("Cache hit rate at {hit_pct}% ({miss_pct}% miss rate)");
        detection.description = format!(
            "Database cache hit rate is only {:.1}%, meaning {:.1}% of reads require disk I/O. \
             Low cache hit rates significantly degrade query performance, especially under \
             load. This typically indicates insufficient memory allocated to the database cache.",
            hit_rate * 100.0,
            (1.0 - hit_rate) * 100.0,
        );

        detection.evidence.insert("cache_hit_rate".into(), json!(hit_rate));
        detection.evidence.insert("cache_hit_percent".into(), json!(hit_pct));
        detection.evidence.insert("cache_miss_percent".into(), json!(miss_pct));
        detection
            .evidence
            .insert("cache_health".into(), json!(snapshot.cache_health));

        detection.recommendation = Self::recommendation(&snapshot.database_type, hit_rate);

        detection.action_type = Some("cache_optimization_recommendation".into());
        detection.action_metadata.insert("priority".into(), json!("medium"));
        detection
            .action_metadata
            .insert("database_type".into(), json!(snapshot.database_type));
        detection
            .action_metadata
            .insert("current_hit_rate".into(), json!(hit_pct));
        detection.action_metadata.insert("target_hit_rate".into(), json!(95));
        detection.action_metadata.insert(
            "safe_option".into(),
            json!({
                "title": Self::safe_option_title(&snapshot.database_type),
                "risk_level": "safe",
                "requires_restart": true,
            }),
        );
        detection.action_metadata.insert(
            "advanced_option".into(),
            json!({
                "title": "Deploy Redis cache layer",
                "risk_level": "advanced",
                "requires_restart": false,
                "deployable_action": "deploy_redis",
                "warning": "Requires modifying application query logic. \
                            Test thoroughly before production deployment.",
            }),
        );

        detection.assign_key();
        Some(detection)
    }
}
