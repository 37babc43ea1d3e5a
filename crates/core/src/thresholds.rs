//! Per-detector threshold configuration and validation.
//!
//! Defaults match typical production values; deployments override them via
//! environment variables (see the analyser's config module). Ratios are
//! validated into `[0.0, 1.0]` at load time.

use crate::error::CoreError;

/// Configurable thresholds for every detector.
#[derive(Debug, Clone)]
pub struct DetectionThresholds {
    /// Cache-hit-rate floor below which the cache detector fires (ratio).
    pub cache_hit_rate_floor: f64,

    /// Connection pool utilization ratio above which the pool detector fires.
    pub connection_pool_ratio: f64,

    /// p95 query latency threshold in milliseconds.
    pub p95_latency_ms: f64,

    /// Minimum absolute sequential scan count to trigger the missing-index
    /// heuristic when no deltas are available.
    pub sequential_scan_count: i64,

    /// Minimum sequential scan increase per tick to trigger the heuristic
    /// when deltas are available.
    pub sequential_scan_delta: f64,

    /// Idle-in-transaction duration in seconds above which the idle
    /// transaction detector fires.
    pub idle_transaction_secs: f64,

    /// Query duration in seconds above which the long-running-query
    /// detector fires.
    pub long_running_query_secs: f64,

    /// Dead-tuple ratio above which the table bloat detector fires.
    pub table_bloat_ratio: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            cache_hit_rate_floor: 0.90,
            connection_pool_ratio: 0.80,
            p95_latency_ms: 500.0,
            sequential_scan_count: 1,
            sequential_scan_delta: 10.0,
            idle_transaction_secs: 300.0,
            long_running_query_secs: 30.0,
            table_bloat_ratio: 0.1,
        }
    }
}

impl DetectionThresholds {
    /// Validate ratio fields and positivity constraints.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_unit_range(self.cache_hit_rate_floor, "cache_hit_rate_floor")?;
        validate_unit_range(self.connection_pool_ratio, "connection_pool_ratio")?;
        if self.p95_latency_ms <= 0.0 {
            return Err(CoreError::Validation(format!(
                "p95_latency_ms must be positive, got {}",
                self.p95_latency_ms
            )));
        }
        if self.sequential_scan_delta <= 0.0 {
            return Err(CoreError::Validation(format!(
                "sequential_scan_delta must be positive, got {}",
                self.sequential_scan_delta
            )));
        }
        if self.idle_transaction_secs <= 0.0 {
            return Err(CoreError::Validation(format!(
                "idle_transaction_secs must be positive, got {}",
                self.idle_transaction_secs
            )));
        }
        if self.long_running_query_secs <= 0.0 {
            return Err(CoreError::Validation(format!(
                "long_running_query_secs must be positive, got {}",
                self.long_running_query_secs
            )));
        }
        validate_unit_range(self.table_bloat_ratio, "table_bloat_ratio")?;
        Ok(())
    }
}

/// Validate that a value falls within `[0.0, 1.0]`.
///
/// Returns a `CoreError::Validation` naming the field if out of range.
pub fn validate_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}
