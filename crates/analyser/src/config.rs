//! Service configuration loaded from environment variables.

use dbpulse_core::thresholds::DetectionThresholds;
use dbpulse_knowledge::DEFAULT_AUDIT_TTL_SECS;

/// Analyser configuration.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct AnalyserConfig {
    /// Detector thresholds.
    pub thresholds: DetectionThresholds,
    /// Snapshots an unresolved fault may survive after a verifiable
    /// remediation before escalation (default: `3`).
    pub verification_cycles: u32,
    /// Audit retention for resolved/superseded records, in seconds
    /// (default: `300`).
    pub audit_ttl_secs: i64,
    /// How often the audit purge job runs, in seconds (default: `60`).
    pub purge_interval_secs: u64,
    /// PostgreSQL connection string. When unset the service runs with the
    /// in-memory knowledge store.
    pub database_url: Option<String>,
}

impl AnalyserConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `CACHE_HIT_RATE_FLOOR`   | `0.90`  |
    /// | `CONNECTION_POOL_RATIO`  | `0.80`  |
    /// | `P95_LATENCY_MS`         | `500`   |
    /// | `SEQ_SCAN_COUNT`         | `1`     |
    /// | `SEQ_SCAN_DELTA`         | `10`    |
    /// | `IDLE_TXN_SECS`          | `300`   |
    /// | `LONG_QUERY_SECS`        | `30`    |
    /// | `TABLE_BLOAT_RATIO`      | `0.1`   |
    /// | `VERIFICATION_CYCLES`    | `3`     |
    /// | `AUDIT_TTL_SECS`         | `300`   |
    /// | `PURGE_INTERVAL_SECS`    | `60`    |
    /// | `DATABASE_URL`           | unset   |
    pub fn from_env() -> Self {
        let mut thresholds = DetectionThresholds::default();
        if let Some(floor) = parse_env("CACHE_HIT_RATE_FLOOR") {
            thresholds.cache_hit_rate_floor = floor;
        }
        if let Some(ratio) = parse_env("CONNECTION_POOL_RATIO") {
            thresholds.connection_pool_ratio = ratio;
        }
        if let Some(latency) = parse_env("P95_LATENCY_MS") {
            thresholds.p95_latency_ms = latency;
        }
        if let Some(count) = parse_env("SEQ_SCAN_COUNT") {
            thresholds.sequential_scan_count = count;
        }
        if let Some(delta) = parse_env("SEQ_SCAN_DELTA") {
            thresholds.sequential_scan_delta = delta;
        }
        if let Some(secs) = parse_env("IDLE_TXN_SECS") {
            thresholds.idle_transaction_secs = secs;
        }
        if let Some(secs) = parse_env("LONG_QUERY_SECS") {
            thresholds.long_running_query_secs = secs;
        }
        if let Some(ratio) = parse_env("TABLE_BLOAT_RATIO") {
            thresholds.table_bloat_ratio = ratio;
        }
        thresholds
            .validate()
            .expect("Invalid detection threshold configuration");

        let verification_cycles: u32 = parse_env("VERIFICATION_CYCLES").unwrap_or(3);
        let audit_ttl_secs: i64 = parse_env("AUDIT_TTL_SECS").unwrap_or(DEFAULT_AUDIT_TTL_SECS);
        let purge_interval_secs: u64 = parse_env("PURGE_INTERVAL_SECS").unwrap_or(60);
        let database_url = std::env::var("DATABASE_URL").ok();

        Self {
            thresholds,
            verification_cycles,
            audit_ttl_secs,
            purge_interval_secs,
            database_url,
        }
    }
}

/// Parse an env var, panicking at startup when it is set but malformed.
/// Misconfiguration should fail fast, not fall back silently.
fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name)
        .ok()
        .map(|v| match v.parse() {
            Ok(value) => value,
            Err(_) => panic!("{name} must be a valid value, got '{v}'"),
        })
}
