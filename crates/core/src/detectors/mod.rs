//! Detection rules.
//!
//! Each detector is a named, stateless rule: given a snapshot it either
//! produces a [`Detection`] or nothing. Missing required measurements are a
//! silent skip, never an error. Thresholds are settable independently of
//! construction so a deployment can tune rules after wiring them up.

use crate::detection::{Detection, DetectionCategory};
use crate::snapshot::NormalizedSnapshot;

pub mod cache_hit_rate;
pub mod connection_pool;
pub mod idle_transaction;
pub mod long_running_query;
pub mod missing_index;
pub mod query_latency;
pub mod table_bloat;

pub use cache_hit_rate::CacheHitRateDetector;
pub use connection_pool::ConnectionPoolDetector;
pub use idle_transaction::IdleTransactionDetector;
pub use long_running_query::LongRunningQueryDetector;
pub use missing_index::MissingIndexDetector;
pub use query_latency::QueryLatencyDetector;
pub use table_bloat::TableBloatDetector;

/// A rule evaluating a metrics snapshot, optionally producing a detection.
pub trait Detector: Send + Sync {
    /// Stable rule name; part of every dedup key this detector produces.
    fn name(&self) -> &'static str;

    /// Issue category this rule reports under.
    fn category(&self) -> DetectionCategory;

    /// Evaluate one snapshot. Returns `None` when the required measurement
    /// is absent or the condition is not met.
    fn evaluate(&self, snapshot: &NormalizedSnapshot) -> Option<Detection>;
}

/// Human-readable engine name used in recommendation text.
pub(crate) fn is_postgres(database_type: &str) -> bool {
    matches!(database_type, "postgres" | "postgresql")
}
