//! Detection engine: an ordered registry of detectors.
//!
//! Each snapshot is evaluated by every registered detector once, in
//! registration order. A panic inside one detector is caught and logged so
//! the remaining detectors still run; the engine itself is stateless and
//! produces the same detections for the same snapshot.

use std::panic::AssertUnwindSafe;

use dbpulse_core::detection::Detection;
use dbpulse_core::detectors::{
    CacheHitRateDetector, ConnectionPoolDetector, Detector, IdleTransactionDetector,
    LongRunningQueryDetector, MissingIndexDetector, QueryLatencyDetector, TableBloatDetector,
};
use dbpulse_core::snapshot::NormalizedSnapshot;
use dbpulse_core::thresholds::DetectionThresholds;

/// Ordered registry of boxed detectors.
pub struct DetectionEngine {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectionEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Create an engine with the standard detector set, configured from the
    /// given thresholds.
    pub fn with_thresholds(thresholds: &DetectionThresholds) -> Self {
        let mut engine = Self::new();

        let mut cache = CacheHitRateDetector::new();
        cache.set_floor(thresholds.cache_hit_rate_floor);
        engine.register(Box::new(cache));

        let mut pool = ConnectionPoolDetector::new();
        pool.set_threshold(thresholds.connection_pool_ratio);
        engine.register(Box::new(pool));

        let mut latency = QueryLatencyDetector::new();
        latency.set_threshold(thresholds.p95_latency_ms);
        engine.register(Box::new(latency));

        let mut index = MissingIndexDetector::new();
        index.set_count_threshold(thresholds.sequential_scan_count);
        index.set_delta_threshold(thresholds.sequential_scan_delta);
        engine.register(Box::new(index));

        let mut idle = IdleTransactionDetector::new();
        idle.set_threshold(thresholds.idle_transaction_secs);
        engine.register(Box::new(idle));

        let mut long_query = LongRunningQueryDetector::new();
        long_query.set_threshold(thresholds.long_running_query_secs);
        engine.register(Box::new(long_query));

        let mut bloat = TableBloatDetector::new();
        bloat.set_threshold(thresholds.table_bloat_ratio);
        engine.register(Box::new(bloat));

        engine
    }

    /// Append a detector to the registry.
    pub fn register(&mut self, detector: Box<dyn Detector>) {
        tracing::info!(detector = detector.name(), "Registered detector");
        self.detectors.push(detector);
    }

    /// Look up a registered detector by name.
    pub fn get(&self, name: &str) -> Option<&dyn Detector> {
        self.detectors
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.as_ref())
    }

    /// Evaluate every detector against a snapshot.
    ///
    /// A panicking detector is logged and skipped; the run continues with
    /// the remaining detectors.
    pub fn run(&self, snapshot: &NormalizedSnapshot) -> Vec<Detection> {
        let mut detections = Vec::new();

        for detector in &self.detectors {
            let result =
                std::panic::catch_unwind(AssertUnwindSafe(|| detector.evaluate(snapshot)));
            match result {
                Ok(Some(detection)) => {
                    tracing::debug!(
                        detector = detector.name(),
                        detection_id = %detection.id,
                        severity = detection.severity.as_str(),
                        "Detector fired"
                    );
                    detections.push(detection);
                }
                Ok(None) => {}
                Err(_) => {
                    tracing::error!(
                        detector = detector.name(),
                        database_id = %snapshot.database_id,
                        "Detector panicked, skipping it for this snapshot"
                    );
                }
            }
        }

        detections
    }
}

impl Default for DetectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use dbpulse_core::detection::DetectionCategory;

    use super::*;

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn category(&self) -> DetectionCategory {
            DetectionCategory::Query
        }

        fn evaluate(&self, _snapshot: &NormalizedSnapshot) -> Option<Detection> {
            panic!("boom");
        }
    }

    fn snapshot_with_low_cache() -> NormalizedSnapshot {
        let mut snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        snapshot.measurements.cache_hit_rate = Some(0.60);
        snapshot
    }

    #[test]
    fn standard_engine_registers_all_detectors() {
        let engine = DetectionEngine::with_thresholds(&DetectionThresholds::default());
        assert!(engine.get("low_cache_hit_rate").is_some());
        assert!(engine.get("connection_pool_saturation").is_some());
        assert!(engine.get("high_query_latency").is_some());
        assert!(engine.get("missing_index").is_some());
        assert!(engine.get("idle_transaction").is_some());
        assert!(engine.get("long_running_query").is_some());
        assert!(engine.get("table_bloat").is_some());
        assert!(engine.get("unknown").is_none());
    }

    #[test]
    fn panicking_detector_is_isolated() {
        let mut engine = DetectionEngine::new();
        engine.register(Box::new(PanickingDetector));
        let mut cache = CacheHitRateDetector::new();
        cache.set_floor(0.90);
        engine.register(Box::new(cache));

        let detections = engine.run(&snapshot_with_low_cache());
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].detector_name, "low_cache_hit_rate");
    }

    #[test]
    fn empty_snapshot_produces_no_detections() {
        let engine = DetectionEngine::with_thresholds(&DetectionThresholds::default());
        let snapshot = NormalizedSnapshot::new("db-1", "postgres", 1_700_000_000);
        assert!(engine.run(&snapshot).is_empty());
    }
}
