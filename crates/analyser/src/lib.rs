//! Analysis service: the closed detect → remediate → verify loop.
//!
//! Wires the detection engine, knowledge store, verification tracker, and
//! event bus into a long-running service. Snapshots arrive on the bus,
//! detections flow out on it, action completions feed the verification
//! countdown, and resolutions close the loop.

pub mod completion;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod verification;

pub use config::AnalyserConfig;
pub use engine::DetectionEngine;
pub use pipeline::Pipeline;
pub use verification::VerificationTracker;
