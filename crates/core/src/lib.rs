//! dbpulse domain types and detection rules.
//!
//! Pure domain logic shared by every other crate in the workspace:
//!
//! - [`snapshot`] — the normalized metrics snapshot produced by the
//!   (external) collector.
//! - [`detection`] — the [`Detection`](detection::Detection) record raised by
//!   a detector, plus category/severity enums and dedup-key derivation.
//! - [`action`] — remediation action bookkeeping types.
//! - [`detectors`] — the [`Detector`](detectors::Detector) trait and the
//!   concrete rule implementations.
//! - [`thresholds`] — per-detector threshold configuration and validation.
//!
//! This crate deliberately has no async runtime, no I/O, and no logging.

pub mod action;
pub mod detection;
pub mod detectors;
pub mod error;
pub mod snapshot;
pub mod thresholds;
pub mod types;

pub use detection::{Detection, DetectionCategory, DetectionRecord, DetectionSeverity, DetectionState};
pub use error::CoreError;
pub use snapshot::{Measurements, NormalizedSnapshot};
