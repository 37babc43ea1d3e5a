//! dbpulse event channel.
//!
//! This crate provides the asynchronous publish/subscribe transport wiring
//! the detection pipeline together:
//!
//! - [`EventBus`] — in-process fan-out hub backed by
//!   `tokio::sync::broadcast`.
//! - [`AnalysisEvent`] — the typed event payloads, one variant per topic.
//! - [`BusMessage`] — the envelope carrying a process-monotonic publish
//!   sequence.
//!
//! Delivery is at-least-once from the consumer's perspective (a deployment
//! may bridge the bus onto an external broker that redelivers); consumers
//! needing ordering use the sequence/timestamps carried in the payloads,
//! never delivery order.

pub mod bus;
pub mod topics;

pub use bus::{ActionCompleted, AnalysisEvent, BusMessage, CompletionStatus, EventBus, RollbackRequest};
