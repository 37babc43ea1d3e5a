//! Knowledge store: deduplicated detection records and action bookkeeping.
//!
//! The store owns the lifecycle of every detection raised by the analysis
//! engine. Registration is an atomic check-and-create per dedup key: at most
//! one active record exists for a key at any moment, duplicates refresh
//! `last_seen` instead of creating new records. Resolved and superseded
//! records are retained for an audit window and then purged.
//!
//! Two implementations are provided: [`PgKnowledge`] backed by PostgreSQL
//! (the production store) and [`MemoryKnowledge`] for tests and single-node
//! runs without a database.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod purge;
pub mod store;

pub use error::KnowledgeError;
pub use memory::MemoryKnowledge;
pub use postgres::PgKnowledge;
pub use store::{KnowledgeStore, RegisterOutcome, ResolveOutcome};

/// Default audit retention for terminal records: 5 minutes.
pub const DEFAULT_AUDIT_TTL_SECS: i64 = 300;
