//! Error type for knowledge store operations.

use dbpulse_db::models::RowConversionError;

/// Failure modes of the knowledge store.
///
/// "Detection not found" is deliberately *not* an error: resolving an
/// unknown or already-terminal record is a reported no-op (see
/// [`crate::ResolveOutcome`]), because completion events can arrive after
/// the record they reference has been purged.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Corrupt(#[from] RowConversionError),
}
