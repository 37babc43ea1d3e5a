//! Row models for the knowledge store tables.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row plus conversions to the `dbpulse-core` domain types. Enum-ish columns
//! are stored as TEXT; conversion failures surface as
//! [`RowConversionError`].

pub mod action;
pub mod detection;

pub use action::ActionRow;
pub use detection::DetectionRow;

/// A row held a value the domain enums do not recognize.
///
/// Only possible if the table was written by a newer (or corrupted)
/// deployment; treated as a store error, never a panic.
#[derive(Debug, thiserror::Error)]
#[error("Invalid {column} value in row {id}: {value}")]
pub struct RowConversionError {
    pub id: String,
    pub column: &'static str,
    pub value: String,
}
