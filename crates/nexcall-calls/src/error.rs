//! Error types for call record operations.

use thiserror::Error;

/// Errors that can occur while reading or writing call records.
#[derive(Debug, Error)]
pub enum CallsError {
    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No call matches the given identifier.
    #[error("call not found: {0}")]
    NotFound(String),

    /// A stored column holds a value outside the known vocabulary.
    #[error("corrupt call row: {0}")]
    Parse(#[from] nexcall_types::ParseError),
}
