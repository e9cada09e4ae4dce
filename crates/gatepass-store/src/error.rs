//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// A database fault is fatal to the call in progress. It is never retried
/// inside the claim (the first attempt may have committed) and never
/// interpreted as a security decision by callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A credential with the same id or code already exists.
    #[error("duplicate credential: {0}")]
    DuplicateCredential(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<gatepass_core::CoreError> for StoreError {
    fn from(e: gatepass_core::CoreError) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
