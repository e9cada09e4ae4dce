//! Error types for gatepass core.

use thiserror::Error;

/// Errors from pure domain operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A scanned string does not have the shape of an exit code.
    /// Carries only the input length; the raw input is never echoed.
    #[error("malformed exit code ({0} chars)")]
    MalformedCode(usize),

    /// An unrecognized state string came out of storage.
    #[error("invalid credential state: {0}")]
    InvalidState(String),
}
