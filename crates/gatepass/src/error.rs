//! Error types for the gate subsystem.

use gatepass_core::OrderRef;
use gatepass_store::StoreError;
use thiserror::Error;

/// Errors that can occur during gate operations.
///
/// A storage fault is surfaced as `Store` and propagated; it is never
/// converted into a denial - a persistence failure is not a security
/// decision.
#[derive(Debug, Error)]
pub enum GateError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Issuance precondition violated: the order is not paid.
    #[error("order not eligible for exit: {order_ref}")]
    OrderNotEligible { order_ref: OrderRef },

    /// The scanned code was never issued. Always signaled, never absorbed:
    /// an unknown-code scan is itself a security-relevant fact.
    #[error("credential not found")]
    CredentialNotFound,

    /// Internal invariant violation (e.g. a terminal row without a
    /// recorded decision).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
