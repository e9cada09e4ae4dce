//! # Gatepass Store
//!
//! Credential persistence for gatepass. Provides a trait-based interface
//! with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts credential persistence behind the
//! [`CredentialStore`] trait, keeping the gate logic storage-agnostic.
//! The primary implementation is [`SqliteStore`], with [`MemoryStore`]
//! for testing.
//!
//! ## Key Types
//!
//! - [`CredentialStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`ClaimResult`] - Outcome of the atomic `Pending -> terminal` claim
//!
//! ## Design Notes
//!
//! - **Atomic claim**: the `Pending -> terminal` transition is one
//!   conditional write; exactly one contender wins under concurrency.
//! - **Expiry precedence**: a lapsed window forces `Expired` inside the
//!   same atomic step, never the requested outcome.
//! - **Audit records**: credentials are updated once and never deleted.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ClaimResult, CredentialStore};
