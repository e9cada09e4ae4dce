//! # Gatepass Core
//!
//! Pure primitives for the gate access subsystem: credentials, exit codes,
//! and typed realtime events.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over domain data structures.
//!
//! ## Key Types
//!
//! - [`Credential`] - Single-use, time-bounded exit authorization
//! - [`ExitCode`] - The presented secret (QR payload)
//! - [`CredentialState`] - `Pending` plus the three terminal states
//! - [`GateEvent`] - Typed events for the realtime channels
//!
//! ## State Machine
//!
//! A credential transitions exactly once out of `Pending`, to `Approved`,
//! `Denied`, or `Expired`. The atomic transition itself lives in the store
//! layer; this crate only defines the states and their legality.

pub mod code;
pub mod credential;
pub mod error;
pub mod event;
pub mod time;
pub mod types;

pub use code::{ExitCode, CODE_ALPHABET, CODE_LEN, CODE_PREFIX};
pub use credential::{Credential, CredentialState, Decision, Outcome};
pub use error::CoreError;
pub use event::{AnomalyKind, GateEvent};
pub use time::{now_millis, Clock, SystemClock};
pub use types::{CredentialId, OrderItem, OrderRef, OrderSummary, PartyId, Role};
