//! Shared test support for the gatepass workspace.
//!
//! Nothing here ships in production builds; the crate exists so the
//! manual clock, fixtures, and generators are written once.

pub mod clock;
pub mod fixtures;
pub mod generators;

pub use clock::ManualClock;
pub use fixtures::{paid_order, pending_credential, unpaid_order, TestFixture};
