//! # Gatepass Realtime
//!
//! Connection registry and role/identity-scoped event fanout.
//!
//! ## Overview
//!
//! Realtime observers (security terminals, admin dashboards, the customer
//! awaiting a decision) register a verified `(identity, role)` pair and
//! receive typed [`GateEvent`]s over a bounded channel.
//!
//! ## Key Properties
//!
//! - **Explicit lifecycle**: the registry is an owned object, created at
//!   process start and dropped at shutdown - no global connection map.
//! - **Single connection per identity**: a reconnect evicts the prior
//!   handle so stale sockets never receive decision pushes.
//! - **Fire-and-forget publish**: never blocks, never errors; undeliverable
//!   events are dropped. Per-scope publish order is preserved for each
//!   live subscriber.
//!
//! [`GateEvent`]: gatepass_core::GateEvent

pub mod registry;
pub mod router;

pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Session, EVENT_BUFFER};
pub use router::{EventRouter, Scope};
