//! gatepass: single-use, time-bounded exit authorization.
//!
//! The subsystem mints an exit credential when an order is paid, lets a
//! security terminal verify and consume it exactly once, streams the
//! lifecycle to interested realtime sessions, and sweeps stale pending
//! credentials in the background.
//!
//! The pieces compose over two seams: a
//! [`CredentialStore`](gatepass_store::CredentialStore) for durable state and a [`ConnectionRegistry`](gatepass_realtime::ConnectionRegistry)
//! for live sessions. [`Gate`] wires them together for the common case.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gatepass::{Gate, InMemoryOrders};
//! use gatepass_store::MemoryStore;
//!
//! let orders = Arc::new(InMemoryOrders::new());
//! let gate = Gate::builder(Arc::new(MemoryStore::new()), orders).build();
//! let _reaper = gate.spawn_reaper();
//! ```

pub mod authority;
pub mod collab;
pub mod config;
pub mod error;
pub mod gate;
pub mod issuer;
pub mod reaper;

pub use authority::{CredentialView, DecideOutcome, ExitStatus, GateAuthority, Inspection};
pub use collab::{InMemoryOrders, NoopNotifier, Notifier, OrderDirectory};
pub use config::GateConfig;
pub use error::{GateError, Result};
pub use gate::{Gate, GateBuilder};
pub use issuer::TokenIssuer;
pub use reaper::{ExpiryReaper, ReaperHandle};

pub use gatepass_core as core;
pub use gatepass_realtime as realtime;
pub use gatepass_store as store;
