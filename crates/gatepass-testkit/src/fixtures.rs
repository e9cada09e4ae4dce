//! Pre-wired fixtures for gate tests.

use std::sync::Arc;

use gatepass_core::{
    Credential, OrderItem, OrderRef, OrderSummary, PartyId,
};
use gatepass_realtime::{ConnectionRegistry, EventRouter};
use gatepass_store::MemoryStore;

use crate::clock::ManualClock;

/// An in-memory store, a registry with its router, and a manual clock,
/// wired together and ready for a subsystem under test.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub router: EventRouter,
    pub clock: Arc<ManualClock>,
}

impl TestFixture {
    /// Fixture with the clock at an arbitrary but nonzero epoch.
    pub fn new() -> Self {
        Self::at(1_700_000_000_000)
    }

    pub fn at(start_millis: i64) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            store: Arc::new(MemoryStore::new()),
            registry: Arc::clone(&registry),
            router: EventRouter::new(registry),
            clock: Arc::new(ManualClock::new(start_millis)),
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A paid single-item order for `holder`.
pub fn paid_order(order_ref: &str, holder: &str) -> OrderSummary {
    OrderSummary {
        order_ref: OrderRef::from(order_ref),
        holder_ref: PartyId::from(holder),
        holder_name: "Test Holder".into(),
        holder_phone: Some("+15550100".into()),
        amount_minor: 12_50,
        items: vec![OrderItem {
            name: "espresso".into(),
            quantity: 1,
            price_minor: 12_50,
        }],
        is_paid: true,
    }
}

/// Same order, payment still outstanding.
pub fn unpaid_order(order_ref: &str, holder: &str) -> OrderSummary {
    OrderSummary {
        is_paid: false,
        ..paid_order(order_ref, holder)
    }
}

/// A pending credential issued at `issued_at` with the given TTL.
pub fn pending_credential(order_ref: &str, issued_at: i64, ttl_ms: i64) -> Credential {
    Credential::issue(
        OrderRef::from(order_ref),
        PartyId::from("cust-fixture"),
        issued_at,
        ttl_ms,
    )
}
