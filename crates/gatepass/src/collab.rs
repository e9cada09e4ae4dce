//! External collaborator seams.
//!
//! The gate subsystem consumes two upstream collaborators: the payment
//! system (order summaries and paid state) and the push-notification
//! pipeline (best-effort secondary delivery of decisions). Both are traits
//! so the subsystem stays testable without either system present.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use gatepass_core::{GateEvent, OrderRef, OrderSummary, PartyId};

/// Read access to the payment collaborator's order records.
///
/// `issue` takes the summary directly from the caller; the directory is
/// used by `inspect` to enrich the terminal display after the fact.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn lookup(&self, order_ref: &OrderRef) -> Option<OrderSummary>;
}

/// Best-effort push delivery to the holder's device.
///
/// Receives the same payload as the realtime channel. Implementations must
/// enqueue internally rather than block on network I/O, and have no way to
/// report failure upward: delivery trouble must never affect the gate
/// outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, holder: &PartyId, event: &GateEvent);
}

/// Notifier that discards everything. The default when no push pipeline
/// is wired in.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn deliver(&self, _holder: &PartyId, _event: &GateEvent) {}
}

/// In-memory order directory, for tests and demo wiring.
#[derive(Default)]
pub struct InMemoryOrders {
    orders: RwLock<HashMap<OrderRef, OrderSummary>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, order: OrderSummary) {
        let mut orders = self.orders.write().unwrap_or_else(|e| e.into_inner());
        orders.insert(order.order_ref.clone(), order);
    }
}

#[async_trait]
impl OrderDirectory for InMemoryOrders {
    async fn lookup(&self, order_ref: &OrderRef) -> Option<OrderSummary> {
        let orders = self.orders.read().unwrap_or_else(|e| e.into_inner());
        orders.get(order_ref).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paid_order(order: &str) -> OrderSummary {
        OrderSummary {
            order_ref: OrderRef::from(order),
            holder_ref: PartyId::from("cust-1"),
            holder_name: "Ada".into(),
            holder_phone: None,
            amount_minor: 4200,
            items: vec![],
            is_paid: true,
        }
    }

    #[tokio::test]
    async fn test_in_memory_orders() {
        let orders = InMemoryOrders::new();
        orders.put(paid_order("o1"));

        assert!(orders.lookup(&OrderRef::from("o1")).await.is_some());
        assert!(orders.lookup(&OrderRef::from("o2")).await.is_none());
    }
}
