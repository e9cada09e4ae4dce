//! Top-level assembly of the gate subsystem.

use std::sync::Arc;

use gatepass_core::{Clock, Credential, ExitCode, OrderSummary, Outcome, PartyId, SystemClock};
use gatepass_realtime::{ConnectionRegistry, EventRouter};
use gatepass_store::CredentialStore;

use crate::authority::{DecideOutcome, ExitStatus, GateAuthority, Inspection};
use crate::collab::{Notifier, NoopNotifier, OrderDirectory};
use crate::config::GateConfig;
use crate::error::Result;
use crate::issuer::TokenIssuer;
use crate::reaper::{ExpiryReaper, ReaperHandle};

/// The assembled gate subsystem: issuance, verification, realtime fanout,
/// and the expiry sweep, wired over one store and one connection registry.
///
/// Construct with [`GateBuilder`]; the builder owns the optional pieces
/// (order directory, notifier, clock) so the common wiring stays short.
pub struct Gate<S> {
    issuer: TokenIssuer<S>,
    authority: GateAuthority<S>,
    registry: Arc<ConnectionRegistry>,
    router: EventRouter,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: GateConfig,
}

impl<S: CredentialStore + 'static> Gate<S> {
    pub fn builder(store: Arc<S>, orders: Arc<dyn OrderDirectory>) -> GateBuilder<S> {
        GateBuilder {
            store,
            orders,
            notifier: None,
            clock: None,
            config: GateConfig::default(),
        }
    }

    /// Issue (or re-surface) the exit credential for a paid order.
    pub async fn issue(&self, order: &OrderSummary) -> Result<Credential> {
        self.issuer.issue(order).await
    }

    /// Advisory scan classification for terminal display.
    pub async fn inspect(&self, code: &ExitCode, terminal: &PartyId) -> Result<Inspection> {
        self.authority.inspect(code, terminal).await
    }

    /// Holder-scoped status poll; publishes nothing.
    pub async fn status(&self, code: &ExitCode, holder: &PartyId) -> Result<ExitStatus> {
        self.authority.status(code, holder).await
    }

    /// Authoritatively consume a credential with a decision.
    pub async fn decide(
        &self,
        code: &ExitCode,
        outcome: Outcome,
        decided_by: &PartyId,
    ) -> Result<DecideOutcome> {
        self.authority.decide(code, outcome, decided_by).await
    }

    /// Unexpired pending credentials for the security dashboard.
    pub async fn pending_exits(&self) -> Result<Vec<Credential>> {
        self.authority.pending_exits().await
    }

    /// Decided credentials, most recent first.
    pub async fn history(&self, limit: u32, offset: u32) -> Result<Vec<Credential>> {
        self.authority.history(limit, offset).await
    }

    /// Start the background expiry sweep.
    pub fn spawn_reaper(&self) -> ReaperHandle {
        self.reaper().spawn()
    }

    /// One immediate sweep pass. Returns how many credentials expired.
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.reaper().sweep_once().await
    }

    fn reaper(&self) -> ExpiryReaper<S> {
        ExpiryReaper::new(
            Arc::clone(&self.store),
            self.router.clone(),
            Arc::clone(&self.clock),
            &self.config,
        )
    }

    /// The registry realtime transports attach sessions to.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

/// Builder for [`Gate`].
pub struct GateBuilder<S> {
    store: Arc<S>,
    orders: Arc<dyn OrderDirectory>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    config: GateConfig,
}

impl<S: CredentialStore + 'static> GateBuilder<S> {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Gate<S> {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = EventRouter::new(Arc::clone(&registry));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier));

        let issuer = TokenIssuer::new(
            Arc::clone(&self.store),
            router.clone(),
            Arc::clone(&clock),
            &self.config,
        );
        let authority = GateAuthority::new(
            Arc::clone(&self.store),
            router.clone(),
            self.orders,
            notifier,
            Arc::clone(&clock),
        );

        Gate {
            issuer,
            authority,
            registry,
            router,
            store: self.store,
            clock,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::Inspection;
    use crate::collab::InMemoryOrders;
    use gatepass_core::{CredentialState, OrderRef};
    use gatepass_store::MemoryStore;

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
    async fn test_end_to_end_issue_and_approve() {
        let orders = Arc::new(InMemoryOrders::new());
        orders.put(paid_order("o1"));
        let gate = Gate::builder(Arc::new(MemoryStore::new()), orders).build();

        let credential = gate.issue(&paid_order("o1")).await.unwrap();

        match gate.inspect(&credential.code, &PartyId::from("term-1")).await.unwrap() {
            Inspection::Pending(view) => assert_eq!(view.credential_id, credential.id),
            other => panic!("expected Pending, got {:?}", other),
        }

        match gate
            .decide(&credential.code, Outcome::Approve, &PartyId::from("sec-1"))
            .await
            .unwrap()
        {
            DecideOutcome::Decided(decision) => {
                assert_eq!(decision.state, CredentialState::Approved)
            }
            other => panic!("expected Decided, got {:?}", other),
        }

        assert!(gate.pending_exits().await.unwrap().is_empty());
        assert_eq!(gate.history(10, 0).await.unwrap().len(), 1);
    }
}
