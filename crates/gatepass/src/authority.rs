//! The verification state machine.
//!
//! `GateAuthority` owns both sides of a scan: the advisory `inspect` read
//! a terminal uses to render the credential, and the authoritative
//! `decide` claim that consumes it. Every misuse classification is also
//! published on the anomaly channel - detection is a first-class side
//! effect, not an afterthought.

use std::sync::Arc;

use gatepass_core::{
    AnomalyKind, Clock, Credential, CredentialId, CredentialState, Decision, ExitCode, GateEvent,
    OrderSummary, Outcome, PartyId, Role,
};
use gatepass_realtime::{EventRouter, Scope};
use gatepass_store::{ClaimResult, CredentialStore};

use crate::collab::{Notifier, OrderDirectory};
use crate::error::{GateError, Result};

/// Sanitized credential view for terminal display.
#[derive(Debug, Clone)]
pub struct CredentialView {
    pub credential_id: CredentialId,
    pub holder_ref: PartyId,
    /// Present when the payment collaborator still knows the order.
    pub order: Option<OrderSummary>,
    pub expires_at: i64,
}

/// Advisory classification returned by `inspect`.
///
/// This read lets the terminal UI short-circuit, but it is not the
/// authoritative check - only `decide` consumes the credential.
#[derive(Debug, Clone)]
pub enum Inspection {
    /// Scannable: pending and inside its validity window.
    Pending(CredentialView),
    /// Already consumed; carries the recorded decision so the UI can show
    /// "processed elsewhere".
    AlreadyDecided {
        credential_id: CredentialId,
        decision: Decision,
    },
    /// Still pending but past its TTL.
    Expired {
        credential_id: CredentialId,
        expired_at: i64,
    },
}

/// A holder's view of their own credential.
///
/// A still-pending credential past its TTL reads as `Expired` even before
/// a scan or sweep records the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Pending { expires_at: i64 },
    Approved,
    Denied,
    Expired,
}

/// Result of an authoritative `decide` call.
#[derive(Debug, Clone)]
pub enum DecideOutcome {
    /// This terminal won the claim; the decision is committed and final.
    Decided(Decision),
    /// A benign race loss: someone decided first. Carries the winning
    /// decision so a second gate does not also open.
    AlreadyDecided(Decision),
    /// The validity window had lapsed; the credential went to `Expired`
    /// regardless of the requested outcome.
    Expired { expired_at: i64 },
}

/// The gate verification authority.
pub struct GateAuthority<S> {
    store: Arc<S>,
    router: EventRouter,
    orders: Arc<dyn OrderDirectory>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<S: CredentialStore> GateAuthority<S> {
    pub fn new(
        store: Arc<S>,
        router: EventRouter,
        orders: Arc<dyn OrderDirectory>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            router,
            orders,
            notifier,
            clock,
        }
    }

    /// Advisory read for terminal display. Does not mutate state.
    ///
    /// `terminal` identifies the scanner for anomaly attribution.
    pub async fn inspect(&self, code: &ExitCode, terminal: &PartyId) -> Result<Inspection> {
        let now = self.clock.now_millis();

        let Some(credential) = self.store.get_by_code(code).await? else {
            tracing::warn!(terminal = %terminal, "unknown code scanned");
            self.publish_anomaly(AnomalyKind::UnknownCode, None, Some(terminal), now);
            return Err(GateError::CredentialNotFound);
        };

        if credential.state.is_terminal() {
            tracing::warn!(
                credential = %credential.id,
                terminal = %terminal,
                state = %credential.state,
                "already-decided credential scanned"
            );
            self.publish_anomaly(
                AnomalyKind::ReusedScan,
                Some(&credential),
                Some(terminal),
                now,
            );
            let decision = recorded_decision(&credential)?;
            return Ok(Inspection::AlreadyDecided {
                credential_id: credential.id,
                decision,
            });
        }

        if credential.is_expired(now) {
            tracing::warn!(
                credential = %credential.id,
                terminal = %terminal,
                "expired credential scanned"
            );
            self.publish_anomaly(
                AnomalyKind::ExpiredScan,
                Some(&credential),
                Some(terminal),
                now,
            );
            return Ok(Inspection::Expired {
                credential_id: credential.id,
                expired_at: credential.expires_at,
            });
        }

        let order = self.orders.lookup(&credential.order_ref).await;
        Ok(Inspection::Pending(CredentialView {
            credential_id: credential.id,
            holder_ref: credential.holder_ref.clone(),
            order,
            expires_at: credential.expires_at,
        }))
    }

    /// Holder-scoped status poll.
    ///
    /// Lets a customer query their own credential while waiting at the
    /// gate. Unlike `inspect` this is not a scan: it mutates nothing and
    /// publishes no anomalies, so a holder polling every few seconds does
    /// not flood the security channel. A credential belonging to a
    /// different holder is indistinguishable from an unissued code.
    pub async fn status(&self, code: &ExitCode, holder: &PartyId) -> Result<ExitStatus> {
        let now = self.clock.now_millis();

        let Some(credential) = self.store.get_by_code(code).await? else {
            return Err(GateError::CredentialNotFound);
        };
        if &credential.holder_ref != holder {
            return Err(GateError::CredentialNotFound);
        }

        Ok(match credential.state {
            CredentialState::Pending if credential.is_expired(now) => ExitStatus::Expired,
            CredentialState::Pending => ExitStatus::Pending {
                expires_at: credential.expires_at,
            },
            CredentialState::Approved => ExitStatus::Approved,
            CredentialState::Denied => ExitStatus::Denied,
            CredentialState::Expired => ExitStatus::Expired,
        })
    }

    /// The authoritative claim: consume the credential with a decision.
    ///
    /// At most one decision ever commits, regardless of how many terminals
    /// scan concurrently. Once committed it cannot be rolled back; delivery
    /// to the holder is best-effort but the record persists and can be
    /// re-read via `inspect` or `history`.
    pub async fn decide(
        &self,
        code: &ExitCode,
        outcome: Outcome,
        decided_by: &PartyId,
    ) -> Result<DecideOutcome> {
        let now = self.clock.now_millis();

        match self.store.claim(code, outcome, Some(decided_by), now).await? {
            ClaimResult::NotFound => {
                tracing::warn!(terminal = %decided_by, "decision requested for unknown code");
                self.publish_anomaly(AnomalyKind::UnknownCode, None, Some(decided_by), now);
                Err(GateError::CredentialNotFound)
            }

            ClaimResult::AlreadyDecided(credential) => {
                tracing::warn!(
                    credential = %credential.id,
                    terminal = %decided_by,
                    state = %credential.state,
                    "decision raced an already-terminal credential"
                );
                self.publish_anomaly(
                    AnomalyKind::ReusedScan,
                    Some(&credential),
                    Some(decided_by),
                    now,
                );
                let decision = recorded_decision(&credential)?;
                Ok(DecideOutcome::AlreadyDecided(decision))
            }

            ClaimResult::Claimed(credential)
                if credential.state == CredentialState::Expired =>
            {
                tracing::warn!(
                    credential = %credential.id,
                    terminal = %decided_by,
                    "decision arrived after expiry"
                );
                self.publish_anomaly(
                    AnomalyKind::ExpiredScan,
                    Some(&credential),
                    Some(decided_by),
                    now,
                );
                Ok(DecideOutcome::Expired {
                    expired_at: credential.expires_at,
                })
            }

            ClaimResult::Claimed(credential) => {
                let decision = recorded_decision(&credential)?;
                tracing::info!(
                    credential = %credential.id,
                    order = %credential.order_ref,
                    terminal = %decided_by,
                    state = %credential.state,
                    "exit decision committed"
                );

                let event = GateEvent::Decision {
                    credential_id: credential.id,
                    order_ref: credential.order_ref.clone(),
                    holder_ref: credential.holder_ref.clone(),
                    state: credential.state,
                    decided_by: decision.decided_by.clone(),
                    decided_at: decision.decided_at,
                };

                // Origin session gets the push, admins get the audit copy.
                self.router
                    .publish(&Scope::Identity(credential.holder_ref.clone()), &event);
                self.router.publish(&Scope::Role(Role::Admin), &event);

                // Secondary best-effort path; cannot fail the decision.
                self.notifier.deliver(&credential.holder_ref, &event).await;

                if credential.state == CredentialState::Denied {
                    self.publish_anomaly(
                        AnomalyKind::ManualDenial,
                        Some(&credential),
                        Some(decided_by),
                        now,
                    );
                }

                Ok(DecideOutcome::Decided(decision))
            }
        }
    }

    /// Unexpired pending credentials, newest first. Security dashboard feed.
    pub async fn pending_exits(&self) -> Result<Vec<Credential>> {
        let now = self.clock.now_millis();
        Ok(self.store.list_pending(now).await?)
    }

    /// Decided credentials, most recent decision first. Audit read.
    pub async fn history(&self, limit: u32, offset: u32) -> Result<Vec<Credential>> {
        Ok(self.store.history(limit, offset).await?)
    }

    fn publish_anomaly(
        &self,
        kind: AnomalyKind,
        credential: Option<&Credential>,
        terminal: Option<&PartyId>,
        at: i64,
    ) {
        let event = GateEvent::Anomaly {
            kind,
            credential_id: credential.map(|c| c.id),
            order_ref: credential.map(|c| c.order_ref.clone()),
            terminal: terminal.cloned(),
            at,
        };
        self.router.publish(&Scope::Role(Role::Security), &event);
        self.router.publish(&Scope::Role(Role::Admin), &event);
    }
}

/// The decision recorded on a terminal credential row.
fn recorded_decision(credential: &Credential) -> Result<Decision> {
    credential.decision().ok_or_else(|| {
        GateError::InvalidState(format!(
            "credential {} terminal without decision",
            credential.id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{InMemoryOrders, NoopNotifier};
    use crate::config::GateConfig;
    use crate::issuer::TokenIssuer;
    use gatepass_core::{OrderRef, SystemClock};
    use gatepass_realtime::ConnectionRegistry;
    use gatepass_store::MemoryStore;

    struct Harness {
        issuer: TokenIssuer<MemoryStore>,
        authority: GateAuthority<MemoryStore>,
        registry: Arc<ConnectionRegistry>,
        orders: Arc<InMemoryOrders>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let router = EventRouter::new(Arc::clone(&registry));
        let orders = Arc::new(InMemoryOrders::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Harness {
            issuer: TokenIssuer::new(
                Arc::clone(&store),
                router.clone(),
                Arc::clone(&clock),
                &GateConfig::default(),
            ),
            authority: GateAuthority::new(
                store,
                router,
                Arc::clone(&orders) as Arc<dyn OrderDirectory>,
                Arc::new(NoopNotifier),
                clock,
            ),
            registry,
            orders,
        }
    }

    fn paid_order(order_ref: &str) -> OrderSummary {
        OrderSummary {
            order_ref: OrderRef::from(order_ref),
            holder_ref: PartyId::from("cust-1"),
            holder_name: "Ada".into(),
            holder_phone: None,
            amount_minor: 4200,
            items: vec![],
            is_paid: true,
        }
    }

    #[tokio::test]
    async fn test_inspect_pending_shows_order() {
        let h = harness();
        h.orders.put(paid_order("o1"));
        let credential = h.issuer.issue(&paid_order("o1")).await.unwrap();

        let inspection = h
            .authority
            .inspect(&credential.code, &PartyId::from("term-1"))
            .await
            .unwrap();

        match inspection {
            Inspection::Pending(view) => {
                assert_eq!(view.credential_id, credential.id);
                assert_eq!(view.holder_ref, PartyId::from("cust-1"));
                assert_eq!(view.order.unwrap().amount_minor, 4200);
                assert_eq!(view.expires_at, credential.expires_at);
            }
            other => panic!("expected Pending, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inspect_unknown_code_signals_anomaly() {
        let h = harness();
        let mut admin = h.registry.register(PartyId::from("adm-1"), Role::Admin);

        let stranger = ExitCode::generate();
        let result = h
            .authority
            .inspect(&stranger, &PartyId::from("term-1"))
            .await;
        assert!(matches!(result, Err(GateError::CredentialNotFound)));

        match admin.recv().await {
            Some(GateEvent::Anomaly { kind, terminal, .. }) => {
                assert_eq!(kind, AnomalyKind::UnknownCode);
                assert_eq!(terminal, Some(PartyId::from("term-1")));
            }
            other => panic!("expected anomaly, got {:?}", other),
        }
        // Exactly one event for one scan.
        assert!(admin.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_decide_approve_notifies_holder_and_admin() {
        let h = harness();
        let credential = h.issuer.issue(&paid_order("o1")).await.unwrap();
        let mut holder = h.registry.register(PartyId::from("cust-1"), Role::Customer);
        let mut admin = h.registry.register(PartyId::from("adm-1"), Role::Admin);

        let outcome = h
            .authority
            .decide(&credential.code, Outcome::Approve, &PartyId::from("sec-1"))
            .await
            .unwrap();

        match outcome {
            DecideOutcome::Decided(decision) => {
                assert_eq!(decision.state, CredentialState::Approved);
                assert_eq!(decision.decided_by, Some(PartyId::from("sec-1")));
            }
            other => panic!("expected Decided, got {:?}", other),
        }

        assert!(matches!(holder.recv().await, Some(GateEvent::Decision { .. })));
        assert!(matches!(admin.recv().await, Some(GateEvent::Decision { .. })));
    }

    #[tokio::test]
    async fn test_decide_deny_emits_manual_denial() {
        let h = harness();
        let credential = h.issuer.issue(&paid_order("o1")).await.unwrap();
        let mut admin = h.registry.register(PartyId::from("adm-1"), Role::Admin);

        h.authority
            .decide(&credential.code, Outcome::Deny, &PartyId::from("sec-1"))
            .await
            .unwrap();

        // Decision first, then the fraud-signal side channel.
        assert!(matches!(admin.recv().await, Some(GateEvent::Decision { .. })));
        match admin.recv().await {
            Some(GateEvent::Anomaly { kind, .. }) => {
                assert_eq!(kind, AnomalyKind::ManualDenial)
            }
            other => panic!("expected manual_denial anomaly, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_decide_reports_winner() {
        let h = harness();
        let credential = h.issuer.issue(&paid_order("o1")).await.unwrap();

        h.authority
            .decide(&credential.code, Outcome::Approve, &PartyId::from("sec-1"))
            .await
            .unwrap();

        let loser = h
            .authority
            .decide(&credential.code, Outcome::Deny, &PartyId::from("sec-2"))
            .await
            .unwrap();

        match loser {
            DecideOutcome::AlreadyDecided(decision) => {
                assert_eq!(decision.state, CredentialState::Approved);
                assert_eq!(decision.decided_by, Some(PartyId::from("sec-1")));
            }
            other => panic!("expected AlreadyDecided, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_is_holder_scoped_and_silent() {
        let h = harness();
        let credential = h.issuer.issue(&paid_order("o1")).await.unwrap();
        let mut security = h.registry.register(PartyId::from("sec-9"), Role::Security);
        let mut admin = h.registry.register(PartyId::from("adm-1"), Role::Admin);

        // The holder sees their pending credential.
        match h
            .authority
            .status(&credential.code, &PartyId::from("cust-1"))
            .await
            .unwrap()
        {
            ExitStatus::Pending { expires_at } => assert_eq!(expires_at, credential.expires_at),
            other => panic!("expected Pending, got {:?}", other),
        }

        // Someone else's credential reads as not found.
        let other = h
            .authority
            .status(&credential.code, &PartyId::from("cust-2"))
            .await;
        assert!(matches!(other, Err(GateError::CredentialNotFound)));

        h.authority
            .decide(&credential.code, Outcome::Approve, &PartyId::from("sec-1"))
            .await
            .unwrap();

        // Polling after the decision keeps reflecting the terminal state.
        for _ in 0..3 {
            let status = h
                .authority
                .status(&credential.code, &PartyId::from("cust-1"))
                .await
                .unwrap();
            assert_eq!(status, ExitStatus::Approved);
        }

        // Polls published nothing; the only event is the decision itself.
        assert!(matches!(admin.recv().await, Some(GateEvent::Decision { .. })));
        assert!(admin.try_recv().is_none());
        assert!(security.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_pending_and_history_reads() {
        let h = harness();
        let a = h.issuer.issue(&paid_order("o1")).await.unwrap();
        let _b = h.issuer.issue(&paid_order("o2")).await.unwrap();

        assert_eq!(h.authority.pending_exits().await.unwrap().len(), 2);

        h.authority
            .decide(&a.code, Outcome::Approve, &PartyId::from("sec-1"))
            .await
            .unwrap();

        assert_eq!(h.authority.pending_exits().await.unwrap().len(), 1);
        let history = h.authority.history(10, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, a.id);
    }
}
