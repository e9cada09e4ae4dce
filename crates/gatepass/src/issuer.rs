//! Exit credential issuance.

use std::sync::Arc;

use gatepass_core::{Clock, Credential, GateEvent, OrderSummary, Role};
use gatepass_realtime::{EventRouter, Scope};
use gatepass_store::CredentialStore;

use crate::config::GateConfig;
use crate::error::{GateError, Result};

/// Mints exit credentials for paid orders.
///
/// Enforces at most one active credential per order: repeated requests
/// return the existing credential instead of churning out new codes.
pub struct TokenIssuer<S> {
    store: Arc<S>,
    router: EventRouter,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl<S: CredentialStore> TokenIssuer<S> {
    pub fn new(
        store: Arc<S>,
        router: EventRouter,
        clock: Arc<dyn Clock>,
        config: &GateConfig,
    ) -> Self {
        Self {
            store,
            router,
            clock,
            ttl_ms: config.ttl_ms,
        }
    }

    /// Issue a credential for a paid order.
    ///
    /// The caller is expected to have fetched the summary from the payment
    /// collaborator; `is_paid` is re-checked here and surfaced as
    /// `OrderNotEligible` rather than trusted silently.
    ///
    /// Idempotent while a pending, unexpired credential exists: the same
    /// credential (same code, same `expires_at`) comes back unchanged.
    pub async fn issue(&self, order: &OrderSummary) -> Result<Credential> {
        if !order.is_paid {
            return Err(GateError::OrderNotEligible {
                order_ref: order.order_ref.clone(),
            });
        }

        let now = self.clock.now_millis();

        // Lookup and insert are separate store calls, so two racing issue
        // requests for the same order can each mint a credential. A unique
        // index on pending order_refs would also reject legitimate re-issue
        // while an expired row sits unswept, so the window stays open; the
        // claim still consumes at most one credential per scan.
        if let Some(existing) = self.store.find_active(&order.order_ref, now).await? {
            tracing::debug!(
                credential = %existing.id,
                order = %order.order_ref,
                "reusing active credential"
            );
            return Ok(existing);
        }

        let credential = Credential::issue(
            order.order_ref.clone(),
            order.holder_ref.clone(),
            now,
            self.ttl_ms,
        );
        self.store.insert(&credential).await?;

        tracing::info!(
            credential = %credential.id,
            order = %order.order_ref,
            expires_at = credential.expires_at,
            "issued exit credential"
        );

        // Security personnel see the request appear. The code itself stays
        // out of the event: terminals learn it only from the physical scan.
        self.router.publish(
            &Scope::Role(Role::Security),
            &GateEvent::Requested {
                credential_id: credential.id,
                order_ref: order.order_ref.clone(),
                holder_name: order.holder_name.clone(),
                holder_phone: order.holder_phone.clone(),
                amount_minor: order.amount_minor,
                expires_at: credential.expires_at,
            },
        );

        Ok(credential)
    }
}
