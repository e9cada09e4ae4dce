//! Scoped event fanout.
//!
//! The router publishes typed events to role- or identity-scoped
//! recipients. Publishing is fire-and-forget: it never blocks, never
//! errors, and silently drops events with no live subscriber. Durability
//! of the underlying decision is the store's job, not the router's.

use std::fmt;
use std::sync::Arc;

use gatepass_core::{GateEvent, PartyId, Role};

use crate::registry::ConnectionRegistry;

/// Addressing predicate selecting event recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every live connection holding the role.
    Role(Role),
    /// The identity's single live connection.
    Identity(PartyId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Role(role) => write!(f, "role:{}", role),
            Scope::Identity(identity) => write!(f, "identity:{}", identity),
        }
    }
}

/// Publishes events to scoped recipients via the connection registry.
#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Publish an event to every current subscriber of the scope.
    ///
    /// Uses `try_send`, so per-scope publish order is preserved for each
    /// subscriber and a slow consumer only loses its own events. Events
    /// for absent subscribers are dropped.
    pub fn publish(&self, scope: &Scope, event: &GateEvent) {
        let senders = match scope {
            Scope::Role(role) => self.registry.resolve_role(*role),
            Scope::Identity(identity) => {
                self.registry.resolve_identity(identity).into_iter().collect()
            }
        };

        if senders.is_empty() {
            tracing::debug!(scope = %scope, event = event.event_type(), "no subscribers");
            return;
        }

        for sender in senders {
            if let Err(err) = sender.try_send(event.clone()) {
                tracing::debug!(scope = %scope, event = event.event_type(), %err, "dropped event");
            }
        }
    }
}
