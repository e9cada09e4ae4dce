//! Live connection registry.
//!
//! Tracks realtime sessions by identity and role. The registry is an
//! explicit owned object created at process start, not ambient global
//! state, so multiple instances can coexist in tests and deployments.
//!
//! Sessions carry no domain data - only a routing address (a bounded
//! channel sender). They are destroyed on disconnect and never persisted.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::RwLock;

use tokio::sync::mpsc;

use gatepass_core::{now_millis, GateEvent, PartyId, Role};

/// Per-connection event buffer. A subscriber this far behind starts
/// losing events; decision durability lives in the store, not here.
pub const EVENT_BUFFER: usize = 256;

/// Opaque identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Metadata for a registered session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub identity: PartyId,
    pub role: Role,
    /// Unix ms.
    pub joined_at: i64,
}

/// The subscriber's end of a registration.
///
/// Dropping the handle does not unregister; call
/// [`ConnectionRegistry::unregister`] on disconnect. A handle whose
/// registration was evicted (identity reconnected) sees its channel close.
pub struct ConnectionHandle {
    session: Session,
    receiver: mpsc::Receiver<GateEvent>,
}

impl ConnectionHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.session.connection_id
    }

    /// Receive the next event. Returns `None` once evicted or unregistered.
    pub async fn recv(&mut self) -> Option<GateEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for draining in tests.
    pub fn try_recv(&mut self) -> Option<GateEvent> {
        self.receiver.try_recv().ok()
    }
}

struct Registration {
    session: Session,
    sender: mpsc::Sender<GateEvent>,
}

struct RegistryInner {
    next_id: u64,
    connections: HashMap<ConnectionId, Registration>,
    by_identity: HashMap<PartyId, ConnectionId>,
    by_role: HashMap<Role, HashSet<ConnectionId>>,
}

/// Thread-safe index of live connections.
///
/// All critical sections are bounded: the lock is held only for map
/// operations, never across an await.
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                next_id: 0,
                connections: HashMap::new(),
                by_identity: HashMap::new(),
                by_role: HashMap::new(),
            }),
        }
    }

    /// Register a verified `(identity, role)` pair.
    ///
    /// An identity holds at most one active connection: re-registration
    /// evicts the prior handle, whose channel closes. This keeps decision
    /// pushes off dead sockets after a reconnect.
    pub fn register(&self, identity: PartyId, role: Role) -> ConnectionHandle {
        let (sender, receiver) = mpsc::channel(EVENT_BUFFER);

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some(stale) = inner.by_identity.remove(&identity) {
            remove_connection(&mut inner, stale);
            tracing::debug!(connection = %stale, identity = %identity, "evicted stale connection");
        }

        inner.next_id += 1;
        let connection_id = ConnectionId(inner.next_id);
        let session = Session {
            connection_id,
            identity: identity.clone(),
            role,
            joined_at: now_millis(),
        };

        inner.connections.insert(
            connection_id,
            Registration {
                session: session.clone(),
                sender,
            },
        );
        inner.by_identity.insert(identity.clone(), connection_id);
        inner.by_role.entry(role).or_default().insert(connection_id);

        tracing::debug!(connection = %connection_id, identity = %identity, role = %role, "registered");

        ConnectionHandle { session, receiver }
    }

    /// Remove a connection on disconnect. Unknown ids are a no-op.
    pub fn unregister(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some(registration) = inner.connections.get(&connection_id) {
            let identity = registration.session.identity.clone();
            // Only clear the identity index if it still points here; a
            // reconnect may have already replaced the entry.
            if inner.by_identity.get(&identity) == Some(&connection_id) {
                inner.by_identity.remove(&identity);
            }
            remove_connection(&mut inner, connection_id);
            tracing::debug!(connection = %connection_id, identity = %identity, "unregistered");
        }
    }

    /// Senders for every live connection holding the given role.
    pub(crate) fn resolve_role(&self, role: Role) -> Vec<mpsc::Sender<GateEvent>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        inner
            .by_role
            .get(&role)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.connections.get(id))
                    .map(|r| r.sender.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sender for the identity's live connection, if any.
    pub(crate) fn resolve_identity(&self, identity: &PartyId) -> Option<mpsc::Sender<GateEvent>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        inner
            .by_identity
            .get(identity)
            .and_then(|id| inner.connections.get(id))
            .map(|r| r.sender.clone())
    }

    /// Whether the identity currently holds a connection.
    pub fn is_connected(&self, identity: &PartyId) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_identity.contains_key(identity)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_connection(inner: &mut RegistryInner, connection_id: ConnectionId) {
    if let Some(registration) = inner.connections.remove(&connection_id) {
        if let Some(ids) = inner.by_role.get_mut(&registration.session.role) {
            ids.remove(&connection_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = ConnectionRegistry::new();
        let handle = registry.register(PartyId::from("sec-1"), Role::Security);

        assert!(registry.is_connected(&PartyId::from("sec-1")));
        assert_eq!(registry.resolve_role(Role::Security).len(), 1);
        assert!(registry.resolve_identity(&PartyId::from("sec-1")).is_some());
        assert_eq!(handle.session().role, Role::Security);
    }

    #[test]
    fn test_unregister_removes_all_indexes() {
        let registry = ConnectionRegistry::new();
        let handle = registry.register(PartyId::from("sec-1"), Role::Security);

        registry.unregister(handle.connection_id());

        assert!(!registry.is_connected(&PartyId::from("sec-1")));
        assert!(registry.resolve_role(Role::Security).is_empty());
        assert!(registry.resolve_identity(&PartyId::from("sec-1")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reconnect_evicts_prior_handle() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(PartyId::from("cust-1"), Role::Customer);
        let second = registry.register(PartyId::from("cust-1"), Role::Customer);

        assert_ne!(first.connection_id(), second.connection_id());
        // One live connection, and the identity resolves to the new one.
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry
                .resolve_identity(&PartyId::from("cust-1"))
                .map(|s| !s.is_closed()),
            Some(true)
        );
    }

    #[test]
    fn test_unregister_stale_id_keeps_new_registration() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(PartyId::from("cust-1"), Role::Customer);
        let _second = registry.register(PartyId::from("cust-1"), Role::Customer);

        // A late disconnect of the evicted handle must not drop the new one.
        registry.unregister(first.connection_id());
        assert!(registry.is_connected(&PartyId::from("cust-1")));
    }

    #[tokio::test]
    async fn test_evicted_handle_channel_closes() {
        let registry = ConnectionRegistry::new();
        let mut first = registry.register(PartyId::from("cust-1"), Role::Customer);
        let _second = registry.register(PartyId::from("cust-1"), Role::Customer);

        // Sender side was dropped during eviction.
        assert!(first.recv().await.is_none());
    }

    #[test]
    fn test_roles_indexed_separately() {
        let registry = ConnectionRegistry::new();
        let _a = registry.register(PartyId::from("sec-1"), Role::Security);
        let _b = registry.register(PartyId::from("sec-2"), Role::Security);
        let _c = registry.register(PartyId::from("adm-1"), Role::Admin);

        assert_eq!(registry.resolve_role(Role::Security).len(), 2);
        assert_eq!(registry.resolve_role(Role::Admin).len(), 1);
        assert!(registry.resolve_role(Role::Customer).is_empty());
    }
}
