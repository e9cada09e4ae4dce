//! In-memory implementation of the CredentialStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. The claim runs
//! under the write lock, which makes it the same linearizable
//! compare-and-set the SQLite UPDATE provides.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use gatepass_core::{Credential, CredentialId, CredentialState, ExitCode, OrderRef, Outcome, PartyId};

use crate::error::{Result, StoreError};
use crate::traits::{ClaimResult, CredentialStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Credentials indexed by code (the claim key).
    by_code: HashMap<ExitCode, Credential>,

    /// Secondary index: credential id -> code.
    by_id: HashMap<CredentialId, ExitCode>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                by_code: HashMap::new(),
                by_id: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::InvalidData(format!("lock poisoned: {}", e))
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert(&self, credential: &Credential) -> Result<()> {
        let mut inner = self.inner.write().map_err(lock_poisoned)?;

        if inner.by_code.contains_key(&credential.code) || inner.by_id.contains_key(&credential.id)
        {
            return Err(StoreError::DuplicateCredential(credential.id.to_hex()));
        }

        inner.by_id.insert(credential.id, credential.code.clone());
        inner.by_code.insert(credential.code.clone(), credential.clone());
        Ok(())
    }

    async fn find_active(&self, order_ref: &OrderRef, now: i64) -> Result<Option<Credential>> {
        let inner = self.inner.read().map_err(lock_poisoned)?;

        Ok(inner
            .by_code
            .values()
            .filter(|c| &c.order_ref == order_ref && c.is_active(now))
            .max_by_key(|c| c.issued_at)
            .cloned())
    }

    async fn get_by_code(&self, code: &ExitCode) -> Result<Option<Credential>> {
        let inner = self.inner.read().map_err(lock_poisoned)?;
        Ok(inner.by_code.get(code).cloned())
    }

    async fn claim(
        &self,
        code: &ExitCode,
        outcome: Outcome,
        decided_by: Option<&PartyId>,
        now: i64,
    ) -> Result<ClaimResult> {
        let mut inner = self.inner.write().map_err(lock_poisoned)?;

        let Some(credential) = inner.by_code.get_mut(code) else {
            return Ok(ClaimResult::NotFound);
        };

        if credential.state.is_terminal() {
            return Ok(ClaimResult::AlreadyDecided(credential.clone()));
        }

        // Expiry forced inside the same guarded step, matching the SQL CASE.
        if credential.is_expired(now) {
            credential.state = CredentialState::Expired;
            credential.decided_by = None;
        } else {
            credential.state = outcome.target_state();
            credential.decided_by = decided_by.cloned();
        }
        credential.decided_at = Some(now);

        Ok(ClaimResult::Claimed(credential.clone()))
    }

    async fn list_pending(&self, now: i64) -> Result<Vec<Credential>> {
        let inner = self.inner.read().map_err(lock_poisoned)?;

        let mut pending: Vec<Credential> = inner
            .by_code
            .values()
            .filter(|c| c.is_active(now))
            .cloned()
            .collect();
        pending.sort_by_key(|c| std::cmp::Reverse(c.issued_at));
        Ok(pending)
    }

    async fn expired_pending(&self, now: i64) -> Result<Vec<Credential>> {
        let inner = self.inner.read().map_err(lock_poisoned)?;

        let mut stale: Vec<Credential> = inner
            .by_code
            .values()
            .filter(|c| c.state == CredentialState::Pending && c.is_expired(now))
            .cloned()
            .collect();
        stale.sort_by_key(|c| c.expires_at);
        Ok(stale)
    }

    async fn history(&self, limit: u32, offset: u32) -> Result<Vec<Credential>> {
        let inner = self.inner.read().map_err(lock_poisoned)?;

        let mut decided: Vec<Credential> = inner
            .by_code
            .values()
            .filter(|c| c.state.is_terminal())
            .cloned()
            .collect();
        decided.sort_by_key(|c| std::cmp::Reverse(c.decided_at));
        Ok(decided
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_credential(order: &str, issued_at: i64, ttl_ms: i64) -> Credential {
        Credential::issue(
            OrderRef::from(order),
            PartyId::from("cust-1"),
            issued_at,
            ttl_ms,
        )
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let credential = make_credential("o1", 1_000, 300_000);

        store.insert(&credential).await.unwrap();
        let got = store.get_by_code(&credential.code).await.unwrap().unwrap();
        assert_eq!(got, credential);
    }

    #[tokio::test]
    async fn test_memory_store_duplicate() {
        let store = MemoryStore::new();
        let credential = make_credential("o1", 1_000, 300_000);

        store.insert(&credential).await.unwrap();
        assert!(matches!(
            store.insert(&credential).await,
            Err(StoreError::DuplicateCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_claim_matches_sqlite_semantics() {
        let store = MemoryStore::new();
        let credential = make_credential("o1", 1_000, 300_000);
        store.insert(&credential).await.unwrap();

        let sec = PartyId::from("sec-1");
        let first = store
            .claim(&credential.code, Outcome::Deny, Some(&sec), 2_000)
            .await
            .unwrap();
        assert!(matches!(
            first,
            ClaimResult::Claimed(ref c) if c.state == CredentialState::Denied
        ));

        let second = store
            .claim(&credential.code, Outcome::Approve, Some(&sec), 3_000)
            .await
            .unwrap();
        assert!(matches!(
            second,
            ClaimResult::AlreadyDecided(ref c) if c.state == CredentialState::Denied
        ));
    }

    #[tokio::test]
    async fn test_memory_claim_expiry_forced() {
        let store = MemoryStore::new();
        let credential = make_credential("o1", 1_000, 300_000);
        store.insert(&credential).await.unwrap();

        let result = store
            .claim(&credential.code, Outcome::Approve, Some(&PartyId::from("sec-1")), 361_000)
            .await
            .unwrap();
        match result {
            ClaimResult::Claimed(c) => {
                assert_eq!(c.state, CredentialState::Expired);
                assert!(c.decided_by.is_none());
            }
            other => panic!("expected Claimed(Expired), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let credential = make_credential("o1", 1_000, 300_000);
        store.insert(&credential).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let code = credential.code.clone();
            let outcome = if i % 2 == 0 { Outcome::Approve } else { Outcome::Deny };
            handles.push(tokio::spawn(async move {
                let terminal = PartyId::new(format!("term-{}", i));
                store.claim(&code, outcome, Some(&terminal), 2_000).await.unwrap()
            }));
        }

        let mut winners = 0;
        let mut losers = 0;
        let mut winning_state = None;
        for handle in handles {
            match handle.await.unwrap() {
                ClaimResult::Claimed(c) => {
                    winners += 1;
                    winning_state = Some(c.state);
                }
                ClaimResult::AlreadyDecided(c) => {
                    losers += 1;
                    // Every loser sees the single committed decision.
                    assert!(c.state.is_terminal());
                }
                ClaimResult::NotFound => panic!("credential vanished"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(losers, 7);
        assert!(winning_state.unwrap().is_terminal());
    }
}
