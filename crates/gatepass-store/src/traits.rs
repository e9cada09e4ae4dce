//! CredentialStore trait: the abstract interface for credential persistence.
//!
//! This trait keeps the gate logic storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use gatepass_core::{Credential, ExitCode, OrderRef, Outcome, PartyId};

use crate::error::Result;

/// Result of attempting the atomic `Pending -> terminal` transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimResult {
    /// This caller won the claim. The credential carries the committed
    /// state, which is `Expired` rather than the requested outcome if the
    /// validity window had already lapsed.
    Claimed(Credential),
    /// The credential was already terminal. Carries the existing row so the
    /// race loser can surface the winning decision.
    AlreadyDecided(Credential),
    /// No credential with this code was ever issued.
    NotFound,
}

/// The CredentialStore trait: async interface for credential persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **Atomic claim**: `claim` is the only mutation after insert. It is a
///   single conditional write; exactly one contender among concurrent
///   callers observes `Claimed`.
/// - **Expiry precedence**: expiry is checked inside the same atomic step,
///   so a scan racing the reaper can never land `Approved` past the TTL.
/// - **Audit records**: credentials are never deleted.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a freshly issued credential.
    ///
    /// Fails with `DuplicateCredential` if the id or code already exists.
    async fn insert(&self, credential: &Credential) -> Result<()>;

    /// The `Pending`, non-expired credential for an order, if one exists.
    ///
    /// At most one can exist at a time; the issuer returns it unchanged
    /// instead of minting a duplicate.
    async fn find_active(&self, order_ref: &OrderRef, now: i64) -> Result<Option<Credential>>;

    /// Look up a credential by its exit code. Read-only, advisory.
    async fn get_by_code(&self, code: &ExitCode) -> Result<Option<Credential>>;

    /// Atomically transition `Pending -> terminal` for the given code.
    ///
    /// The transition is keyed on `(code, state == Pending)`. Inside the
    /// same atomic step, a lapsed window forces the target to `Expired`
    /// and clears `decided_by` regardless of the requested outcome.
    ///
    /// `decided_by` is `None` only for reaper sweeps.
    async fn claim(
        &self,
        code: &ExitCode,
        outcome: Outcome,
        decided_by: Option<&PartyId>,
        now: i64,
    ) -> Result<ClaimResult>;

    /// Unexpired pending credentials, newest first.
    async fn list_pending(&self, now: i64) -> Result<Vec<Credential>>;

    /// Pending credentials whose expiry has passed, for the reaper.
    async fn expired_pending(&self, now: i64) -> Result<Vec<Credential>>;

    /// Decided credentials, most recent decision first.
    async fn history(&self, limit: u32, offset: u32) -> Result<Vec<Credential>>;
}
