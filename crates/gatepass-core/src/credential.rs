//! The credential record and its state machine.
//!
//! A credential starts `Pending` and transitions exactly once to one of the
//! three terminal states. It is an audit record: mutated only by the claim
//! primitive, never deleted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::code::ExitCode;
use crate::error::CoreError;
use crate::types::{CredentialId, OrderRef, PartyId};

/// Lifecycle state of a credential.
///
/// `Pending` is the single root; `Approved`, `Denied`, and `Expired` are
/// sinks with no outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialState {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl CredentialState {
    /// True for the three sink states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CredentialState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialState::Pending => "pending",
            CredentialState::Approved => "approved",
            CredentialState::Denied => "denied",
            CredentialState::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(CredentialState::Pending),
            "approved" => Ok(CredentialState::Approved),
            "denied" => Ok(CredentialState::Denied),
            "expired" => Ok(CredentialState::Expired),
            other => Err(CoreError::InvalidState(other.to_string())),
        }
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal's requested decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Approve,
    Deny,
}

impl Outcome {
    /// The terminal state this outcome maps to, absent expiry.
    pub fn target_state(&self) -> CredentialState {
        match self {
            Outcome::Approve => CredentialState::Approved,
            Outcome::Deny => CredentialState::Denied,
        }
    }
}

/// A single-use, time-bounded exit authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub order_ref: OrderRef,
    pub holder_ref: PartyId,
    pub code: ExitCode,
    /// Unix ms.
    pub issued_at: i64,
    /// Unix ms; `issued_at + TTL`.
    pub expires_at: i64,
    pub state: CredentialState,
    /// Who produced the terminal state. Absent for `Expired`.
    pub decided_by: Option<PartyId>,
    /// Unix ms of the terminal transition.
    pub decided_at: Option<i64>,
}

impl Credential {
    /// Mint a fresh pending credential.
    pub fn issue(
        order_ref: OrderRef,
        holder_ref: PartyId,
        issued_at: i64,
        ttl_ms: i64,
    ) -> Self {
        Self {
            id: CredentialId::generate(),
            order_ref,
            holder_ref,
            code: ExitCode::generate(),
            issued_at,
            expires_at: issued_at + ttl_ms,
            state: CredentialState::Pending,
            decided_by: None,
            decided_at: None,
        }
    }

    /// True once past `expires_at`, regardless of state.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    /// Still pending and inside its validity window.
    pub fn is_active(&self, now: i64) -> bool {
        self.state == CredentialState::Pending && !self.is_expired(now)
    }

    /// The recorded terminal decision, if any.
    pub fn decision(&self) -> Option<Decision> {
        if !self.state.is_terminal() {
            return None;
        }
        Some(Decision {
            state: self.state,
            decided_by: self.decided_by.clone(),
            decided_at: self.decided_at.unwrap_or(self.expires_at),
        })
    }
}

/// The recorded outcome of a terminal transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub state: CredentialState,
    /// `None` when expiry produced the state.
    pub decided_by: Option<PartyId>,
    pub decided_at: i64,
}
