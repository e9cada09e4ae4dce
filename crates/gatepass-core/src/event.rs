//! Typed realtime events.
//!
//! Events are what observers see: security terminals watch issuance, the
//! origin customer session receives the decision, admins get the audit and
//! anomaly streams. Payloads identify credentials by id and order ref only;
//! the exit code never rides on an event.

use serde::{Deserialize, Serialize};

use crate::credential::CredentialState;
use crate::types::{CredentialId, OrderRef, PartyId};

/// Classification of scan behavior inconsistent with single-use issuance.
///
/// Each kind is a distinct tag; they are never folded into a generic alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// A still-pending credential was scanned after its TTL. Carries the
    /// scanning terminal, which distinguishes it from a routine sweep.
    ExpiredScan,
    /// The reaper reclassified an expired pending credential. Informational.
    ExpiredSweep,
    /// A terminal attempted to decide an already-terminal credential.
    ReusedScan,
    /// A scan presented a code that was never issued.
    UnknownCode,
    /// A security operator explicitly denied the exit.
    ManualDenial,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::ExpiredScan => "expired_scan",
            AnomalyKind::ExpiredSweep => "expired_sweep",
            AnomalyKind::ReusedScan => "reused_scan",
            AnomalyKind::UnknownCode => "unknown_code",
            AnomalyKind::ManualDenial => "manual_denial",
        }
    }
}

/// A typed event published on the realtime channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GateEvent {
    /// A credential was issued; security personnel see the request appear.
    #[serde(rename = "gate.requested")]
    Requested {
        credential_id: CredentialId,
        order_ref: OrderRef,
        holder_name: String,
        holder_phone: Option<String>,
        amount_minor: i64,
        expires_at: i64,
    },

    /// A terminal decision was committed; pushed to the origin customer
    /// session and to admin observers.
    #[serde(rename = "gate.decision")]
    Decision {
        credential_id: CredentialId,
        order_ref: OrderRef,
        holder_ref: PartyId,
        state: CredentialState,
        decided_by: Option<PartyId>,
        decided_at: i64,
    },

    /// Misuse signal; see [`AnomalyKind`].
    #[serde(rename = "gate.anomaly")]
    Anomaly {
        kind: AnomalyKind,
        /// Absent for `UnknownCode` (there is no credential to point at).
        credential_id: Option<CredentialId>,
        order_ref: Option<OrderRef>,
        /// The scanning terminal, when one triggered the anomaly.
        terminal: Option<PartyId>,
        at: i64,
    },
}

impl GateEvent {
    /// Wire name of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            GateEvent::Requested { .. } => "gate.requested",
            GateEvent::Decision { .. } => "gate.decision",
            GateEvent::Anomaly { .. } => "gate.anomaly",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let ev = GateEvent::Anomaly {
            kind: AnomalyKind::UnknownCode,
            credential_id: None,
            order_ref: None,
            terminal: Some(PartyId::from("term-1")),
            at: 42,
        };
        assert_eq!(ev.event_type(), "gate.anomaly");
    }

    #[test]
    fn test_wire_tag() {
        let ev = GateEvent::Requested {
            credential_id: CredentialId::from_bytes([1; 16]),
            order_ref: OrderRef::from("o1"),
            holder_name: "Ada".into(),
            holder_phone: None,
            amount_minor: 1500,
            expires_at: 99,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "gate.requested");
        // The payload must never contain a code field.
        assert!(json.get("code").is_none());
    }

    #[test]
    fn test_anomaly_kind_tags() {
        let json = serde_json::to_string(&AnomalyKind::ExpiredScan).unwrap();
        assert_eq!(json, "\"expired_scan\"");
        assert_eq!(AnomalyKind::ManualDenial.as_str(), "manual_denial");
    }

    #[test]
    fn test_event_roundtrip() {
        let ev = GateEvent::Decision {
            credential_id: CredentialId::from_bytes([7; 16]),
            order_ref: OrderRef::from("o7"),
            holder_ref: PartyId::from("cust-7"),
            state: CredentialState::Approved,
            decided_by: Some(PartyId::from("sec-2")),
            decided_at: 1234,
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: GateEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }
}
