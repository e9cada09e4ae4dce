//! Proptest strategies for gate domain types.

use proptest::prelude::*;

use gatepass_core::{
    Credential, CredentialId, CredentialState, ExitCode, OrderRef, PartyId, CODE_ALPHABET,
    CODE_LEN, CODE_PREFIX,
};

/// A well-formed exit code string, via the public parser.
pub fn arb_exit_code() -> impl Strategy<Value = ExitCode> {
    proptest::collection::vec(0..CODE_ALPHABET.len(), CODE_LEN).prop_map(|indexes| {
        let mut s = String::from(CODE_PREFIX);
        for i in indexes {
            s.push(CODE_ALPHABET[i] as char);
        }
        ExitCode::parse(&s).unwrap()
    })
}

/// A string that is NOT a well-formed exit code.
pub fn arb_malformed_code() -> impl Strategy<Value = String> {
    prop_oneof![
        // wrong prefix
        "[A-Z]{2}_[2-9A-HJKMNP-Z]{16}",
        // wrong length
        "EX-[2-9A-HJKMNP-Z]{1,15}",
        // excluded characters in the body
        "EX-[01IOL]{16}",
        Just(String::new()),
    ]
}

pub fn arb_credential_id() -> impl Strategy<Value = CredentialId> {
    any::<[u8; 16]>().prop_map(CredentialId::from_bytes)
}

pub fn arb_order_ref() -> impl Strategy<Value = OrderRef> {
    "[a-z0-9]{4,12}".prop_map(OrderRef::new)
}

pub fn arb_party_id() -> impl Strategy<Value = PartyId> {
    "(cust|sec|adm)-[a-z0-9]{4,8}".prop_map(PartyId::new)
}

pub fn arb_state() -> impl Strategy<Value = CredentialState> {
    prop_oneof![
        Just(CredentialState::Pending),
        Just(CredentialState::Approved),
        Just(CredentialState::Denied),
        Just(CredentialState::Expired),
    ]
}

/// A pending credential with an arbitrary issue instant and TTL.
pub fn arb_pending_credential() -> impl Strategy<Value = Credential> {
    (arb_order_ref(), arb_party_id(), 0i64..=10_000_000_000, 1i64..=3_600_000).prop_map(
        |(order_ref, holder_ref, issued_at, ttl_ms)| {
            Credential::issue(order_ref, holder_ref, issued_at, ttl_ms)
        },
    )
}
