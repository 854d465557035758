//! Shared proptest generators for SET domain types.

use auth_secevent::{
    ComplexSubject, EventData, EventOptions, EventSubject, SecEventType, SecurityEvent,
    SubjectIdentifier,
};
use proptest::prelude::*;
use serde_json::Value;

/// Generate any catalogued event type.
pub fn event_type_strategy() -> impl Strategy<Value = SecEventType> {
    prop::sample::select(SecEventType::ALL.to_vec())
}

/// Generate HTTPS issuer URLs.
pub fn issuer_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,12}".prop_map(|host| format!("https://{host}.example.com"))
}

/// Generate simple (non-alias) subject identifiers.
pub fn subject_identifier_strategy() -> impl Strategy<Value = SubjectIdentifier> {
    prop_oneof![
        "[a-z0-9._%+-]{1,16}@[a-z0-9-]{1,12}\\.[a-z]{2,4}".prop_map(SubjectIdentifier::email),
        ("[a-z]{5,20}", "[a-z0-9]{10,30}").prop_map(|(iss, sub)| {
            SubjectIdentifier::iss_sub(format!("https://{iss}.example.com"), sub)
        }),
        "[a-z0-9]{32}".prop_map(SubjectIdentifier::opaque),
        "\\+[1-9][0-9]{7,13}".prop_map(SubjectIdentifier::phone_number),
        "[a-z]{3,10}".prop_map(|name| SubjectIdentifier::account(format!("acct:{name}@example.com"))),
        "[a-z0-9]{8,16}".prop_map(|id| SubjectIdentifier::did(format!("did:example:{id}"))),
    ]
}

/// Generate simple or complex event subjects.
pub fn event_subject_strategy() -> impl Strategy<Value = EventSubject> {
    prop_oneof![
        subject_identifier_strategy().prop_map(EventSubject::from),
        (subject_identifier_strategy(), subject_identifier_strategy()).prop_map(|(user, device)| {
            EventSubject::from(ComplexSubject::new().user(user).device(device))
        }),
    ]
}

/// Generate a one-to-three event map about arbitrary subjects.
pub fn security_event_strategy() -> impl Strategy<Value = SecurityEvent> {
    prop::collection::vec((event_type_strategy(), event_subject_strategy()), 1..=3).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(event_type, subject)| {
                    let data = EventData::about(subject).with_options(&EventOptions::default());
                    (event_type.uri().to_string(), data)
                })
                .collect()
        },
    )
}

/// Generate custom claims whose names never collide with reserved SET claims.
pub fn custom_claims_strategy() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::vec(
        (
            "x_[a-z]{1,10}",
            prop_oneof![
                "[a-zA-Z0-9 ]{0,20}".prop_map(Value::from),
                any::<i32>().prop_map(Value::from),
                any::<bool>().prop_map(Value::from),
            ],
        ),
        0..4,
    )
}

/// Generate `iat` values between 2001 and 2100.
pub fn issued_at_strategy() -> impl Strategy<Value = i64> {
    1_000_000_000i64..4_102_444_800
}
