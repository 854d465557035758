//! Test fixtures with sample data.

use auth_secevent::{EventOptions, SecurityEvent, SigningKey, SubjectIdentifier};

/// Issuer used across integration tests.
pub const ISSUER: &str = "https://example.com";

/// Audience used across integration tests.
pub const AUDIENCE: &str = "https://app.example.com";

/// Subject email used across integration tests.
pub const SUBJECT_EMAIL: &str = "user@example.com";

/// HS256 key from a test secret.
#[must_use]
pub fn hmac_key(secret: &str) -> SigningKey {
    SigningKey::hmac("HS256", secret.as_bytes().to_vec())
}

/// HS256 key with a key identifier.
#[must_use]
pub fn hmac_key_with_kid(kid: &str, secret: &str) -> SigningKey {
    hmac_key(secret).with_kid(kid)
}

/// Session-revoked event for [`SUBJECT_EMAIL`].
#[must_use]
pub fn session_revoked_event() -> SecurityEvent {
    SecurityEvent::session_revoked(
        SubjectIdentifier::email(SUBJECT_EMAIL),
        &EventOptions::default().at(1_700_000_000),
    )
}
