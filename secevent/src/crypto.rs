//! Contracts for the cryptographic collaborators.
//!
//! The builder and parser never touch key material directly; they call a
//! [`SetSigner`], a [`SetVerifier`] and, for remote key sets, a
//! [`KeySetResolver`]. The traits return boxed futures so implementations can
//! be held as `Arc<dyn ...>`.

use crate::error::SecEventResult;
use crate::jwks::KeySet;
use crate::keys::SigningKey;
use crate::payload::SecEventPayload;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// `typ` header value identifying a Security Event Token.
pub const SET_TYPE: &str = "secevent+jwt";

/// Boxed, sendable future returned by collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Protected header of a SET.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHeader {
    /// Algorithm
    pub alg: String,
    /// Token type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl SetHeader {
    /// Header for signing with `key`.
    #[must_use]
    pub fn for_key(key: &SigningKey) -> Self {
        Self {
            alg: key.alg.clone(),
            typ: Some(SET_TYPE.to_string()),
            kid: key.kid.clone(),
        }
    }

    /// Whether `typ` marks the token as a SET.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.typ.as_deref().is_some_and(|t| {
            t.eq_ignore_ascii_case(SET_TYPE) || t.eq_ignore_ascii_case("application/secevent+jwt")
        })
    }
}

/// Checks a verifier applies in addition to the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationConstraints {
    /// Accepted issuers; any one must match
    pub issuers: Option<Vec<String>>,
    /// Accepted audiences; the token must name at least one
    pub audiences: Option<Vec<String>>,
    /// Allowed clock skew in seconds
    pub clock_tolerance: u64,
    /// Evaluate time-based claims at this instant instead of now
    pub current_time: Option<i64>,
    /// Reject tokens whose `iat` is older than this many seconds
    pub max_token_age: Option<u64>,
}

/// Produces compact-serialized tokens.
pub trait SetSigner: Send + Sync {
    /// Sign `payload` with `key` under `header`.
    fn sign<'a>(
        &'a self,
        payload: &'a SecEventPayload,
        key: &'a SigningKey,
        header: &'a SetHeader,
    ) -> BoxFuture<'a, SecEventResult<String>>;
}

/// Verifies compact-serialized tokens.
pub trait SetVerifier: Send + Sync {
    /// Verify `token` with `key`, returning its claim set.
    fn verify<'a>(
        &'a self,
        token: &'a str,
        key: &'a SigningKey,
        constraints: &'a VerificationConstraints,
    ) -> BoxFuture<'a, SecEventResult<Map<String, Value>>>;
}

/// Fetches remote key sets.
pub trait KeySetResolver: Send + Sync {
    /// Key set published at `url`.
    fn resolve<'a>(&'a self, url: &'a str) -> BoxFuture<'a, SecEventResult<Arc<KeySet>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_for_key() {
        let key = SigningKey::hmac("HS256", b"secret".to_vec()).with_kid("k1");
        let header = SetHeader::for_key(&key);
        assert_eq!(header.alg, "HS256");
        assert_eq!(header.typ.as_deref(), Some(SET_TYPE));
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert!(header.is_set());
    }

    #[test]
    fn test_header_without_kid_omits_member() {
        let header = SetHeader::for_key(&SigningKey::hmac("HS256", b"secret".to_vec()));
        let value = serde_json::to_value(&header).unwrap();
        assert!(value.get("kid").is_none());
    }
}
