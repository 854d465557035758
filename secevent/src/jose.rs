//! Default signer and verifier backed by `jsonwebtoken`.

use crate::crypto::{BoxFuture, SetHeader, SetSigner, SetVerifier, VerificationConstraints};
use crate::error::{SecEventError, SecEventResult};
use crate::keys::{KeyMaterial, SigningKey};
use crate::payload::SecEventPayload;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::{Map, Value};
use std::str::FromStr;

/// JWS signing and verification through `jsonwebtoken`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoseCrypto;

impl JoseCrypto {
    fn sign_now(
        payload: &SecEventPayload,
        key: &SigningKey,
        header: &SetHeader,
    ) -> SecEventResult<String> {
        let mut jwt_header = Header::new(parse_algorithm(&header.alg)?);
        jwt_header.typ.clone_from(&header.typ);
        jwt_header.kid.clone_from(&header.kid);

        let encoding_key = encoding_key(&key.key)?;
        encode(&jwt_header, payload, &encoding_key).map_err(|e| SecEventError::signing(describe(&e)))
    }

    fn verify_now(
        token: &str,
        key: &SigningKey,
        constraints: &VerificationConstraints,
    ) -> SecEventResult<Map<String, Value>> {
        let decoding_key = decoding_key(&key.key)?;
        let validation = validation_for(parse_algorithm(&key.alg)?, constraints);

        let token_data = decode::<Map<String, Value>>(token, &decoding_key, &validation)
            .map_err(|e| SecEventError::verification(describe(&e)))?;

        check_time_claims(&token_data.claims, constraints)?;
        Ok(token_data.claims)
    }
}

impl SetSigner for JoseCrypto {
    fn sign<'a>(
        &'a self,
        payload: &'a SecEventPayload,
        key: &'a SigningKey,
        header: &'a SetHeader,
    ) -> BoxFuture<'a, SecEventResult<String>> {
        Box::pin(async move { Self::sign_now(payload, key, header) })
    }
}

impl SetVerifier for JoseCrypto {
    fn verify<'a>(
        &'a self,
        token: &'a str,
        key: &'a SigningKey,
        constraints: &'a VerificationConstraints,
    ) -> BoxFuture<'a, SecEventResult<Map<String, Value>>> {
        Box::pin(async move { Self::verify_now(token, key, constraints) })
    }
}

/// Parse a JWA algorithm name.
///
/// # Errors
///
/// Returns [`SecEventError::UnsupportedAlgorithm`] for names `jsonwebtoken`
/// does not implement.
pub fn parse_algorithm(alg: &str) -> SecEventResult<Algorithm> {
    Algorithm::from_str(alg).map_err(|_| SecEventError::UnsupportedAlgorithm(alg.to_string()))
}

fn encoding_key(material: &KeyMaterial) -> SecEventResult<EncodingKey> {
    match material {
        KeyMaterial::Secret(secret) => Ok(EncodingKey::from_secret(secret.as_slice())),
        KeyMaterial::RsaPem(pem) => EncodingKey::from_rsa_pem(pem.as_slice()).map_err(invalid_key),
        KeyMaterial::EcPem(pem) => EncodingKey::from_ec_pem(pem.as_slice()).map_err(invalid_key),
        KeyMaterial::EdPem(pem) => EncodingKey::from_ed_pem(pem.as_slice()).map_err(invalid_key),
        other => Err(SecEventError::InvalidKey(format!(
            "{} keys can only verify",
            other.kind()
        ))),
    }
}

fn decoding_key(material: &KeyMaterial) -> SecEventResult<DecodingKey> {
    match material {
        KeyMaterial::Secret(secret) => Ok(DecodingKey::from_secret(secret.as_slice())),
        KeyMaterial::RsaPem(pem) => DecodingKey::from_rsa_pem(pem.as_slice()).map_err(invalid_key),
        KeyMaterial::EcPem(pem) => DecodingKey::from_ec_pem(pem.as_slice()).map_err(invalid_key),
        KeyMaterial::EdPem(pem) => DecodingKey::from_ed_pem(pem.as_slice()).map_err(invalid_key),
        KeyMaterial::RsaComponents { n, e } => {
            DecodingKey::from_rsa_components(n, e).map_err(invalid_key)
        }
        KeyMaterial::EcComponents { x, y } => {
            DecodingKey::from_ec_components(x, y).map_err(invalid_key)
        }
        KeyMaterial::EdComponents { x } => DecodingKey::from_ed_components(x).map_err(invalid_key),
    }
}

fn invalid_key(err: JwtError) -> SecEventError {
    SecEventError::InvalidKey(describe(&err))
}

/// SETs carry no `exp` by default, so no registered claim is required unless
/// an issuer or audience is constrained. Time claims are checked separately
/// so that the current-time override applies.
fn validation_for(alg: Algorithm, constraints: &VerificationConstraints) -> Validation {
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.leeway = constraints.clock_tolerance;

    let mut required = Vec::new();
    if let Some(issuers) = &constraints.issuers {
        validation.set_issuer(issuers);
        required.push("iss");
    }
    match &constraints.audiences {
        Some(audiences) => {
            validation.set_audience(audiences);
            required.push("aud");
        }
        None => validation.validate_aud = false,
    }
    validation.set_required_spec_claims(&required);
    validation
}

fn check_time_claims(
    claims: &Map<String, Value>,
    constraints: &VerificationConstraints,
) -> SecEventResult<()> {
    let now = constraints
        .current_time
        .unwrap_or_else(|| chrono::Utc::now().timestamp());
    let tolerance = i64::try_from(constraints.clock_tolerance).unwrap_or(i64::MAX);

    if let Some(exp) = numeric_claim(claims, "exp")? {
        if now.saturating_sub(tolerance) >= exp {
            return Err(SecEventError::verification(
                "token has expired (\"exp\" claim timestamp check failed)",
            ));
        }
    }
    if let Some(nbf) = numeric_claim(claims, "nbf")? {
        if now.saturating_add(tolerance) < nbf {
            return Err(SecEventError::verification(
                "token is not yet valid (\"nbf\" claim timestamp check failed)",
            ));
        }
    }
    if let Some(max_age) = constraints.max_token_age {
        let iat = numeric_claim(claims, "iat")?.ok_or_else(|| {
            SecEventError::verification("\"iat\" claim is required when a maximum token age is set")
        })?;
        if iat > now.saturating_add(tolerance) {
            return Err(SecEventError::verification(
                "\"iat\" claim timestamp check failed (it should be in the past)",
            ));
        }
        let max_age = i64::try_from(max_age).unwrap_or(i64::MAX);
        if now.saturating_sub(iat).saturating_sub(tolerance) > max_age {
            return Err(SecEventError::verification(
                "\"iat\" claim timestamp check failed (too far in the past)",
            ));
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn numeric_claim(claims: &Map<String, Value>, name: &str) -> SecEventResult<Option<i64>> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
            .map(Some)
            .ok_or_else(|| SecEventError::verification(format!("\"{name}\" claim must be a number"))),
    }
}

/// Stable messages for `jsonwebtoken` failures; key bytes never appear.
fn describe(err: &JwtError) -> String {
    match err.kind() {
        ErrorKind::InvalidSignature => "signature verification failed".to_string(),
        ErrorKind::InvalidIssuer => "unexpected \"iss\" claim value".to_string(),
        ErrorKind::InvalidAudience => "unexpected \"aud\" claim value".to_string(),
        ErrorKind::InvalidAlgorithm => "token algorithm does not match the key".to_string(),
        ErrorKind::InvalidAlgorithmName => "unknown algorithm".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("missing required \"{claim}\" claim"),
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            "malformed token".to_string()
        }
        ErrorKind::InvalidKeyFormat | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) => {
            "key material is not usable for this algorithm".to_string()
        }
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventOptions, SecurityEvent};
    use crate::subject::SubjectIdentifier;

    fn payload(iat: i64) -> SecEventPayload {
        SecEventPayload {
            iss: "https://issuer.example.com".to_string(),
            jti: "jti-1".to_string(),
            iat,
            events: SecurityEvent::session_revoked(
                SubjectIdentifier::email("user@example.com"),
                &EventOptions::default(),
            ),
            aud: Some("https://receiver.example.com".into()),
            txn: None,
            claims: Map::new(),
        }
    }

    fn key() -> SigningKey {
        SigningKey::hmac("HS256", b"jose-test-secret-0123456789abcdef".to_vec()).with_kid("k1")
    }

    async fn signed(iat: i64) -> String {
        signed_with(iat, &[]).await
    }

    async fn signed_with(iat: i64, extra: &[(&str, i64)]) -> String {
        let key = key();
        let mut payload = payload(iat);
        for (name, value) in extra {
            payload.claims.insert((*name).to_string(), Value::from(*value));
        }
        JoseCrypto
            .sign(&payload, &key, &SetHeader::for_key(&key))
            .await
            .unwrap()
    }

    fn at(now: i64, tolerance: u64) -> VerificationConstraints {
        VerificationConstraints {
            current_time: Some(now),
            clock_tolerance: tolerance,
            ..VerificationConstraints::default()
        }
    }

    #[tokio::test]
    async fn test_sign_and_verify() {
        let token = signed(1_700_000_000).await;
        let claims = JoseCrypto
            .verify(&token, &key(), &VerificationConstraints::default())
            .await
            .unwrap();
        assert_eq!(claims["jti"], "jti-1");
    }

    #[tokio::test]
    async fn test_wrong_secret_is_signature_failure() {
        let token = signed(1_700_000_000).await;
        let wrong = SigningKey::hmac("HS256", b"another-secret".to_vec());
        let err = JoseCrypto
            .verify(&token, &wrong, &VerificationConstraints::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "SET verification failed: signature verification failed");
    }

    #[tokio::test]
    async fn test_issuer_and_audience_constraints() {
        let token = signed(1_700_000_000).await;

        let ok = VerificationConstraints {
            issuers: Some(vec!["https://other.example.com".into(), "https://issuer.example.com".into()]),
            audiences: Some(vec!["https://receiver.example.com".into()]),
            ..VerificationConstraints::default()
        };
        assert!(JoseCrypto.verify(&token, &key(), &ok).await.is_ok());

        let wrong_issuer = VerificationConstraints {
            issuers: Some(vec!["https://other.example.com".into()]),
            ..VerificationConstraints::default()
        };
        let err = JoseCrypto.verify(&token, &key(), &wrong_issuer).await.unwrap_err();
        assert!(err.to_string().contains("\"iss\""));

        let wrong_audience = VerificationConstraints {
            audiences: Some(vec!["https://elsewhere.example.com".into()]),
            ..VerificationConstraints::default()
        };
        let err = JoseCrypto.verify(&token, &key(), &wrong_audience).await.unwrap_err();
        assert!(err.to_string().contains("\"aud\""));
    }

    #[tokio::test]
    async fn test_max_token_age_uses_current_time_override() {
        let token = signed(1_700_000_000).await;
        let fresh = VerificationConstraints {
            max_token_age: Some(60),
            current_time: Some(1_700_000_030),
            ..VerificationConstraints::default()
        };
        assert!(JoseCrypto.verify(&token, &key(), &fresh).await.is_ok());

        let stale = VerificationConstraints {
            max_token_age: Some(60),
            current_time: Some(1_700_000_120),
            ..VerificationConstraints::default()
        };
        let err = JoseCrypto.verify(&token, &key(), &stale).await.unwrap_err();
        assert!(err.to_string().contains("too far in the past"));

        let tolerated = VerificationConstraints {
            clock_tolerance: 90,
            ..stale
        };
        assert!(JoseCrypto.verify(&token, &key(), &tolerated).await.is_ok());
    }

    #[tokio::test]
    async fn test_future_iat_rejected_under_max_age() {
        let token = signed(1_700_000_000).await;
        let constraints = VerificationConstraints {
            max_token_age: Some(300),
            current_time: Some(1_699_999_000),
            ..VerificationConstraints::default()
        };
        let err = JoseCrypto.verify(&token, &key(), &constraints).await.unwrap_err();
        assert!(err.to_string().contains("in the past"));
    }

    #[tokio::test]
    async fn test_exp_boundary() {
        let exp = 1_700_000_600;
        let token = signed_with(1_700_000_000, &[("exp", exp)]).await;

        assert!(JoseCrypto.verify(&token, &key(), &at(exp - 1, 0)).await.is_ok());
        let err = JoseCrypto.verify(&token, &key(), &at(exp, 0)).await.unwrap_err();
        assert!(err.to_string().contains("expired"), "{err}");

        assert!(JoseCrypto.verify(&token, &key(), &at(exp + 29, 30)).await.is_ok());
        let err = JoseCrypto.verify(&token, &key(), &at(exp + 30, 30)).await.unwrap_err();
        assert!(err.to_string().contains("\"exp\""), "{err}");
    }

    #[tokio::test]
    async fn test_nbf_boundary() {
        let nbf = 1_700_000_600;
        let token = signed_with(1_700_000_000, &[("nbf", nbf)]).await;

        assert!(JoseCrypto.verify(&token, &key(), &at(nbf, 0)).await.is_ok());
        let err = JoseCrypto.verify(&token, &key(), &at(nbf - 1, 0)).await.unwrap_err();
        assert!(err.to_string().contains("not yet valid"), "{err}");

        assert!(JoseCrypto.verify(&token, &key(), &at(nbf - 30, 30)).await.is_ok());
        let err = JoseCrypto.verify(&token, &key(), &at(nbf - 31, 30)).await.unwrap_err();
        assert!(err.to_string().contains("\"nbf\""), "{err}");
    }

    #[tokio::test]
    async fn test_non_numeric_exp_rejected() {
        let key = key();
        let mut payload = payload(1_700_000_000);
        payload.claims.insert("exp".to_string(), Value::from("tomorrow"));
        let token = JoseCrypto
            .sign(&payload, &key, &SetHeader::for_key(&key))
            .await
            .unwrap();
        let err = JoseCrypto.verify(&token, &key, &at(1_700_000_000, 0)).await.unwrap_err();
        assert!(err.to_string().contains("must be a number"), "{err}");
    }

    #[tokio::test]
    async fn test_unknown_algorithm() {
        let bad = SigningKey::hmac("XS999", b"secret".to_vec());
        let err = JoseCrypto
            .sign(&payload(1), &bad, &SetHeader::for_key(&bad))
            .await
            .unwrap_err();
        assert!(matches!(err, SecEventError::UnsupportedAlgorithm(_)));
    }

    #[tokio::test]
    async fn test_component_keys_cannot_sign() {
        let verify_only = SigningKey::new(
            "ES256",
            KeyMaterial::EcComponents {
                x: "x".to_string(),
                y: "y".to_string(),
            },
        );
        let err = JoseCrypto
            .sign(&payload(1), &verify_only, &SetHeader::for_key(&verify_only))
            .await
            .unwrap_err();
        assert!(matches!(err, SecEventError::InvalidKey(_)));
    }
}
