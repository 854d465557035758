//! End-to-end signing and verification tests.

use auth_secevent::*;
use serde_json::json;
use std::sync::Arc;
use test_utils::fixtures::{AUDIENCE, ISSUER, hmac_key, hmac_key_with_kid, session_revoked_event};
use test_utils::init_test_tracing;
use test_utils::mocks::{CountingResolver, RecordingVerifier};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_PATH: &str = "/.well-known/jwks.json";

async fn sign_scenario(key: &SigningKey) -> SignedSet {
    let mut builder = SecEventBuilder::new();
    builder
        .with_issuer(ISSUER)
        .with_audience(AUDIENCE)
        .with_event(session_revoked_event());
    builder.sign(Some(key)).await.unwrap()
}

#[tokio::test]
async fn test_scenario_issuer_and_audience() {
    init_test_tracing();
    let key = hmac_key("scenario-secret");
    let signed = sign_scenario(&key).await;
    let parser = SecEventParser::new();

    let expected = ValidationOptions::new()
        .with_issuer(ISSUER)
        .with_audience(AUDIENCE);
    let result = parser.verify(&signed.token, &key, Some(&expected)).await;
    assert!(result.valid, "{:?}", result.error);
    let payload = result.payload.unwrap();
    assert_eq!(payload, signed.payload);
    assert!(payload.contains_event_type(event::caep::SESSION_REVOKED));

    let other_issuer = ValidationOptions::new().with_issuer("https://other.com");
    let result = parser.verify(&signed.token, &key, Some(&other_issuer)).await;
    assert!(!result.valid);
    assert!(result.error.unwrap().contains("iss"));
}

#[tokio::test]
async fn test_wrong_key_is_rejected() {
    let signed = sign_scenario(&hmac_key("right")).await;
    let result = SecEventParser::new()
        .verify(&signed.token, &hmac_key("wrong"), None)
        .await;

    assert!(!result.valid);
    assert!(result.payload.is_none());
    assert!(!result.error.unwrap().is_empty());
}

#[tokio::test]
async fn test_candidates_tried_in_order_until_match() {
    let correct = hmac_key_with_kid("correct", "correct-secret");
    let signed = sign_scenario(&correct).await;
    let keys = [
        hmac_key_with_kid("wrong-1", "first"),
        hmac_key_with_kid("wrong-2", "second"),
        correct.clone(),
        hmac_key_with_kid("never-tried", "fourth"),
    ];

    let verifier = Arc::new(RecordingVerifier::new());
    let parser = SecEventParser::with_config(
        ParserConfig::default().with_verifier(Arc::clone(&verifier) as Arc<dyn SetVerifier>),
    )
    .unwrap();

    let result = parser.verify(&signed.token, &keys, None).await;
    let alone = parser.verify(&signed.token, &correct, None).await;
    assert!(result.valid);
    assert_eq!(result, alone);

    let tried: Vec<_> = verifier.attempts().into_iter().flatten().collect();
    assert_eq!(tried, vec!["wrong-1", "wrong-2", "correct", "correct"]);
}

#[tokio::test]
async fn test_exhausted_candidates_report_signature_failure() {
    let signed = sign_scenario(&hmac_key("correct-secret")).await;
    let keys = vec![hmac_key("first"), hmac_key("second")];

    let result = SecEventParser::new().verify(&signed.token, &keys, None).await;
    assert!(!result.valid);
    let error = result.error.unwrap();
    assert!(error.contains("signature"), "{error}");
    assert!(!error.contains("Missing"));
}

#[tokio::test]
async fn test_required_claim_missing() {
    let key = hmac_key("secret");
    let signed = sign_scenario(&key).await;
    let options = ValidationOptions::new().with_required_claims(["txn"]);

    let result = SecEventParser::new()
        .verify(&signed.token, &key, Some(&options))
        .await;
    assert!(!result.valid);
    assert!(result.errors.contains(&"Missing required claim: txn".to_string()));
}

#[tokio::test]
async fn test_required_claim_present() {
    let key = hmac_key("secret");
    let mut builder = SecEventBuilder::new();
    builder
        .with_issuer(ISSUER)
        .with_txn("txn-42")
        .with_event(session_revoked_event());
    let signed = builder.sign(Some(&key)).await.unwrap();
    let options = ValidationOptions::new().with_required_claims(["txn"]);

    let result = SecEventParser::new()
        .verify(&signed.token, &key, Some(&options))
        .await;
    assert!(result.valid, "{:?}", result.error);
    assert_eq!(result.payload.unwrap().txn.as_deref(), Some("txn-42"));
}

#[tokio::test]
async fn test_event_key_must_be_http_uri() {
    let key = hmac_key("secret");
    let mut builder = SecEventBuilder::new();
    builder
        .with_issuer(ISSUER)
        .with_event_data("not-a-url", EventData::new().with_field("note", "custom"));
    let signed = builder.sign(Some(&key)).await.unwrap();

    let result = SecEventParser::new().verify(&signed.token, &key, None).await;
    assert!(!result.valid);
    assert_eq!(result.errors, vec!["Invalid event URI format: not-a-url".to_string()]);
}

#[tokio::test]
async fn test_top_level_sub_is_tolerated() {
    let key = hmac_key("secret");
    let mut builder = SecEventBuilder::new();
    builder
        .with_issuer(ISSUER)
        .with_claim("sub", "legacy-subject")
        .with_event(session_revoked_event());
    let signed = builder.sign(Some(&key)).await.unwrap();

    let result = SecEventParser::new().verify(&signed.token, &key, None).await;
    assert!(result.valid, "{:?}", result.error);
    assert_eq!(result.payload.unwrap().claim("sub"), Some(&json!("legacy-subject")));
}

#[tokio::test]
async fn test_no_verification_method() {
    let signed = sign_scenario(&hmac_key("secret")).await;
    let result = SecEventParser::new()
        .verify(&signed.token, VerificationKeys::Configured, None)
        .await;

    assert!(!result.valid);
    assert!(result.error.unwrap().contains("No verification method"));
}

#[tokio::test]
async fn test_max_token_age() {
    let key = hmac_key("secret");
    let mut builder = SecEventBuilder::new();
    builder
        .with_issuer(ISSUER)
        .with_issued_at(1_700_000_000)
        .with_event(session_revoked_event());
    let signed = builder.sign(Some(&key)).await.unwrap();
    let parser = SecEventParser::new();

    let fresh = ValidationOptions::new()
        .with_max_token_age(300)
        .with_current_time(1_700_000_100);
    assert!(parser.verify(&signed.token, &key, Some(&fresh)).await.valid);

    let stale = fresh.clone().with_current_time(1_700_001_000);
    let result = parser.verify(&signed.token, &key, Some(&stale)).await;
    assert!(!result.valid);
    assert!(result.error.unwrap().contains("iat"));
}

#[tokio::test]
async fn test_remote_key_set_over_http() {
    init_test_tracing();
    let secret = b"remote-jwks-secret";
    let key = SigningKey::hmac("HS256", secret.to_vec()).with_kid("remote");
    let signed = sign_scenario(&key).await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{
                "kty": "oct",
                "kid": "remote",
                "alg": "HS256",
                "k": "cmVtb3RlLWp3a3Mtc2VjcmV0"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let parser = SecEventParser::with_config(
        ParserConfig::default().with_jwks_url(format!("{}{JWKS_PATH}", server.uri())),
    )
    .unwrap();

    for _ in 0..2 {
        let result = parser
            .verify(&signed.token, VerificationKeys::Configured, None)
            .await;
        assert!(result.valid, "{:?}", result.error);
    }
}

#[tokio::test]
async fn test_configured_keys_take_priority_over_remote() {
    let key = hmac_key_with_kid("local", "local-secret");
    let signed = sign_scenario(&key).await;
    let resolver = Arc::new(CountingResolver::new(KeySet::default()));

    let parser = SecEventParser::with_config(
        ParserConfig::default()
            .with_key(key)
            .with_jwks_url("https://issuer.example.com/jwks")
            .with_resolver(Arc::clone(&resolver) as Arc<dyn KeySetResolver>),
    )
    .unwrap();

    let result = parser
        .verify(&signed.token, VerificationKeys::Configured, None)
        .await;
    assert!(result.valid);
    assert_eq!(resolver.calls(), 0);
}

#[tokio::test]
async fn test_decode_does_not_check_signature() {
    let signed = sign_scenario(&hmac_key("any")).await;
    let payload = decode(&signed.token).unwrap();
    assert_eq!(payload.iss, ISSUER);
    assert_eq!(payload.aud, Some(Audience::from(AUDIENCE)));

    let header = decode_header(&signed.token).unwrap();
    assert_eq!(header.typ.as_deref(), Some(SET_TYPE));
}

#[tokio::test]
async fn test_unmodelled_subject_formats_verify() {
    let key = hmac_key("secret");
    let jwt_id = json!({"format": "jwt_id", "iss": "https://idp.example.com", "jti": "t-1"});
    let ip_addresses = json!({"format": "ip_addresses", "ip_addresses": ["192.0.2.7"]});

    let mut builder = SecEventBuilder::new();
    builder
        .with_issuer(ISSUER)
        .with_event_data(
            event::caep::SESSION_REVOKED,
            EventData::new().with_subject(EventSubject::Other(jwt_id)),
        )
        .with_event_data(
            event::caep::TOKEN_CLAIMS_CHANGE,
            EventData::new().with_field("subject", ip_addresses),
        );
    let signed = builder.sign(Some(&key)).await.unwrap();

    let result = SecEventParser::new().verify(&signed.token, &key, None).await;
    assert!(result.valid, "{:?}", result.error);
    let payload = result.payload.unwrap();

    assert_eq!(
        payload.event(event::caep::SESSION_REVOKED),
        signed.payload.event(event::caep::SESSION_REVOKED)
    );
    let subject = payload
        .event(event::caep::TOKEN_CLAIMS_CHANGE)
        .and_then(|data| data.subject.as_ref())
        .unwrap();
    assert_eq!(subject.format(), Some("ip_addresses"));

    let decoded = decode(&signed.token).unwrap();
    assert_eq!(decoded.event_types(), payload.event_types());
}

#[tokio::test]
async fn test_exp_and_nbf_against_current_time() {
    let key = hmac_key("secret");
    let mut builder = SecEventBuilder::new();
    builder
        .with_issuer(ISSUER)
        .with_issued_at(1_700_000_000)
        .with_claim("nbf", 1_700_000_000)
        .with_claim("exp", 1_700_000_600)
        .with_event(session_revoked_event());
    let signed = builder.sign(Some(&key)).await.unwrap();
    let parser = SecEventParser::new();
    let at = |now| ValidationOptions::new().with_current_time(now);

    assert!(parser.verify(&signed.token, &key, Some(&at(1_700_000_300))).await.valid);

    let expired = parser.verify(&signed.token, &key, Some(&at(1_700_000_600))).await;
    assert!(!expired.valid);
    assert!(expired.error.unwrap().contains("expired"));

    let early = parser.verify(&signed.token, &key, Some(&at(1_699_999_990))).await;
    assert!(!early.valid);
    assert!(early.error.unwrap().contains("not yet valid"));

    let tolerated = at(1_699_999_990).with_clock_tolerance(10);
    assert!(parser.verify(&signed.token, &key, Some(&tolerated)).await.valid);
}
