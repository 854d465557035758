//! SET decoding and verification.
//!
//! [`decode`] trusts the token and only reads it; it fails fast.
//! [`SecEventParser::verify`] decides whether the token can be trusted and
//! always answers with a [`ValidationResult`].

use crate::crypto::{KeySetResolver, SetHeader, SetVerifier, VerificationConstraints};
use crate::error::{SecEventError, SecEventResult};
use crate::event::{EventData, SecurityEvent};
use crate::jose::JoseCrypto;
use crate::jwks::{HttpJwksResolver, JwksResolverConfig};
use crate::keys::{KeyRegistry, SigningKey};
use crate::payload::{Audience, SecEventPayload, validate_structure};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Per-call or per-parser verification requirements.
///
/// Every field is optional; [`merge`](Self::merge) combines a parser's
/// defaults with call-site options field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Accepted issuers (a string or a list in configuration)
    #[serde(deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Vec<String>>,
    /// Accepted audiences (a string or a list in configuration)
    #[serde(deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<String>>,
    /// Allowed clock skew, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock_tolerance: Option<u64>,
    /// Evaluate time-based claims at this instant (seconds since the epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<i64>,
    /// Claims that must be present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_claims: Option<Vec<String>>,
    /// Maximum age of `iat`, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_token_age: Option<u64>,
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    Ok(Option::<Audience>::deserialize(deserializer)?.map(|values| values.to_vec()))
}

impl ValidationOptions {
    /// No requirements.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the given issuer(s).
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<Audience>) -> Self {
        self.issuer = Some(issuer.into().to_vec());
        self
    }

    /// Accept the given audience(s).
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<Audience>) -> Self {
        self.audience = Some(audience.into().to_vec());
        self
    }

    /// Allow `seconds` of clock skew.
    #[must_use]
    pub const fn with_clock_tolerance(mut self, seconds: u64) -> Self {
        self.clock_tolerance = Some(seconds);
        self
    }

    /// Evaluate time-based claims at `timestamp`.
    #[must_use]
    pub const fn with_current_time(mut self, timestamp: i64) -> Self {
        self.current_time = Some(timestamp);
        self
    }

    /// Require the named claims.
    #[must_use]
    pub fn with_required_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_claims = Some(claims.into_iter().map(Into::into).collect());
        self
    }

    /// Reject tokens issued more than `seconds` ago.
    #[must_use]
    pub const fn with_max_token_age(mut self, seconds: u64) -> Self {
        self.max_token_age = Some(seconds);
        self
    }

    /// Combine with `overrides`; fields set there win.
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        Self {
            issuer: overrides.issuer.clone().or_else(|| self.issuer.clone()),
            audience: overrides.audience.clone().or_else(|| self.audience.clone()),
            clock_tolerance: overrides.clock_tolerance.or(self.clock_tolerance),
            current_time: overrides.current_time.or(self.current_time),
            required_claims: overrides
                .required_claims
                .clone()
                .or_else(|| self.required_claims.clone()),
            max_token_age: overrides.max_token_age.or(self.max_token_age),
        }
    }

    /// Constraints handed to the verifier.
    #[must_use]
    pub fn constraints(&self) -> VerificationConstraints {
        VerificationConstraints {
            issuers: self.issuer.clone(),
            audiences: self.audience.clone(),
            clock_tolerance: self.clock_tolerance.unwrap_or(0),
            current_time: self.current_time,
            max_token_age: self.max_token_age,
        }
    }
}

/// Outcome of [`SecEventParser::verify`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Whether the token is trusted and well-formed
    pub valid: bool,
    /// The verified payload, when valid
    pub payload: Option<SecEventPayload>,
    /// Summary of every problem, joined with `"; "`
    pub error: Option<String>,
    /// Each problem found
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// A trusted payload.
    #[must_use]
    pub const fn valid(payload: SecEventPayload) -> Self {
        Self {
            valid: true,
            payload: Some(payload),
            error: None,
            errors: Vec::new(),
        }
    }

    /// A single failure.
    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self::from_errors(vec![error.into()])
    }

    /// Every accumulated failure.
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            payload: None,
            error: Some(errors.join("; ")),
            errors,
        }
    }
}

impl From<SecEventError> for ValidationResult {
    fn from(err: SecEventError) -> Self {
        Self::invalid(err.to_string())
    }
}

/// Where [`SecEventParser::verify`] gets its keys.
#[derive(Debug, Clone, Copy, Default)]
pub enum VerificationKeys<'a> {
    /// The parser's configured keys, then its remote key set
    #[default]
    Configured,
    /// One explicit key
    Single(&'a SigningKey),
    /// Explicit keys, tried strictly in order
    Candidates(&'a [SigningKey]),
}

impl<'a> From<&'a SigningKey> for VerificationKeys<'a> {
    fn from(key: &'a SigningKey) -> Self {
        Self::Single(key)
    }
}

impl<'a> From<&'a [SigningKey]> for VerificationKeys<'a> {
    fn from(keys: &'a [SigningKey]) -> Self {
        Self::Candidates(keys)
    }
}

impl<'a> From<&'a Vec<SigningKey>> for VerificationKeys<'a> {
    fn from(keys: &'a Vec<SigningKey>) -> Self {
        Self::Candidates(keys)
    }
}

impl<'a, const N: usize> From<&'a [SigningKey; N]> for VerificationKeys<'a> {
    fn from(keys: &'a [SigningKey; N]) -> Self {
        Self::Candidates(keys)
    }
}

impl<'a> From<Option<&'a SigningKey>> for VerificationKeys<'a> {
    fn from(key: Option<&'a SigningKey>) -> Self {
        key.map_or(Self::Configured, Self::Single)
    }
}

/// Parser configuration.
#[derive(Clone)]
pub struct ParserConfig {
    /// Keys tried, in order, when no key is passed to `verify`
    pub verification_keys: Vec<SigningKey>,
    /// Key set consulted when there are no configured keys
    pub jwks_url: Option<String>,
    /// Resolver for `jwks_url`; an HTTP resolver is created when unset
    pub resolver: Option<Arc<dyn KeySetResolver>>,
    /// Settings for the HTTP resolver created for `jwks_url`
    pub jwks: JwksResolverConfig,
    /// Token verifier
    pub verifier: Arc<dyn SetVerifier>,
    /// Options applied to every `verify` call
    pub default_options: ValidationOptions,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            verification_keys: Vec::new(),
            jwks_url: None,
            resolver: None,
            jwks: JwksResolverConfig::default(),
            verifier: Arc::new(JoseCrypto),
            default_options: ValidationOptions::default(),
        }
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("verification_keys", &self.verification_keys)
            .field("jwks_url", &self.jwks_url)
            .field("jwks", &self.jwks)
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

impl ParserConfig {
    /// Add a configured verification key.
    #[must_use]
    pub fn with_key(mut self, key: SigningKey) -> Self {
        self.verification_keys.push(key);
        self
    }

    /// Replace the configured verification keys.
    #[must_use]
    pub fn with_keys(mut self, keys: impl IntoIterator<Item = SigningKey>) -> Self {
        self.verification_keys = keys.into_iter().collect();
        self
    }

    /// Fetch keys from a remote key set.
    #[must_use]
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    /// Resolve `jwks_url` through `resolver`.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn KeySetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use a specific verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn SetVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Set the options applied to every call.
    #[must_use]
    pub fn with_default_options(mut self, options: ValidationOptions) -> Self {
        self.default_options = options;
        self
    }
}

struct RemoteKeys {
    url: String,
    resolver: Arc<dyn KeySetResolver>,
}

/// Decodes and verifies SETs.
pub struct SecEventParser {
    verification_keys: Vec<SigningKey>,
    remote: Option<RemoteKeys>,
    verifier: Arc<dyn SetVerifier>,
    default_options: ValidationOptions,
}

impl fmt::Debug for SecEventParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecEventParser")
            .field("verification_keys", &self.verification_keys)
            .field("jwks_url", &self.remote.as_ref().map(|r| r.url.as_str()))
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

impl Default for SecEventParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SecEventParser {
    /// Parser with no configured keys; `verify` then needs an explicit key.
    #[must_use]
    pub fn new() -> Self {
        let config = ParserConfig::default();
        Self {
            verification_keys: config.verification_keys,
            remote: None,
            verifier: config.verifier,
            default_options: config.default_options,
        }
    }

    /// Parser from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `jwks_url` is set without a resolver and the HTTP
    /// resolver cannot be created.
    pub fn with_config(config: ParserConfig) -> SecEventResult<Self> {
        let remote = match config.jwks_url {
            Some(url) => {
                let resolver: Arc<dyn KeySetResolver> = match config.resolver {
                    Some(resolver) => resolver,
                    None => Arc::new(HttpJwksResolver::new(&config.jwks)?),
                };
                Some(RemoteKeys { url, resolver })
            }
            None => None,
        };

        Ok(Self {
            verification_keys: config.verification_keys,
            remote,
            verifier: config.verifier,
            default_options: config.default_options,
        })
    }

    /// Parser whose configured keys are a snapshot of `registry`.
    #[must_use]
    pub fn from_registry(registry: &KeyRegistry) -> Self {
        Self {
            verification_keys: registry.list(),
            ..Self::new()
        }
    }

    /// Options applied to every call.
    #[must_use]
    pub const fn default_options(&self) -> &ValidationOptions {
        &self.default_options
    }

    /// See [`decode`].
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn decode(&self, token: &str) -> SecEventResult<SecEventPayload> {
        decode(token)
    }

    /// Verify `token` and check it as a SET.
    ///
    /// Keys come from `keys` when given, else from the configured keys, else
    /// from the remote key set. Candidates are tried one at a time in order
    /// and the first that verifies wins.
    #[instrument(skip_all)]
    pub async fn verify<'k>(
        &self,
        token: &str,
        keys: impl Into<VerificationKeys<'k>>,
        options: Option<&ValidationOptions>,
    ) -> ValidationResult {
        let options = match options {
            Some(call) => self.default_options.merge(call),
            None => self.default_options.clone(),
        };
        let constraints = options.constraints();

        let verified = match keys.into() {
            VerificationKeys::Single(key) => {
                self.try_keys(token, std::slice::from_ref(key), &constraints).await
            }
            VerificationKeys::Candidates(keys) => self.try_keys(token, keys, &constraints).await,
            VerificationKeys::Configured if !self.verification_keys.is_empty() => {
                self.try_keys(token, &self.verification_keys, &constraints).await
            }
            VerificationKeys::Configured => match &self.remote {
                Some(remote) => self.try_remote(token, remote, &constraints).await,
                None => Err(SecEventError::NoVerificationMethod.to_string()),
            },
        };

        match verified {
            Ok(claims) => check_claims(claims, &options),
            Err(error) => ValidationResult::invalid(error),
        }
    }

    async fn try_keys<'k, I>(
        &self,
        token: &str,
        keys: I,
        constraints: &VerificationConstraints,
    ) -> Result<Map<String, Value>, String>
    where
        I: IntoIterator<Item = &'k SigningKey>,
    {
        let mut last_error = None;
        for (attempt, key) in keys.into_iter().enumerate() {
            match self.verifier.verify(token, key, constraints).await {
                Ok(claims) => {
                    debug!(attempt, kid = ?key.kid, "Key verified token");
                    return Ok(claims);
                }
                Err(err) => {
                    debug!(attempt, kid = ?key.kid, error = %err, "Key rejected token");
                    last_error = Some(err.to_string());
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            SecEventError::verification("no candidate key was available").to_string()
        }))
    }

    async fn try_remote(
        &self,
        token: &str,
        remote: &RemoteKeys,
        constraints: &VerificationConstraints,
    ) -> Result<Map<String, Value>, String> {
        let header = decode_header(token).map_err(|e| e.to_string())?;
        let key_set = remote.resolver.resolve(&remote.url).await.map_err(|e| {
            warn!(
                url = %remote.url,
                transient = e.is_retryable(),
                error = %e,
                "Key set resolution failed"
            );
            e.to_string()
        })?;

        let candidates = key_set.candidates(header.kid.as_deref(), &header.alg);
        if candidates.is_empty() {
            warn!(kid = ?header.kid, alg = %header.alg, url = %remote.url, "No matching key in key set");
        }
        self.try_keys(token, candidates.iter().map(|key| &**key), constraints)
            .await
    }
}

/// Structural, then semantic checks on verified claims.
fn check_claims(claims: Map<String, Value>, options: &ValidationOptions) -> ValidationResult {
    if let Err(err) = validate_structure(&claims) {
        return err.into();
    }

    let mut errors = Vec::new();

    for name in options.required_claims.iter().flatten() {
        if !claims.contains_key(name) {
            errors.push(format!("Missing required claim: {name}"));
        }
    }

    if let Some(Value::Object(events)) = claims.get("events") {
        for uri in events.keys() {
            if !is_event_uri(uri) {
                errors.push(format!("Invalid event URI format: {uri}"));
            }
        }
    }

    if claims.contains_key("sub") {
        warn!("SET carries a top-level sub claim");
    }

    match SecEventPayload::from_claims(claims) {
        Ok(payload) if errors.is_empty() => ValidationResult::valid(payload),
        Ok(_) => ValidationResult::from_errors(errors),
        Err(err) => {
            errors.push(err.to_string());
            ValidationResult::from_errors(errors)
        }
    }
}

fn is_event_uri(uri: &str) -> bool {
    url::Url::parse(uri).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Read a token's claims without checking its signature, then check its
/// structure.
///
/// # Errors
///
/// Returns [`SecEventError::MalformedToken`] if the token is not a compact
/// JWS with a JSON object payload, or the structural error found.
pub fn decode(token: &str) -> SecEventResult<SecEventPayload> {
    let claims: Map<String, Value> = decode_segment(token, 1, "claims")?;
    SecEventPayload::from_claims(claims)
}

/// Read a token's protected header without checking its signature.
///
/// # Errors
///
/// Returns [`SecEventError::MalformedToken`] if the header cannot be read.
pub fn decode_header(token: &str) -> SecEventResult<SetHeader> {
    decode_segment(token, 0, "header")
}

fn decode_segment<T: DeserializeOwned>(token: &str, index: usize, name: &str) -> SecEventResult<T> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(SecEventError::malformed("expected three dot-separated segments"));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(parts[index])
        .map_err(|e| SecEventError::malformed(format!("{name} segment is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| SecEventError::malformed(format!("{name} segment is not a JSON object: {e}")))
}

/// All events of a decoded payload.
#[must_use]
pub const fn extract_events(payload: &SecEventPayload) -> &SecurityEvent {
    &payload.events
}

/// Data for one event type, if present.
#[must_use]
pub fn extract_event<'p>(payload: &'p SecEventPayload, event_type: &str) -> Option<&'p EventData> {
    payload.events.get(event_type)
}

/// Whether the payload carries `event_type`.
#[must_use]
pub fn has_event(payload: &SecEventPayload, event_type: &str) -> bool {
    payload.events.contains(event_type)
}

/// Event-type URIs of the payload.
#[must_use]
pub fn event_types(payload: &SecEventPayload) -> Vec<&str> {
    payload.events.event_types()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SecEventBuilder;
    use crate::event::{EventOptions, caep};
    use crate::jwks::{KeySet, StaticKeySetResolver};
    use crate::subject::SubjectIdentifier;
    use serde_json::json;

    const JWKS_URL: &str = "https://issuer.example.com/.well-known/jwks.json";

    fn key(secret: &str) -> SigningKey {
        SigningKey::hmac("HS256", secret.as_bytes().to_vec())
    }

    async fn token_signed_with(key: &SigningKey) -> String {
        let mut builder = SecEventBuilder::new();
        builder
            .with_issuer("https://issuer.example.com")
            .with_audience("https://receiver.example.com")
            .with_event(SecurityEvent::session_revoked(
                SubjectIdentifier::email("user@example.com"),
                &EventOptions::default(),
            ));
        builder.sign(Some(key)).await.unwrap().token
    }

    fn unsigned_token(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"secevent+jwt"}"#);
        let body = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{body}.c2ln")
    }

    #[test]
    fn test_decode_reads_claims() {
        let token = unsigned_token(&json!({
            "iss": "https://issuer.example.com",
            "jti": "j",
            "iat": 1,
            "events": {"https://schemas.openid.net/secevent/caep/event-type/session-revoked": {}}
        }));
        let payload = decode(&token).unwrap();
        assert!(has_event(&payload, caep::SESSION_REVOKED));
        assert_eq!(event_types(&payload), vec![caep::SESSION_REVOKED]);
        assert!(extract_event(&payload, caep::CREDENTIAL_CHANGE).is_none());
        assert_eq!(extract_events(&payload).len(), 1);
    }

    #[test]
    fn test_decode_keeps_unmodelled_event_shapes() {
        let token = unsigned_token(&json!({
            "iss": "https://issuer.example.com",
            "jti": "j",
            "iat": 1,
            "events": {
                "https://schemas.openid.net/secevent/caep/event-type/session-revoked": {
                    "subject": {"format": "jwt_id", "iss": "https://idp.example.com", "jti": "t-9"}
                },
                "https://example.com/events/flag": true
            }
        }));
        let payload = decode(&token).unwrap();

        let subject = extract_event(&payload, caep::SESSION_REVOKED)
            .and_then(|data| data.subject.as_ref())
            .unwrap();
        assert_eq!(subject.format(), Some("jwt_id"));
        assert!(!subject.is_known());

        let flag = extract_event(&payload, "https://example.com/events/flag").unwrap();
        assert_eq!(flag.opaque(), Some(&json!(true)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("not-a-token"), Err(SecEventError::MalformedToken(_))));
        assert!(matches!(decode("a.!!!.c"), Err(SecEventError::MalformedToken(_))));

        let token = unsigned_token(&json!({"iss": "https://issuer.example.com", "jti": "j", "iat": 1}));
        assert!(matches!(decode(&token), Err(SecEventError::MissingEvents)));
    }

    #[test]
    fn test_decode_header() {
        let token = unsigned_token(&json!({}));
        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, "HS256");
        assert!(header.is_set());
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_options_merge_call_site_wins() {
        let defaults = ValidationOptions::new()
            .with_issuer("https://issuer.example.com")
            .with_clock_tolerance(30);
        let call = ValidationOptions::new().with_clock_tolerance(5).with_required_claims(["txn"]);

        let merged = defaults.merge(&call);
        assert_eq!(merged.issuer, Some(vec!["https://issuer.example.com".to_string()]));
        assert_eq!(merged.clock_tolerance, Some(5));
        assert_eq!(merged.required_claims, Some(vec!["txn".to_string()]));
    }

    #[test]
    fn test_options_from_configuration() {
        let options: ValidationOptions = serde_json::from_value(json!({
            "issuer": "https://issuer.example.com",
            "audience": ["a", "b"],
            "max_token_age": 300
        }))
        .unwrap();
        assert_eq!(options.issuer, Some(vec!["https://issuer.example.com".to_string()]));
        assert_eq!(options.audience, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(options.max_token_age, Some(300));
        assert!(options.clock_tolerance.is_none());
    }

    #[tokio::test]
    async fn test_no_verification_method() {
        let token = token_signed_with(&key("secret")).await;
        let result = SecEventParser::new()
            .verify(&token, VerificationKeys::Configured, None)
            .await;
        assert!(!result.valid);
        assert_eq!(result.error, Some(SecEventError::NoVerificationMethod.to_string()));
    }

    #[tokio::test]
    async fn test_configured_keys_are_used() {
        let signing = key("configured");
        let token = token_signed_with(&signing).await;
        let parser = SecEventParser::with_config(
            ParserConfig::default()
                .with_key(key("unrelated"))
                .with_key(signing),
        )
        .unwrap();

        let result = parser.verify(&token, VerificationKeys::Configured, None).await;
        assert!(result.valid, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_registry_snapshot() {
        let registry = KeyRegistry::new();
        registry.add("primary", &key("registry-secret"));
        let parser = SecEventParser::from_registry(&registry);
        registry.clear();

        let token = token_signed_with(&key("registry-secret")).await;
        assert!(parser.verify(&token, VerificationKeys::Configured, None).await.valid);
    }

    #[tokio::test]
    async fn test_remote_keys_selected_by_kid() {
        let signing = key("remote-secret").with_kid("remote-1");
        let token = token_signed_with(&signing).await;
        let resolver = StaticKeySetResolver::new().with_key_set(
            JWKS_URL,
            KeySet::new(vec![key("other").with_kid("remote-0"), signing]),
        );
        let parser = SecEventParser::with_config(
            ParserConfig::default()
                .with_jwks_url(JWKS_URL)
                .with_resolver(Arc::new(resolver)),
        )
        .unwrap();

        let result = parser.verify(&token, VerificationKeys::Configured, None).await;
        assert!(result.valid, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_remote_key_without_alg_matches_key_type() {
        let signing = SigningKey::hmac("HS384", b"unpinned-remote-secret".to_vec());
        let token = token_signed_with(&signing).await;
        let jwks = json!({"keys": [
            {"kty": "oct", "k": URL_SAFE_NO_PAD.encode(b"unpinned-remote-secret")}
        ]});
        let resolver = StaticKeySetResolver::new()
            .with_key_set(JWKS_URL, KeySet::from_jwks_json(&jwks.to_string()).unwrap());
        let parser = SecEventParser::with_config(
            ParserConfig::default()
                .with_jwks_url(JWKS_URL)
                .with_resolver(Arc::new(resolver)),
        )
        .unwrap();

        let result = parser.verify(&token, VerificationKeys::Configured, None).await;
        assert!(result.valid, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_remote_resolution_failure_is_reported() {
        let token = token_signed_with(&key("secret")).await;
        let parser = SecEventParser::with_config(
            ParserConfig::default()
                .with_jwks_url(JWKS_URL)
                .with_resolver(Arc::new(StaticKeySetResolver::new())),
        )
        .unwrap();

        let result = parser.verify(&token, VerificationKeys::Configured, None).await;
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("Key set resolution failed"));
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let token = token_signed_with(&key("secret")).await;
        let none: Vec<SigningKey> = Vec::new();
        let result = SecEventParser::new().verify(&token, &none, None).await;
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("no candidate key"));
    }

    #[tokio::test]
    async fn test_default_options_apply() {
        let signing = key("secret");
        let token = token_signed_with(&signing).await;
        let parser = SecEventParser::with_config(
            ParserConfig::default()
                .with_default_options(ValidationOptions::new().with_required_claims(["txn"])),
        )
        .unwrap();

        let result = parser.verify(&token, &signing, None).await;
        assert_eq!(result.errors, vec!["Missing required claim: txn".to_string()]);

        let relaxed = ValidationOptions::new().with_required_claims(Vec::<String>::new());
        assert!(parser.verify(&token, &signing, Some(&relaxed)).await.valid);
    }

    #[test]
    fn test_semantic_errors_accumulate() {
        let claims = match json!({
            "iss": "https://issuer.example.com",
            "jti": "j",
            "iat": 1,
            "sub": "tolerated",
            "events": {"not-a-url": {}, "urn:example:event": {}}
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let options = ValidationOptions::new().with_required_claims(["txn", "aud"]);

        let result = check_claims(claims, &options);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 4);
        assert!(result.errors.contains(&"Invalid event URI format: not-a-url".to_string()));
        assert!(result.errors.contains(&"Invalid event URI format: urn:example:event".to_string()));
        assert_eq!(result.error.unwrap(), result.errors.join("; "));
    }
}
