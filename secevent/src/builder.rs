//! Fluent SET builder.

use crate::crypto::{SetHeader, SetSigner};
use crate::error::{SecEventError, SecEventResult};
use crate::event::{EventData, SecurityEvent};
use crate::id::{IdGenerator, default_id_generator};
use crate::jose::JoseCrypto;
use crate::keys::SigningKey;
use crate::payload::{Audience, SecEventPayload, is_reserved_claim};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Values a builder starts from and returns to on [`SecEventBuilder::reset`].
#[derive(Clone)]
pub struct BuilderConfig {
    /// Issuer used when none is set explicitly
    pub default_issuer: Option<String>,
    /// Audience used when none is set explicitly
    pub default_audience: Option<Audience>,
    /// Key used by `sign` when no key is passed
    pub default_signing_key: Option<SigningKey>,
    /// `jti` source; the process-wide default generator when unset
    pub id_generator: Option<Arc<dyn IdGenerator>>,
    /// Token signer
    pub signer: Arc<dyn SetSigner>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            default_issuer: None,
            default_audience: None,
            default_signing_key: None,
            id_generator: None,
            signer: Arc::new(JoseCrypto),
        }
    }
}

impl fmt::Debug for BuilderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderConfig")
            .field("default_issuer", &self.default_issuer)
            .field("default_audience", &self.default_audience)
            .field("default_signing_key", &self.default_signing_key)
            .finish_non_exhaustive()
    }
}

impl BuilderConfig {
    /// Set the default issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.default_issuer = Some(issuer.into());
        self
    }

    /// Set the default audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<Audience>) -> Self {
        self.default_audience = Some(audience.into());
        self
    }

    /// Set the default signing key.
    #[must_use]
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.default_signing_key = Some(key);
        self
    }

    /// Use a specific `jti` generator.
    #[must_use]
    pub fn with_id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Use a specific signer.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn SetSigner>) -> Self {
        self.signer = signer;
        self
    }
}

/// A signed token and the payload it carries.
#[derive(Debug, Clone)]
pub struct SignedSet {
    /// Compact-serialized token
    pub token: String,
    /// Signed payload
    pub payload: SecEventPayload,
}

/// Accumulates SET claims and produces payloads or signed tokens.
///
/// Setters take `&mut self` and return it for chaining. A builder is meant
/// for one thread of control; clone it for concurrent use. Clones share no
/// state.
#[derive(Clone)]
pub struct SecEventBuilder {
    config: BuilderConfig,
    issuer: Option<String>,
    audience: Option<Audience>,
    jti: Option<String>,
    iat: Option<i64>,
    txn: Option<String>,
    events: SecurityEvent,
    claims: Map<String, Value>,
    signing_key: Option<SigningKey>,
}

impl fmt::Debug for SecEventBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecEventBuilder")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("jti", &self.jti)
            .field("iat", &self.iat)
            .field("txn", &self.txn)
            .field("events", &self.events.event_types())
            .field("claims", &self.claims.keys().collect::<Vec<_>>())
            .field("signing_key", &self.signing_key)
            .finish_non_exhaustive()
    }
}

impl Default for SecEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SecEventBuilder {
    /// Builder with no defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    /// Builder starting from `config`.
    #[must_use]
    pub fn with_config(config: BuilderConfig) -> Self {
        Self {
            issuer: config.default_issuer.clone(),
            audience: config.default_audience.clone(),
            signing_key: config.default_signing_key.clone(),
            jti: None,
            iat: None,
            txn: None,
            events: SecurityEvent::new(),
            claims: Map::new(),
            config,
        }
    }

    /// Set the issuer.
    pub fn with_issuer(&mut self, issuer: impl Into<String>) -> &mut Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the audience.
    pub fn with_audience(&mut self, audience: impl Into<Audience>) -> &mut Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set the token identifier instead of generating one.
    pub fn with_jti(&mut self, jti: impl Into<String>) -> &mut Self {
        self.jti = Some(jti.into());
        self
    }

    /// Set the issued-at time (seconds since the epoch) instead of now.
    pub fn with_issued_at(&mut self, iat: i64) -> &mut Self {
        self.iat = Some(iat);
        self
    }

    /// Set the transaction identifier.
    pub fn with_txn(&mut self, txn: impl Into<String>) -> &mut Self {
        self.txn = Some(txn.into());
        self
    }

    /// Merge events; an event type already present is replaced.
    pub fn with_event(&mut self, event: SecurityEvent) -> &mut Self {
        self.events.merge(event);
        self
    }

    /// Merge several event maps in order.
    pub fn with_events(&mut self, events: impl IntoIterator<Item = SecurityEvent>) -> &mut Self {
        for event in events {
            self.events.merge(event);
        }
        self
    }

    /// Add or replace a single event.
    pub fn with_event_data(&mut self, uri: impl Into<String>, data: EventData) -> &mut Self {
        self.events.insert(uri, data);
        self
    }

    /// Add or replace a custom claim.
    pub fn with_claim(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Add or replace several custom claims.
    pub fn with_claims(&mut self, claims: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.claims.extend(claims);
        self
    }

    /// Set the key `sign` uses when none is passed.
    pub fn with_signing_key(&mut self, key: SigningKey) -> &mut Self {
        self.signing_key = Some(key);
        self
    }

    /// Current issuer.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Current audience.
    #[must_use]
    pub const fn audience(&self) -> Option<&Audience> {
        self.audience.as_ref()
    }

    /// Current transaction identifier.
    #[must_use]
    pub fn txn(&self) -> Option<&str> {
        self.txn.as_deref()
    }

    /// Accumulated events.
    #[must_use]
    pub const fn events(&self) -> &SecurityEvent {
        &self.events
    }

    /// Accumulated custom claims.
    #[must_use]
    pub const fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Current default signing key.
    #[must_use]
    pub const fn signing_key(&self) -> Option<&SigningKey> {
        self.signing_key.as_ref()
    }

    /// Produce a payload from the accumulated state.
    ///
    /// # Errors
    ///
    /// - [`SecEventError::MissingIssuer`] if no issuer is set
    /// - [`SecEventError::NoEvents`] if no event was added
    /// - [`SecEventError::ReservedClaim`] if a custom claim uses a reserved name
    pub fn build_payload(&self) -> SecEventResult<SecEventPayload> {
        let iss = self
            .issuer
            .as_deref()
            .filter(|iss| !iss.is_empty())
            .ok_or(SecEventError::MissingIssuer)?;

        if self.events.is_empty() {
            return Err(SecEventError::NoEvents);
        }

        if let Some(name) = self.claims.keys().find(|name| is_reserved_claim(name)) {
            return Err(SecEventError::ReservedClaim(name.clone()));
        }

        let jti = match &self.jti {
            Some(jti) => jti.clone(),
            None => self
                .config
                .id_generator
                .clone()
                .unwrap_or_else(default_id_generator)
                .generate(),
        };

        Ok(SecEventPayload {
            iss: iss.to_string(),
            jti,
            iat: self.iat.unwrap_or_else(|| chrono::Utc::now().timestamp()),
            events: self.events.clone(),
            aud: self.audience.clone(),
            txn: self.txn.clone(),
            claims: self.claims.clone(),
        })
    }

    /// Build the payload and sign it with `key`, or the builder's key.
    ///
    /// # Errors
    ///
    /// Returns any [`build_payload`](Self::build_payload) error,
    /// [`SecEventError::MissingSigningKey`] when no key is available, or the
    /// signer's error.
    #[instrument(skip_all, fields(events = self.events.len()))]
    pub async fn sign(&self, key: Option<&SigningKey>) -> SecEventResult<SignedSet> {
        let payload = self.build_payload()?;
        let key = key
            .or(self.signing_key.as_ref())
            .ok_or(SecEventError::MissingSigningKey)?;

        let header = SetHeader::for_key(key);
        let token = self.config.signer.sign(&payload, key, &header).await?;

        debug!(jti = %payload.jti, alg = %header.alg, kid = ?header.kid, "Signed SET");
        Ok(SignedSet { token, payload })
    }

    /// Return to the configured defaults and drop everything else.
    pub fn reset(&mut self) -> &mut Self {
        self.issuer.clone_from(&self.config.default_issuer);
        self.audience.clone_from(&self.config.default_audience);
        self.signing_key.clone_from(&self.config.default_signing_key);
        self.jti = None;
        self.iat = None;
        self.txn = None;
        self.events = SecurityEvent::new();
        self.claims.clear();
        self
    }
}
