//! Remote key sets (JWKS) and their resolvers.
//!
//! A fetched JWKS document is converted once into a [`KeySet`] of
//! verification-only [`SigningKey`]s. Entries the crypto backend could not
//! use safely are dropped at conversion time:
//! - RSA moduli shorter than 2048 bits
//! - EC keys outside P-256, P-384 and P-521
//! - OKP keys other than Ed25519
//! - keys published for encryption (`use: enc`)

use crate::crypto::{BoxFuture, KeySetResolver};
use crate::error::{SecEventError, SecEventResult};
use crate::keys::{KeyMaterial, SigningKey};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rust_common::{HttpConfig, PlatformError, RetryConfig, RetryPolicy, build_http_client, classify_status};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

const MIN_RSA_MODULUS_BITS: usize = 2048;

/// JSON Web Key structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC, OKP, oct)
    pub kty: String,
    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// EC x coordinate, or the OKP public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// EC or OKP curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Symmetric key value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

/// JSON Web Key Set structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// List of keys
    pub keys: Vec<Jwk>,
}

/// Usable verification keys from one JWKS document.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<SigningKey>,
    // Parallel to `keys`: the JWK named no `alg`, so `alg` is a default.
    alg_inferred: Vec<bool>,
}

impl KeySet {
    /// Key set from already-converted keys, each bound to its `alg`.
    #[must_use]
    pub fn new(keys: Vec<SigningKey>) -> Self {
        let alg_inferred = vec![false; keys.len()];
        Self { keys, alg_inferred }
    }

    /// Convert a JWKS document, skipping unusable entries.
    #[must_use]
    pub fn from_jwks(jwks: &Jwks) -> Self {
        let (keys, alg_inferred) = jwks
            .keys
            .iter()
            .filter_map(|jwk| jwk_to_signing_key(jwk).map(|key| (key, jwk.alg.is_none())))
            .unzip();
        Self { keys, alg_inferred }
    }

    /// Parse and convert a JWKS JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`SecEventError::KeyResolution`] if the document is not a JWKS.
    pub fn from_jwks_json(json: &str) -> SecEventResult<Self> {
        let jwks: Jwks = serde_json::from_str(json)
            .map_err(|e| SecEventError::key_resolution(format!("invalid JWKS document: {e}")))?;
        Ok(Self::from_jwks(&jwks))
    }

    /// All keys, in document order.
    #[must_use]
    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    /// Key with identifier `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Keys worth trying for a token with header `kid` and `alg`.
    ///
    /// With a `kid` only the exact match qualifies; without one every key for
    /// the header algorithm does. A key whose JWK named no `alg` matches any
    /// algorithm of its key type and is returned bound to the header `alg`.
    #[must_use]
    pub fn candidates(&self, kid: Option<&str>, alg: &str) -> Vec<Cow<'_, SigningKey>> {
        let mut entries = self.keys.iter().zip(&self.alg_inferred);
        match kid {
            Some(kid) => entries
                .find(|(key, _)| key.kid.as_deref() == Some(kid))
                .map(|(key, inferred)| bind_alg(key, *inferred, alg).unwrap_or(Cow::Borrowed(key)))
                .into_iter()
                .collect(),
            None => entries
                .filter_map(|(key, inferred)| bind_alg(key, *inferred, alg))
                .collect(),
        }
    }

    /// Number of usable keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no usable key was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Converts a JWK, or explains through a warning why it was skipped.
fn jwk_to_signing_key(jwk: &Jwk) -> Option<SigningKey> {
    let kid = jwk.kid.as_deref().unwrap_or("<none>");

    if jwk.key_use.as_deref() == Some("enc") {
        debug!(kid = %kid, "Skipping encryption key");
        return None;
    }

    let (material, inferred_alg) = match jwk.kty.as_str() {
        "oct" => {
            let k = jwk.k.as_deref()?;
            let Ok(secret) = URL_SAFE_NO_PAD.decode(k.trim_end_matches('=')) else {
                warn!(kid = %kid, "Symmetric key is not valid base64url, rejecting");
                return None;
            };
            (KeyMaterial::secret(secret), "HS256")
        }
        "RSA" => {
            let n = jwk.n.as_ref()?;
            let e = jwk.e.as_ref()?;
            if modulus_bits(n) < MIN_RSA_MODULUS_BITS {
                warn!(kid = %kid, "RSA key too small, rejecting");
                return None;
            }
            let material = KeyMaterial::RsaComponents {
                n: n.clone(),
                e: e.clone(),
            };
            (material, "RS256")
        }
        "EC" => {
            let x = jwk.x.as_ref()?;
            let y = jwk.y.as_ref()?;
            let crv = jwk.crv.as_deref().unwrap_or("P-256");
            let alg = match crv {
                "P-256" => "ES256",
                "P-384" => "ES384",
                "P-521" => "ES512",
                _ => {
                    warn!(kid = %kid, crv = %crv, "Weak EC curve, rejecting");
                    return None;
                }
            };
            let material = KeyMaterial::EcComponents {
                x: x.clone(),
                y: y.clone(),
            };
            (material, alg)
        }
        "OKP" => {
            let x = jwk.x.as_ref()?;
            if jwk.crv.as_deref() != Some("Ed25519") {
                warn!(kid = %kid, crv = ?jwk.crv, "Unsupported OKP curve, rejecting");
                return None;
            }
            (KeyMaterial::EdComponents { x: x.clone() }, "EdDSA")
        }
        other => {
            warn!(kid = %kid, kty = %other, "Unsupported key type");
            return None;
        }
    };

    Some(SigningKey {
        kid: jwk.kid.clone(),
        alg: jwk.alg.clone().unwrap_or_else(|| inferred_alg.to_string()),
        key: material,
    })
}

/// `key` as usable for `alg`, if it is.
fn bind_alg<'a>(key: &'a SigningKey, inferred: bool, alg: &str) -> Option<Cow<'a, SigningKey>> {
    if key.alg == alg {
        Some(Cow::Borrowed(key))
    } else if inferred && same_key_type(&key.alg, alg) {
        Some(Cow::Owned(SigningKey {
            alg: alg.to_string(),
            ..key.clone()
        }))
    } else {
        None
    }
}

/// Whether two JWA algorithms use the same kind of key.
fn same_key_type(a: &str, b: &str) -> bool {
    fn key_type(alg: &str) -> &str {
        match alg.get(..2) {
            Some("HS") => "oct",
            Some("RS" | "PS") => "RSA",
            _ => alg,
        }
    }
    key_type(a) == key_type(b)
}

fn modulus_bits(n: &str) -> usize {
    URL_SAFE_NO_PAD
        .decode(n.trim_end_matches('='))
        .map(|bytes| bytes.iter().skip_while(|b| **b == 0).count() * 8)
        .unwrap_or(0)
}

/// Remote key-set resolver configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwksResolverConfig {
    /// How long a fetched key set is reused, in seconds
    pub cache_ttl_seconds: u64,
    /// Outbound HTTP settings
    pub http: HttpConfig,
    /// Retry policy for transient fetch failures
    pub retry: RetryConfig,
}

impl Default for JwksResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl JwksResolverConfig {
    /// Set the cache TTL.
    #[must_use]
    pub const fn with_cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = seconds;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Fetches key sets over HTTP and caches them per URL.
pub struct HttpJwksResolver {
    http_client: reqwest::Client,
    retry: RetryPolicy,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedKeySet>>,
}

impl std::fmt::Debug for HttpJwksResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJwksResolver")
            .field("ttl", &self.ttl)
            .field("max_retries", &self.retry.max_retries())
            .finish_non_exhaustive()
    }
}

impl HttpJwksResolver {
    /// Create a resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &JwksResolverConfig) -> SecEventResult<Self> {
        Ok(Self {
            http_client: build_http_client(&config.http)?,
            retry: RetryPolicy::new(config.retry.clone()),
            ttl: Duration::from_secs(config.cache_ttl_seconds),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Drop the cached key set for `url`.
    pub async fn invalidate(&self, url: &str) {
        self.cache.write().await.remove(url);
    }

    /// Drop every cached key set.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    async fn cached(&self, url: &str) -> Option<Arc<KeySet>> {
        let cache = self.cache.read().await;
        cache
            .get(url)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.keys))
    }

    async fn fetch_once(&self, url: &str) -> Result<Jwks, PlatformError> {
        let response = self.http_client.get(url).send().await?;
        if let Some(err) = classify_status(response.status(), url) {
            return Err(err);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn refresh(&self, url: &str) -> SecEventResult<Arc<KeySet>> {
        info!("Fetching JWKS");

        let jwks = self
            .retry
            .execute(|| self.fetch_once(url))
            .await?;

        let keys = Arc::new(KeySet::from_jwks(&jwks));
        if keys.len() < jwks.keys.len() {
            warn!(
                published = jwks.keys.len(),
                usable = keys.len(),
                "Some JWKS entries were skipped"
            );
        }

        self.cache.write().await.insert(
            url.to_string(),
            CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            },
        );

        info!("JWKS cache updated with {} keys", keys.len());
        Ok(keys)
    }
}

impl KeySetResolver for HttpJwksResolver {
    fn resolve<'a>(&'a self, url: &'a str) -> BoxFuture<'a, SecEventResult<Arc<KeySet>>> {
        Box::pin(async move {
            if let Some(keys) = self.cached(url).await {
                return Ok(keys);
            }
            self.refresh(url).await
        })
    }
}

/// Serves fixed key sets registered per URL.
#[derive(Debug, Clone, Default)]
pub struct StaticKeySetResolver {
    sets: HashMap<String, Arc<KeySet>>,
}

impl StaticKeySetResolver {
    /// Empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `keys` under `url`.
    #[must_use]
    pub fn with_key_set(mut self, url: impl Into<String>, keys: KeySet) -> Self {
        self.sets.insert(url.into(), Arc::new(keys));
        self
    }
}

impl KeySetResolver for StaticKeySetResolver {
    fn resolve<'a>(&'a self, url: &'a str) -> BoxFuture<'a, SecEventResult<Arc<KeySet>>> {
        Box::pin(async move {
            self.sets
                .get(url)
                .cloned()
                .ok_or_else(|| SecEventError::key_resolution(format!("no key set registered for {url}")))
        })
    }
}
