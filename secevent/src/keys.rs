//! Signing keys and the in-memory key registry.
//!
//! The registry is pure bookkeeping: it never inspects key material.

use serde::Deserialize;
use std::fmt;
use std::sync::{LazyLock, PoisonError, RwLock};
use zeroize::Zeroizing;

/// Opaque key material, interpreted only by the crypto backend.
///
/// PEM variants are read as private keys when signing and as public keys
/// when verifying. Component variants come from a JWKS and can only verify.
#[derive(Clone)]
pub enum KeyMaterial {
    /// Shared secret for HMAC algorithms
    Secret(Zeroizing<Vec<u8>>),
    /// PEM-encoded RSA key
    RsaPem(Zeroizing<Vec<u8>>),
    /// PEM-encoded EC key
    EcPem(Zeroizing<Vec<u8>>),
    /// PEM-encoded Ed25519 key
    EdPem(Zeroizing<Vec<u8>>),
    /// Base64url RSA public components
    RsaComponents {
        /// Modulus
        n: String,
        /// Exponent
        e: String,
    },
    /// Base64url EC public point
    EcComponents {
        /// X coordinate
        x: String,
        /// Y coordinate
        y: String,
    },
    /// Base64url Ed25519 public key
    EdComponents {
        /// Public key
        x: String,
    },
}

impl KeyMaterial {
    /// Shared secret.
    #[must_use]
    pub fn secret(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Secret(Zeroizing::new(bytes.into()))
    }

    /// Shared-secret bytes, if this is a secret.
    #[must_use]
    pub fn secret_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Secret(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    /// Short description that never includes the material itself.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Secret(_) => "secret",
            Self::RsaPem(_) => "rsa-pem",
            Self::EcPem(_) => "ec-pem",
            Self::EdPem(_) => "ed-pem",
            Self::RsaComponents { .. } => "rsa-jwk",
            Self::EcComponents { .. } => "ec-jwk",
            Self::EdComponents { .. } => "okp-jwk",
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial({}, [REDACTED])", self.kind())
    }
}

/// A key used to sign or verify SETs.
#[derive(Debug, Clone)]
pub struct SigningKey {
    /// Key identifier placed in the `kid` header
    pub kid: Option<String>,
    /// JWA algorithm name, e.g. `HS256` or `ES256`
    pub alg: String,
    /// Key material
    pub key: KeyMaterial,
}

impl SigningKey {
    /// Create a key without an identifier.
    #[must_use]
    pub fn new(alg: impl Into<String>, key: KeyMaterial) -> Self {
        Self {
            kid: None,
            alg: alg.into(),
            key,
        }
    }

    /// HMAC key from a shared secret.
    #[must_use]
    pub fn hmac(alg: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self::new(alg, KeyMaterial::secret(secret))
    }

    /// Set the key identifier.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

/// Serializable description of a shared-secret key, for configuration files.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretKeyConfig {
    /// Key identifier
    #[serde(default)]
    pub kid: Option<String>,
    /// Algorithm, defaults to `HS256`
    #[serde(default = "default_hmac_alg")]
    pub alg: String,
    /// Secret as UTF-8 text
    pub secret: String,
}

fn default_hmac_alg() -> String {
    "HS256".to_string()
}

impl From<SecretKeyConfig> for SigningKey {
    fn from(config: SecretKeyConfig) -> Self {
        Self {
            kid: config.kid,
            alg: config.alg,
            key: KeyMaterial::secret(config.secret.into_bytes()),
        }
    }
}

static GLOBAL_REGISTRY: LazyLock<KeyRegistry> = LazyLock::new(KeyRegistry::new);

/// Mapping from key identifier to [`SigningKey`], in insertion order.
///
/// Readers run concurrently; `add`, `remove` and `clear` are serialized and
/// readers observe either the state before or after a mutation.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: RwLock<Vec<SigningKey>>,
}

impl KeyRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    /// Store a copy of `key` tagged with `id`.
    ///
    /// An existing entry for `id` is replaced in place, keeping its
    /// insertion position.
    pub fn add(&self, id: impl Into<String>, key: &SigningKey) {
        let id = id.into();
        let tagged = key.clone().with_kid(id.clone());
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        match keys.iter_mut().find(|k| k.kid.as_deref() == Some(id.as_str())) {
            Some(slot) => *slot = tagged,
            None => keys.push(tagged),
        }
    }

    /// Key stored under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<SigningKey> {
        self.read()
            .iter()
            .find(|k| k.kid.as_deref() == Some(id))
            .cloned()
    }

    /// All keys in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<SigningKey> {
        self.read().clone()
    }

    /// Remove the key stored under `id`; returns whether one existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        let before = keys.len();
        keys.retain(|k| k.kid.as_deref() != Some(id));
        keys.len() != before
    }

    /// Remove every key.
    pub fn clear(&self) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// First-inserted key still present.
    #[must_use]
    pub fn default_key(&self) -> Option<SigningKey> {
        self.read().first().cloned()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<SigningKey>> {
        self.keys.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(secret: &str) -> SigningKey {
        SigningKey::hmac("HS256", secret.as_bytes())
    }

    #[test]
    fn test_add_tags_key_with_id() {
        let registry = KeyRegistry::new();
        registry.add("k1", &key("one"));

        let stored = registry.get("k1").unwrap();
        assert_eq!(stored.kid.as_deref(), Some("k1"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let registry = KeyRegistry::new();
        registry.add("k1", &key("one"));
        registry.add("k2", &key("two"));
        registry.add("k1", &SigningKey::hmac("HS512", b"replacement".to_vec()));

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kid.as_deref(), Some("k1"));
        assert_eq!(listed[0].alg, "HS512");
        assert_eq!(registry.default_key().unwrap().alg, "HS512");
    }

    #[test]
    fn test_default_key_tracks_removals() {
        let registry = KeyRegistry::new();
        assert!(registry.default_key().is_none());

        registry.add("k1", &key("one"));
        registry.add("k2", &key("two"));
        assert!(registry.remove("k1"));
        assert!(!registry.remove("k1"));
        assert_eq!(registry.default_key().unwrap().kid.as_deref(), Some("k2"));

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.default_key().is_none());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let registry = Arc::new(KeyRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.add(format!("k{i}"), &key("shared"));
                    registry.list().len()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() >= 1);
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_debug_redacts_material() {
        let rendered = format!("{:?}", key("super-secret-value"));
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_secret_key_config() {
        let config: SecretKeyConfig =
            serde_json::from_str(r#"{"kid": "cfg", "secret": "from-config"}"#).unwrap();
        let key = SigningKey::from(config);
        assert_eq!(key.alg, "HS256");
        assert_eq!(key.kid.as_deref(), Some("cfg"));
    }
}
