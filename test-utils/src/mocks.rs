//! Recording collaborators for testing.

use auth_secevent::crypto::BoxFuture;
use auth_secevent::{
    IdGenerator, JoseCrypto, KeySet, KeySetResolver, SecEventResult, SetVerifier, SigningKey,
    VerificationConstraints,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Verifier that delegates to [`JoseCrypto`] and records every key it is
/// asked to try.
#[derive(Debug, Default)]
pub struct RecordingVerifier {
    inner: JoseCrypto,
    attempts: Mutex<Vec<Option<String>>>,
}

impl RecordingVerifier {
    /// Create a new recording verifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key identifiers tried so far, in call order.
    #[must_use]
    pub fn attempts(&self) -> Vec<Option<String>> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clear recorded attempts.
    pub fn clear(&self) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl SetVerifier for RecordingVerifier {
    fn verify<'a>(
        &'a self,
        token: &'a str,
        key: &'a SigningKey,
        constraints: &'a VerificationConstraints,
    ) -> BoxFuture<'a, SecEventResult<Map<String, Value>>> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.kid.clone());
        self.inner.verify(token, key, constraints)
    }
}

/// Resolver that serves one key set and counts lookups.
#[derive(Debug)]
pub struct CountingResolver {
    keys: Arc<KeySet>,
    calls: AtomicUsize,
}

impl CountingResolver {
    /// Serve `keys` for every URL.
    #[must_use]
    pub fn new(keys: KeySet) -> Self {
        Self {
            keys: Arc::new(keys),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `resolve` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeySetResolver for CountingResolver {
    fn resolve<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, SecEventResult<Arc<KeySet>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let keys = Arc::clone(&self.keys);
        Box::pin(async move { Ok(keys) })
    }
}

/// Deterministic `jti` values: `<prefix>-0`, `<prefix>-1`, ...
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Create a generator with the given prefix.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        format!("{}-{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
    }
}
