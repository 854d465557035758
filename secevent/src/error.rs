//! SET error types using thiserror 2.0.
//!
//! Builder misuse and undecodable tokens surface as [`SecEventError`].
//! Verification outcomes never do; they are reported through
//! [`ValidationResult`](crate::ValidationResult).

use rust_common::PlatformError;
use thiserror::Error;

/// Security Event Token errors.
#[derive(Error, Debug)]
pub enum SecEventError {
    /// No issuer configured on the builder, or `iss` absent/empty in a token
    #[error("Missing or invalid issuer (iss)")]
    MissingIssuer,

    /// The builder holds no events
    #[error("At least one event is required")]
    NoEvents,

    /// Neither an explicit nor a default signing key is available
    #[error("A signing key is required to sign a SET")]
    MissingSigningKey,

    /// A custom claim collides with a reserved SET claim
    #[error("Custom claim '{0}' collides with a reserved SET claim")]
    ReservedClaim(String),

    /// The token could not be parsed at all
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// `events` absent or not a JSON object
    #[error("Missing or invalid events claim")]
    MissingEvents,

    /// `jti` absent or empty
    #[error("Missing or invalid jti claim")]
    MissingJti,

    /// `iat` absent or not numeric
    #[error("Missing or invalid iat claim")]
    MissingIat,

    /// No key, configured keys, or key-set resolver available
    #[error("No verification method available: provide a key, configure verification keys, or configure a JWKS URL")]
    NoVerificationMethod,

    /// The signer rejected the payload or key
    #[error("Failed to sign SET: {0}")]
    Signing(String),

    /// Signature or claim verification failed
    #[error("SET verification failed: {0}")]
    Verification(String),

    /// The remote key set could not be obtained
    #[error("Key set resolution failed: {0}")]
    KeyResolution(String),

    /// Algorithm name not understood by the crypto backend
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key material cannot be used for the requested operation
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Platform error (from rust-common)
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SecEventError {
    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Create a malformed token error.
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }

    /// Create a signing error.
    #[must_use]
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Create a verification error.
    #[must_use]
    pub fn verification(msg: impl Into<String>) -> Self {
        Self::Verification(msg.into())
    }

    /// Create a key resolution error.
    #[must_use]
    pub fn key_resolution(msg: impl Into<String>) -> Self {
        Self::KeyResolution(msg.into())
    }
}

/// Result type for SET operations.
pub type SecEventResult<T> = Result<T, SecEventError>;
