//! Centralized error type for outbound platform operations.
//!
//! Every failure is classified as retryable or permanent so that callers
//! (for example the remote key-set resolver) can decide whether another
//! attempt is worthwhile.

use thiserror::Error;

/// Common error type for platform operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote service is temporarily unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Remote resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Rate limited")]
    RateLimited,

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Check if this error is retryable.
    ///
    /// Transport errors are retryable only when they are timeouts or
    /// connection failures; a response that could not be decoded will not
    /// improve on a second attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_common::PlatformError;
    ///
    /// assert!(PlatformError::RateLimited.is_retryable());
    /// assert!(!PlatformError::NotFound("jwks".to_string()).is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Unavailable(_) | Self::RateLimited | Self::Timeout(_) => true,
            Self::Serialization(_)
            | Self::NotFound(_)
            | Self::InvalidInput(_)
            | Self::Internal(_) => false,
        }
    }

    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
