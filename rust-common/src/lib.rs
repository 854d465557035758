//! Shared cross-cutting concerns for the Security Event Token libraries.
//!
//! This crate provides centralized implementations for:
//! - Error types with retryability classification
//! - HTTP client configuration for outbound key-set fetches
//! - Retry policies with exponential backoff
//! - Tracing subscriber initialisation for binaries and test harnesses

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod retry;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, build_http_client, classify_status};
pub use retry::{RetryConfig, RetryPolicy};
pub use tracing_config::{TracingConfig, init_tracing};
