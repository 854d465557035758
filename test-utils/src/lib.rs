//! Shared test utilities for the Security Event Token libraries.
//!
//! This crate provides:
//! - Proptest generators for subjects, event types and claims
//! - Recording and counting collaborators for verification tests
//! - Test fixtures with sample issuers, keys and events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;

/// Install a test-writer tracing subscriber once per process.
pub fn init_test_tracing() {
    let config = rust_common::TracingConfig::default().with_log_level("debug");
    let _ = rust_common::init_tracing(&config);
}
