//! Security Event Token (SET, RFC 8417) engine.
//!
//! Builds, signs, decodes and verifies SETs carrying OpenID CAEP 1.0,
//! SSF 1.0 and RISC 1.0 events.
//!
//! # Features
//! - Typed subject identifiers and event factories for every event type
//! - Fluent [`SecEventBuilder`] producing payloads or signed tokens
//! - [`SecEventParser`] with ordered key trial, remote key sets and
//!   aggregated semantic validation
//! - In-memory [`KeyRegistry`] and pluggable `jti` generation
//! - Default `jsonwebtoken` backend behind the [`SetSigner`] and
//!   [`SetVerifier`] traits

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod crypto;
pub mod error;
pub mod event;
pub mod id;
pub mod jose;
pub mod jwks;
pub mod keys;
pub mod parser;
pub mod payload;
pub mod subject;

pub use builder::{BuilderConfig, SecEventBuilder, SignedSet};
pub use crypto::{KeySetResolver, SET_TYPE, SetHeader, SetSigner, SetVerifier, VerificationConstraints};
pub use error::{SecEventError, SecEventResult};
pub use event::{
    AccountDisabledReason, ChangeDirection, ChangeType, ComplianceStatus, CredentialDetails,
    EventData, EventFamily, EventOptions, InitiatingEntity, LocalizedText, SecEventType,
    SecurityEvent, StreamStatus,
};
pub use id::{IdGenerator, UuidGenerator, default_id_generator, set_default_id_generator};
pub use jose::JoseCrypto;
pub use jwks::{HttpJwksResolver, Jwk, Jwks, JwksResolverConfig, KeySet, StaticKeySetResolver};
pub use keys::{KeyMaterial, KeyRegistry, SecretKeyConfig, SigningKey};
pub use parser::{
    ParserConfig, SecEventParser, ValidationOptions, ValidationResult, VerificationKeys, decode,
    decode_header,
};
pub use payload::{Audience, SecEventPayload};
pub use subject::{ComplexSubject, EventSubject, SubjectIdentifier};
