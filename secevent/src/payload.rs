//! Security Event Token (SET) payload per RFC 8417.

use crate::error::{SecEventError, SecEventResult};
use crate::event::{EventData, SecurityEvent};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Claims owned by the SET itself; caller-supplied claims may not use them.
pub const RESERVED_CLAIMS: [&str; 6] = ["iss", "jti", "iat", "events", "aud", "txn"];

/// Whether `name` is one of [`RESERVED_CLAIMS`].
#[must_use]
pub fn is_reserved_claim(name: &str) -> bool {
    RESERVED_CLAIMS.contains(&name)
}

/// The `aud` claim: a single string or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// One audience
    One(String),
    /// Several audiences
    Many(Vec<String>),
}

impl Audience {
    /// Whether `audience` is among the values.
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        self.iter().any(|a| a == audience)
    }

    /// Iterate over the values.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::One(a) => std::slice::from_ref(a),
            Self::Many(list) => list,
        };
        values.iter().map(String::as_str)
    }

    /// Owned list of the values.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }
}

impl From<&str> for Audience {
    fn from(audience: &str) -> Self {
        Self::One(audience.to_string())
    }
}

impl From<String> for Audience {
    fn from(audience: String) -> Self {
        Self::One(audience)
    }
}

impl From<Vec<String>> for Audience {
    fn from(audiences: Vec<String>) -> Self {
        Self::Many(audiences)
    }
}

impl From<&[&str]> for Audience {
    fn from(audiences: &[&str]) -> Self {
        Self::Many(audiences.iter().map(|a| (*a).to_string()).collect())
    }
}

/// The full claim set of a SET.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecEventPayload {
    /// Issuer
    pub iss: String,
    /// JWT ID (unique identifier)
    pub jti: String,
    /// Issued at timestamp
    #[serde(deserialize_with = "numeric_date")]
    pub iat: i64,
    /// Events map (event URI -> event data)
    pub events: SecurityEvent,
    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Transaction identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn: Option<String>,
    /// Additional claims
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl SecEventPayload {
    /// Validate the structure of a raw claim set and convert it.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation found (see
    /// [`validate_structure`]) or [`SecEventError::MalformedToken`] when a
    /// member has the wrong shape.
    pub fn from_claims(claims: Map<String, Value>) -> SecEventResult<Self> {
        validate_structure(&claims)?;
        serde_json::from_value(Value::Object(claims))
            .map_err(|e| SecEventError::malformed(format!("invalid claim set: {e}")))
    }

    /// Convert to a raw claim set.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_claims(&self) -> SecEventResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(SecEventError::malformed("payload did not serialize to an object")),
        }
    }

    /// Get the event type URIs in this SET.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        self.events.event_types()
    }

    /// Check if this SET contains a specific event type.
    #[must_use]
    pub fn contains_event_type(&self, uri: &str) -> bool {
        self.events.contains(uri)
    }

    /// Data for one event type.
    #[must_use]
    pub fn event(&self, uri: &str) -> Option<&EventData> {
        self.events.get(uri)
    }

    /// Get the number of events in this SET.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Additional (non-reserved) claim by name.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Whether a claim, reserved or additional, is present.
    #[must_use]
    pub fn has_claim(&self, name: &str) -> bool {
        match name {
            "iss" | "jti" | "iat" | "events" => true,
            "aud" => self.aud.is_some(),
            "txn" => self.txn.is_some(),
            other => self.claims.contains_key(other),
        }
    }
}

/// Structural checks shared by decoding and verification.
///
/// # Errors
///
/// - [`SecEventError::MissingEvents`] unless `events` is an object
/// - [`SecEventError::MissingIssuer`] unless `iss` is a non-empty string
/// - [`SecEventError::MissingJti`] unless `jti` is a non-empty string
/// - [`SecEventError::MissingIat`] unless `iat` is numeric
pub fn validate_structure(claims: &Map<String, Value>) -> SecEventResult<()> {
    if !claims.get("events").is_some_and(Value::is_object) {
        return Err(SecEventError::MissingEvents);
    }
    if !non_empty_string(claims.get("iss")) {
        return Err(SecEventError::MissingIssuer);
    }
    if !non_empty_string(claims.get("jti")) {
        return Err(SecEventError::MissingJti);
    }
    if !claims.get("iat").is_some_and(Value::is_number) {
        return Err(SecEventError::MissingIat);
    }
    Ok(())
}

fn non_empty_string(value: Option<&Value>) -> bool {
    value.and_then(Value::as_str).is_some_and(|s| !s.is_empty())
}

/// NumericDate may carry a fraction; whole seconds are kept.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|f| f.trunc() as i64))
        .ok_or_else(|| serde::de::Error::custom("iat is not a NumericDate"))
}
