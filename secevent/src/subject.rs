//! Subject identifier formats per OpenID Shared Signals (RFC 9493).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A tagged description of who or what an event is about.
///
/// Serialized with a `format` discriminant, e.g.
/// `{"format": "email", "email": "user@example.com"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum SubjectIdentifier {
    /// `acct:` URI
    Account {
        /// Account URI
        uri: String,
    },
    /// Email address
    Email {
        /// Address
        email: String,
    },
    /// Issuer and subject combination
    #[serde(rename = "iss_sub")]
    IssuerSubject {
        /// Issuer
        iss: String,
        /// Subject within the issuer's namespace
        sub: String,
    },
    /// Opaque identifier
    Opaque {
        /// Identifier
        id: String,
    },
    /// E.164 phone number
    PhoneNumber {
        /// Phone number
        phone_number: String,
    },
    /// Decentralized identifier
    Did {
        /// DID URL
        url: String,
    },
    /// Arbitrary URI
    Uri {
        /// URI
        uri: String,
    },
    /// Several identifiers for the same subject
    Aliases {
        /// Alias identifiers, in order
        identifiers: Vec<SubjectIdentifier>,
    },
}

impl SubjectIdentifier {
    /// `account` format.
    #[must_use]
    pub fn account(uri: impl Into<String>) -> Self {
        Self::Account { uri: uri.into() }
    }

    /// `email` format.
    #[must_use]
    pub fn email(email: impl Into<String>) -> Self {
        Self::Email {
            email: email.into(),
        }
    }

    /// `iss_sub` format.
    #[must_use]
    pub fn iss_sub(iss: impl Into<String>, sub: impl Into<String>) -> Self {
        Self::IssuerSubject {
            iss: iss.into(),
            sub: sub.into(),
        }
    }

    /// `opaque` format.
    #[must_use]
    pub fn opaque(id: impl Into<String>) -> Self {
        Self::Opaque { id: id.into() }
    }

    /// `phone_number` format.
    #[must_use]
    pub fn phone_number(phone_number: impl Into<String>) -> Self {
        Self::PhoneNumber {
            phone_number: phone_number.into(),
        }
    }

    /// `did` format.
    #[must_use]
    pub fn did(url: impl Into<String>) -> Self {
        Self::Did { url: url.into() }
    }

    /// `uri` format.
    #[must_use]
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri { uri: uri.into() }
    }

    /// `aliases` format.
    #[must_use]
    pub fn aliases(identifiers: impl IntoIterator<Item = Self>) -> Self {
        Self::Aliases {
            identifiers: identifiers.into_iter().collect(),
        }
    }

    /// The wire value of the `format` member.
    #[must_use]
    pub const fn format(&self) -> &'static str {
        match self {
            Self::Account { .. } => "account",
            Self::Email { .. } => "email",
            Self::IssuerSubject { .. } => "iss_sub",
            Self::Opaque { .. } => "opaque",
            Self::PhoneNumber { .. } => "phone_number",
            Self::Did { .. } => "did",
            Self::Uri { .. } => "uri",
            Self::Aliases { .. } => "aliases",
        }
    }
}

/// Subject made of several role-tagged identifiers, e.g. a user on a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplexSubject(BTreeMap<String, SubjectIdentifier>);

impl ComplexSubject {
    /// Empty complex subject.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the identifier for `role`.
    #[must_use]
    pub fn with(mut self, role: impl Into<String>, id: SubjectIdentifier) -> Self {
        self.0.insert(role.into(), id);
        self
    }

    /// Set the `user` role.
    #[must_use]
    pub fn user(self, id: SubjectIdentifier) -> Self {
        self.with("user", id)
    }

    /// Set the `device` role.
    #[must_use]
    pub fn device(self, id: SubjectIdentifier) -> Self {
        self.with("device", id)
    }

    /// Set the `session` role.
    #[must_use]
    pub fn session(self, id: SubjectIdentifier) -> Self {
        self.with("session", id)
    }

    /// Set the `tenant` role.
    #[must_use]
    pub fn tenant(self, id: SubjectIdentifier) -> Self {
        self.with("tenant", id)
    }

    /// Set the `application` role.
    #[must_use]
    pub fn application(self, id: SubjectIdentifier) -> Self {
        self.with("application", id)
    }

    /// Set the `org_unit` role.
    #[must_use]
    pub fn org_unit(self, id: SubjectIdentifier) -> Self {
        self.with("org_unit", id)
    }

    /// Set the `group` role.
    #[must_use]
    pub fn group(self, id: SubjectIdentifier) -> Self {
        self.with("group", id)
    }

    /// Identifier for `role`, if present.
    #[must_use]
    pub fn get(&self, role: &str) -> Option<&SubjectIdentifier> {
        self.0.get(role)
    }

    /// Role names present.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no roles are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The `subject` member of an event: simple, complex, or a shape this crate
/// does not model (`jwt_id`, `ip_addresses`, `saml_assertion_id`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventSubject {
    /// One identifier
    Simple(SubjectIdentifier),
    /// Role-tagged identifiers
    Complex(ComplexSubject),
    /// Any other subject, kept as received
    Other(Value),
}

impl EventSubject {
    /// The `format` member, for simple subjects and unmodelled subjects
    /// that carry one.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        match self {
            Self::Simple(id) => Some(id.format()),
            Self::Complex(_) => None,
            Self::Other(value) => value.get("format").and_then(Value::as_str),
        }
    }

    /// Whether the subject is one of the modelled shapes.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<SubjectIdentifier> for EventSubject {
    fn from(id: SubjectIdentifier) -> Self {
        Self::Simple(id)
    }
}

impl From<ComplexSubject> for EventSubject {
    fn from(subject: ComplexSubject) -> Self {
        Self::Complex(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_email_wire_format() {
        let value = serde_json::to_value(SubjectIdentifier::email("user@example.com")).unwrap();
        assert_eq!(value, json!({"format": "email", "email": "user@example.com"}));
    }

    #[test]
    fn test_iss_sub_wire_format() {
        let id = SubjectIdentifier::iss_sub("https://idp.example.com", "user-123");
        let value = serde_json::to_value(&id).unwrap();
        assert_eq!(
            value,
            json!({"format": "iss_sub", "iss": "https://idp.example.com", "sub": "user-123"})
        );
        assert_eq!(id.format(), "iss_sub");
    }

    #[test]
    fn test_nested_aliases_parse() {
        let value = json!({
            "format": "aliases",
            "identifiers": [
                {"format": "email", "email": "user@example.com"},
                {"format": "aliases", "identifiers": [{"format": "opaque", "id": "abc"}]}
            ]
        });
        let id: SubjectIdentifier = serde_json::from_value(value).unwrap();
        match id {
            SubjectIdentifier::Aliases { identifiers } => {
                assert_eq!(identifiers.len(), 2);
                assert_eq!(identifiers[1].format(), "aliases");
            }
            other => panic!("unexpected subject {other:?}"),
        }
    }

    #[test]
    fn test_event_subject_discriminates_complex() {
        let complex: EventSubject = serde_json::from_value(json!({
            "user": {"format": "email", "email": "user@example.com"},
            "device": {"format": "opaque", "id": "device-1"}
        }))
        .unwrap();
        let EventSubject::Complex(subject) = complex else {
            panic!("expected complex subject");
        };
        assert_eq!(subject.len(), 2);
        assert_eq!(subject.get("device"), Some(&SubjectIdentifier::opaque("device-1")));

        let simple: EventSubject =
            serde_json::from_value(json!({"format": "did", "url": "did:example:123"})).unwrap();
        assert_eq!(simple, EventSubject::Simple(SubjectIdentifier::did("did:example:123")));
    }

    #[test]
    fn test_unmodelled_formats_are_kept() {
        let jwt_id = json!({"format": "jwt_id", "iss": "https://idp.example.com", "jti": "t-1"});
        let subject: EventSubject = serde_json::from_value(jwt_id.clone()).unwrap();
        assert!(!subject.is_known());
        assert_eq!(subject.format(), Some("jwt_id"));
        assert_eq!(serde_json::to_value(&subject).unwrap(), jwt_id);

        let ips = json!({"format": "ip_addresses", "ip_addresses": ["10.0.0.1", "::1"]});
        let subject: EventSubject = serde_json::from_value(ips).unwrap();
        assert_eq!(subject.format(), Some("ip_addresses"));

        let bare: EventSubject = serde_json::from_value(json!("user-123")).unwrap();
        assert_eq!(bare, EventSubject::Other(json!("user-123")));
        assert_eq!(bare.format(), None);
    }

    #[test]
    fn test_complex_subject_roles() {
        let subject = ComplexSubject::new()
            .user(SubjectIdentifier::email("user@example.com"))
            .tenant(SubjectIdentifier::opaque("tenant-9"))
            .with("custom-role", SubjectIdentifier::uri("https://example.com/x"));

        let roles: Vec<&str> = subject.roles().collect();
        assert_eq!(roles, vec!["custom-role", "tenant", "user"]);
    }
}
