//! Event-type registry and event data structures.
//!
//! Event types are grouped into three families: CAEP 1.0 continuous access
//! evaluation, SSF 1.0 stream management and RISC 1.0 account lifecycle.
//! The URIs are used as map keys in the `events` claim and must match
//! byte-for-byte.

use crate::subject::EventSubject;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// CAEP 1.0 event-type URIs.
pub mod caep {
    /// Session revoked
    pub const SESSION_REVOKED: &str =
        "https://schemas.openid.net/secevent/caep/event-type/session-revoked";
    /// Token claims changed
    pub const TOKEN_CLAIMS_CHANGE: &str =
        "https://schemas.openid.net/secevent/caep/event-type/token-claims-change";
    /// Credential added, removed or modified
    pub const CREDENTIAL_CHANGE: &str =
        "https://schemas.openid.net/secevent/caep/event-type/credential-change";
    /// Assurance level changed
    pub const ASSURANCE_LEVEL_CHANGE: &str =
        "https://schemas.openid.net/secevent/caep/event-type/assurance-level-change";
    /// Device compliance status changed
    pub const DEVICE_COMPLIANCE_CHANGE: &str =
        "https://schemas.openid.net/secevent/caep/event-type/device-compliance-change";
}

/// SSF 1.0 stream-management event-type URIs.
pub mod ssf {
    /// Stream status updated
    pub const STREAM_UPDATED: &str =
        "https://schemas.openid.net/secevent/ssf/event-type/stream-updated";
    /// Stream verification
    pub const VERIFICATION: &str =
        "https://schemas.openid.net/secevent/ssf/event-type/verification";
}

/// RISC 1.0 account-lifecycle event-type URIs.
pub mod risc {
    /// Account credential change required
    pub const ACCOUNT_CREDENTIAL_CHANGE_REQUIRED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/account-credential-change-required";
    /// Account purged
    pub const ACCOUNT_PURGED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/account-purged";
    /// Account disabled
    pub const ACCOUNT_DISABLED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/account-disabled";
    /// Account enabled
    pub const ACCOUNT_ENABLED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/account-enabled";
    /// Identifier changed
    pub const IDENTIFIER_CHANGED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/identifier-changed";
    /// Identifier recycled
    pub const IDENTIFIER_RECYCLED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/identifier-recycled";
    /// Opted in
    pub const OPT_IN: &str = "https://schemas.openid.net/secevent/risc/event-type/opt-in";
    /// Opt-out initiated
    pub const OPT_OUT_INITIATED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/opt-out-initiated";
    /// Opt-out cancelled
    pub const OPT_OUT_CANCELLED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/opt-out-cancelled";
    /// Opt-out effective
    pub const OPT_OUT_EFFECTIVE: &str =
        "https://schemas.openid.net/secevent/risc/event-type/opt-out-effective";
    /// Recovery activated
    pub const RECOVERY_ACTIVATED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/recovery-activated";
    /// Recovery information changed
    pub const RECOVERY_INFORMATION_CHANGED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/recovery-information-changed";
    /// All sessions revoked
    pub const SESSIONS_REVOKED: &str =
        "https://schemas.openid.net/secevent/risc/event-type/sessions-revoked";
}

/// Event-type family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    /// Continuous access evaluation
    Caep,
    /// Stream management
    Ssf,
    /// Risk and account lifecycle
    Risc,
}

/// Every event type in the catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SecEventType {
    /// Session has been revoked
    SessionRevoked,
    /// Token claims have been updated
    TokenClaimsChange,
    /// Credential has changed (added, removed, or modified)
    CredentialChange,
    /// User's assurance level has changed
    AssuranceLevelChange,
    /// Device compliance status has changed
    DeviceComplianceChange,
    /// Stream status changed
    StreamUpdated,
    /// Stream verification
    Verification,
    /// Credential change required
    AccountCredentialChangeRequired,
    /// Account purged
    AccountPurged,
    /// Account disabled
    AccountDisabled,
    /// Account enabled
    AccountEnabled,
    /// Identifier changed
    IdentifierChanged,
    /// Identifier recycled
    IdentifierRecycled,
    /// Opted in
    OptIn,
    /// Opt-out initiated
    OptOutInitiated,
    /// Opt-out cancelled
    OptOutCancelled,
    /// Opt-out effective
    OptOutEffective,
    /// Recovery activated
    RecoveryActivated,
    /// Recovery information changed
    RecoveryInformationChanged,
    /// All sessions revoked
    SessionsRevoked,
}

impl SecEventType {
    /// The whole catalog, CAEP first, then SSF, then RISC.
    pub const ALL: [Self; 20] = [
        Self::SessionRevoked,
        Self::TokenClaimsChange,
        Self::CredentialChange,
        Self::AssuranceLevelChange,
        Self::DeviceComplianceChange,
        Self::StreamUpdated,
        Self::Verification,
        Self::AccountCredentialChangeRequired,
        Self::AccountPurged,
        Self::AccountDisabled,
        Self::AccountEnabled,
        Self::IdentifierChanged,
        Self::IdentifierRecycled,
        Self::OptIn,
        Self::OptOutInitiated,
        Self::OptOutCancelled,
        Self::OptOutEffective,
        Self::RecoveryActivated,
        Self::RecoveryInformationChanged,
        Self::SessionsRevoked,
    ];

    /// Get the full URI for this event type
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::SessionRevoked => caep::SESSION_REVOKED,
            Self::TokenClaimsChange => caep::TOKEN_CLAIMS_CHANGE,
            Self::CredentialChange => caep::CREDENTIAL_CHANGE,
            Self::AssuranceLevelChange => caep::ASSURANCE_LEVEL_CHANGE,
            Self::DeviceComplianceChange => caep::DEVICE_COMPLIANCE_CHANGE,
            Self::StreamUpdated => ssf::STREAM_UPDATED,
            Self::Verification => ssf::VERIFICATION,
            Self::AccountCredentialChangeRequired => risc::ACCOUNT_CREDENTIAL_CHANGE_REQUIRED,
            Self::AccountPurged => risc::ACCOUNT_PURGED,
            Self::AccountDisabled => risc::ACCOUNT_DISABLED,
            Self::AccountEnabled => risc::ACCOUNT_ENABLED,
            Self::IdentifierChanged => risc::IDENTIFIER_CHANGED,
            Self::IdentifierRecycled => risc::IDENTIFIER_RECYCLED,
            Self::OptIn => risc::OPT_IN,
            Self::OptOutInitiated => risc::OPT_OUT_INITIATED,
            Self::OptOutCancelled => risc::OPT_OUT_CANCELLED,
            Self::OptOutEffective => risc::OPT_OUT_EFFECTIVE,
            Self::RecoveryActivated => risc::RECOVERY_ACTIVATED,
            Self::RecoveryInformationChanged => risc::RECOVERY_INFORMATION_CHANGED,
            Self::SessionsRevoked => risc::SESSIONS_REVOKED,
        }
    }

    /// Look up a catalog entry by URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.uri() == uri)
    }

    /// Family this event type belongs to.
    #[must_use]
    pub const fn family(self) -> EventFamily {
        match self {
            Self::SessionRevoked
            | Self::TokenClaimsChange
            | Self::CredentialChange
            | Self::AssuranceLevelChange
            | Self::DeviceComplianceChange => EventFamily::Caep,
            Self::StreamUpdated | Self::Verification => EventFamily::Ssf,
            _ => EventFamily::Risc,
        }
    }
}

impl fmt::Display for SecEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $wire)] $variant),+
        }

        impl $name {
            /// Wire representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }
    };
}

wire_enum!(
    /// Who or what initiated a CAEP event.
    InitiatingEntity {
        /// An administrator
        Admin => "admin",
        /// The subject themselves
        User => "user",
        /// A policy evaluation
        Policy => "policy",
        /// The system
        System => "system",
    }
);

wire_enum!(
    /// `change_type` of a credential-change event.
    ChangeType {
        /// Credential created
        Create => "create",
        /// Credential revoked
        Revoke => "revoke",
        /// Credential updated
        Update => "update",
        /// Credential deleted
        Delete => "delete",
    }
);

wire_enum!(
    /// `change_direction` of an assurance-level-change event.
    ChangeDirection {
        /// Level went up
        Increase => "increase",
        /// Level went down
        Decrease => "decrease",
    }
);

wire_enum!(
    /// Device compliance status.
    ComplianceStatus {
        /// Compliant
        Compliant => "compliant",
        /// Not compliant
        NotCompliant => "not-compliant",
    }
);

wire_enum!(
    /// Stream status carried by stream-updated events.
    StreamStatus {
        /// Events are delivered
        Enabled => "enabled",
        /// Events are held
        Paused => "paused",
        /// Events are dropped
        Disabled => "disabled",
    }
);

wire_enum!(
    /// `reason` of a RISC account-disabled event.
    AccountDisabledReason {
        /// Account hijacked
        Hijacking => "hijacking",
        /// Part of a bulk-account operation
        BulkAccount => "bulk-account",
    }
);

/// Human-readable text keyed by language tag, e.g. `{"en": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    /// English text.
    #[must_use]
    pub fn en(text: impl Into<String>) -> Self {
        Self::default().with("en", text)
    }

    /// Add text for another language.
    #[must_use]
    pub fn with(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(lang.into(), text.into());
        self
    }

    /// Text for `lang`, if present.
    #[must_use]
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0.get(lang).map(String::as_str)
    }

    fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Optional members shared by event factories.
#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    /// `event_timestamp`, seconds since the epoch
    pub event_timestamp: Option<i64>,
    /// `initiating_entity`
    pub initiating_entity: Option<InitiatingEntity>,
    /// `reason_admin`
    pub reason_admin: Option<LocalizedText>,
    /// `reason_user`
    pub reason_user: Option<LocalizedText>,
}

impl EventOptions {
    /// Set the event timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: i64) -> Self {
        self.event_timestamp = Some(timestamp);
        self
    }

    /// Set the event timestamp to now.
    #[must_use]
    pub fn now(self) -> Self {
        self.at(chrono::Utc::now().timestamp())
    }

    /// Set the initiating entity.
    #[must_use]
    pub const fn initiated_by(mut self, entity: InitiatingEntity) -> Self {
        self.initiating_entity = Some(entity);
        self
    }

    /// Set the admin-facing reason.
    #[must_use]
    pub fn reason_admin(mut self, reason: LocalizedText) -> Self {
        self.reason_admin = Some(reason);
        self
    }

    /// Set the user-facing reason.
    #[must_use]
    pub fn reason_user(mut self, reason: LocalizedText) -> Self {
        self.reason_user = Some(reason);
        self
    }
}

/// Optional members of a credential-change event.
#[derive(Debug, Clone, Default)]
pub struct CredentialDetails {
    /// `friendly_name`
    pub friendly_name: Option<String>,
    /// `x509_issuer`
    pub x509_issuer: Option<String>,
    /// `x509_serial`
    pub x509_serial: Option<String>,
    /// `fido2_aaguid`
    pub fido2_aaguid: Option<String>,
}

/// Data of a single event: an optional subject plus event-specific members.
///
/// An event value that is not a JSON object is kept as received and
/// serialized back unchanged; see [`EventData::opaque`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventData {
    /// Subject of the event
    pub subject: Option<EventSubject>,
    /// Event-specific members
    pub fields: Map<String, Value>,
    opaque: Option<Value>,
}

impl Serialize for EventData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(value) = &self.opaque {
            return value.serialize(serializer);
        }
        let mut map = serializer.serialize_map(None)?;
        if let Some(subject) = &self.subject {
            map.serialize_entry("subject", subject)?;
        }
        for (name, value) in &self.fields {
            // A typed subject takes precedence over a raw `subject` member.
            if self.subject.is_none() || name != "subject" {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = match Value::deserialize(deserializer)? {
            Value::Object(fields) => fields,
            other => {
                return Ok(Self {
                    opaque: Some(other),
                    ..Self::default()
                });
            }
        };
        let subject = match fields.remove("subject") {
            None | Some(Value::Null) => None,
            Some(value) => {
                Some(serde_json::from_value(value).map_err(<D::Error as de::Error>::custom)?)
            }
        };
        Ok(Self {
            subject,
            fields,
            opaque: None,
        })
    }
}

impl EventData {
    /// Empty event data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Event data about `subject`.
    #[must_use]
    pub fn about(subject: impl Into<EventSubject>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// The received value when the event was not a JSON object.
    #[must_use]
    pub const fn opaque(&self) -> Option<&Value> {
        self.opaque.as_ref()
    }

    /// Set the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<EventSubject>) -> Self {
        self.subject = Some(subject.into());
        self.opaque = None;
        self
    }

    /// Set an event-specific member.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self.opaque = None;
        self
    }

    /// Set an event-specific member only when `value` is present.
    #[must_use]
    pub fn with_optional(self, name: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.with_field(name, v),
            None => self,
        }
    }

    /// Apply shared options; absent options add nothing.
    #[must_use]
    pub fn with_options(self, options: &EventOptions) -> Self {
        self.with_optional("event_timestamp", options.event_timestamp)
            .with_optional(
                "initiating_entity",
                options.initiating_entity.map(InitiatingEntity::as_str),
            )
            .with_optional(
                "reason_admin",
                options.reason_admin.as_ref().map(LocalizedText::to_value),
            )
            .with_optional(
                "reason_user",
                options.reason_user.as_ref().map(LocalizedText::to_value),
            )
    }

    /// Event-specific member by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// `event_timestamp`, when present and integral.
    #[must_use]
    pub fn event_timestamp(&self) -> Option<i64> {
        self.field("event_timestamp").and_then(Value::as_i64)
    }
}

/// The `events` claim: event-type URI to event data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityEvent(BTreeMap<String, EventData>);

impl SecurityEvent {
    /// Empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-entry mapping.
    #[must_use]
    pub fn single(uri: impl Into<String>, data: EventData) -> Self {
        let mut events = Self::new();
        events.insert(uri, data);
        events
    }

    /// Single-entry mapping for a catalog event type.
    #[must_use]
    pub fn of(event_type: SecEventType, data: EventData) -> Self {
        Self::single(event_type.uri(), data)
    }

    /// Insert an entry, returning the data it replaced.
    pub fn insert(&mut self, uri: impl Into<String>, data: EventData) -> Option<EventData> {
        self.0.insert(uri.into(), data)
    }

    /// Shallow merge keyed by URI; entries of `other` win.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Data for `uri`.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&EventData> {
        self.0.get(uri)
    }

    /// Whether `uri` is present.
    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.0.contains_key(uri)
    }

    /// Event-type URIs present.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no events are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(uri, data)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventData)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// CAEP session-revoked.
    #[must_use]
    pub fn session_revoked(subject: impl Into<EventSubject>, options: &EventOptions) -> Self {
        Self::of(
            SecEventType::SessionRevoked,
            EventData::about(subject).with_options(options),
        )
    }

    /// CAEP token-claims-change.
    #[must_use]
    pub fn token_claims_change(
        subject: impl Into<EventSubject>,
        claims: Map<String, Value>,
        options: &EventOptions,
    ) -> Self {
        Self::of(
            SecEventType::TokenClaimsChange,
            EventData::about(subject)
                .with_options(options)
                .with_field("claims", claims),
        )
    }

    /// CAEP credential-change.
    #[must_use]
    pub fn credential_change(
        subject: impl Into<EventSubject>,
        credential_type: impl Into<String>,
        change_type: ChangeType,
        details: CredentialDetails,
        options: &EventOptions,
    ) -> Self {
        Self::of(
            SecEventType::CredentialChange,
            EventData::about(subject)
                .with_options(options)
                .with_field("credential_type", credential_type.into())
                .with_field("change_type", change_type.as_str())
                .with_optional("friendly_name", details.friendly_name)
                .with_optional("x509_issuer", details.x509_issuer)
                .with_optional("x509_serial", details.x509_serial)
                .with_optional("fido2_aaguid", details.fido2_aaguid),
        )
    }

    /// CAEP assurance-level-change.
    #[must_use]
    pub fn assurance_level_change(
        subject: impl Into<EventSubject>,
        namespace: impl Into<String>,
        current_level: impl Into<String>,
        previous_level: Option<String>,
        change_direction: Option<ChangeDirection>,
        options: &EventOptions,
    ) -> Self {
        Self::of(
            SecEventType::AssuranceLevelChange,
            EventData::about(subject)
                .with_options(options)
                .with_field("namespace", namespace.into())
                .with_field("current_level", current_level.into())
                .with_optional("previous_level", previous_level)
                .with_optional("change_direction", change_direction.map(ChangeDirection::as_str)),
        )
    }

    /// CAEP device-compliance-change.
    #[must_use]
    pub fn device_compliance_change(
        subject: impl Into<EventSubject>,
        previous_status: ComplianceStatus,
        current_status: ComplianceStatus,
        options: &EventOptions,
    ) -> Self {
        Self::of(
            SecEventType::DeviceComplianceChange,
            EventData::about(subject)
                .with_options(options)
                .with_field("previous_status", previous_status.as_str())
                .with_field("current_status", current_status.as_str()),
        )
    }

    /// SSF stream-updated.
    #[must_use]
    pub fn stream_updated(
        subject: impl Into<EventSubject>,
        status: StreamStatus,
        reason: Option<String>,
    ) -> Self {
        Self::of(
            SecEventType::StreamUpdated,
            EventData::about(subject)
                .with_field("status", status.as_str())
                .with_optional("reason", reason),
        )
    }

    /// SSF verification, echoing the receiver-supplied `state`.
    #[must_use]
    pub fn verification(state: Option<String>) -> Self {
        Self::of(
            SecEventType::Verification,
            EventData::new().with_optional("state", state),
        )
    }

    /// RISC account-disabled.
    #[must_use]
    pub fn account_disabled(
        subject: impl Into<EventSubject>,
        reason: Option<AccountDisabledReason>,
        options: &EventOptions,
    ) -> Self {
        Self::of(
            SecEventType::AccountDisabled,
            EventData::about(subject)
                .with_options(options)
                .with_optional("reason", reason.map(AccountDisabledReason::as_str)),
        )
    }

    /// RISC identifier-changed.
    #[must_use]
    pub fn identifier_changed(
        subject: impl Into<EventSubject>,
        new_value: Option<String>,
        options: &EventOptions,
    ) -> Self {
        Self::of(
            SecEventType::IdentifierChanged,
            EventData::about(subject)
                .with_options(options)
                .with_optional("new-value", new_value),
        )
    }

    /// Any RISC event whose only members are the subject and shared options,
    /// e.g. account-purged or opt-in.
    #[must_use]
    pub fn risc(
        event_type: SecEventType,
        subject: impl Into<EventSubject>,
        options: &EventOptions,
    ) -> Self {
        Self::of(event_type, EventData::about(subject).with_options(options))
    }
}

impl IntoIterator for SecurityEvent {
    type Item = (String, EventData);
    type IntoIter = std::collections::btree_map::IntoIter<String, EventData>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, EventData)> for SecurityEvent {
    fn from_iter<I: IntoIterator<Item = (String, EventData)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
