//! Protocol envelopes.
//!
//! An [`Envelope`] is the unit exchanged over the transport. Fields are
//! private and there are no setters: an envelope is immutable once built.
//! The `with_*` methods return a new envelope and leave the original alone.
//!
//! # Invariants
//!
//! - `Message` and `Join` envelopes always carry a sender and a destination.
//! - `LoginResult` and `SignupResult` always carry a status.
//! - Only `Login` and `Signup` carry a password.
//!
//! Constructors enforce these, and the decoder rejects frames that would
//! violate them.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};

use crate::{Destination, UserId};

/// Envelope type, mirroring the wire `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Client credential submission for an existing account.
    Login,
    /// Client request to register a new account.
    Signup,
    /// Server verdict on a `Login`.
    LoginResult,
    /// Server verdict on a `Signup`.
    SignupResult,
    /// Client announcement that it opened a conversation.
    Join,
    /// Chat message addressed to a peer or a room.
    Message,
    /// Any type this revision does not know. Carries the raw wire name.
    Unknown(String),
}

impl EnvelopeKind {
    /// Name used in the wire `type` field.
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Login => "login",
            Self::Signup => "signup",
            Self::LoginResult => "login_response",
            Self::SignupResult => "signup_response",
            Self::Join => "join",
            Self::Message => "message",
            Self::Unknown(name) => name,
        }
    }

    /// Parse a wire `type` field. Never fails.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "login" => Self::Login,
            "signup" => Self::Signup,
            "login_response" => Self::LoginResult,
            "signup_response" => Self::SignupResult,
            "join" => Self::Join,
            "message" => Self::Message,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// True for `LoginResult` and `SignupResult`.
    pub fn is_result(&self) -> bool {
        matches!(self, Self::LoginResult | Self::SignupResult)
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Outcome carried by result envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Request accepted.
    Success,
    /// Request refused; the envelope payload says why.
    Failure,
}

impl Status {
    /// Name used in the wire `status` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Wall-clock time attached to a message.
///
/// Older protocol revisions sent no timestamp at all, so absence is a normal
/// value rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timestamp {
    /// No timestamp on the wire. Rendered without a time label.
    #[default]
    Unknown,
    /// Known instant, millisecond precision.
    At(DateTime<Utc>),
}

impl Timestamp {
    /// Timestamp truncated to millisecond precision.
    ///
    /// The wire format carries milliseconds, so truncating up front keeps a
    /// locally stamped envelope equal to its decoded echo.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::At(instant.trunc_subsecs(3))
    }

    /// The instant, if known.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unknown => None,
            Self::At(instant) => Some(*instant),
        }
    }

    /// True when the wire carried a usable timestamp.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::At(_))
    }

    /// `HH:MM` label for display. `None` when unknown.
    pub fn label(&self) -> Option<String> {
        self.instant().map(|instant| instant.format("%H:%M").to_string())
    }
}

/// One immutable unit of protocol data.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: EnvelopeKind,
    sender: Option<UserId>,
    destination: Option<Destination>,
    payload: String,
    password: Option<String>,
    status: Option<Status>,
    timestamp: Timestamp,
}

impl Envelope {
    /// Upper bound on an encoded frame. Larger inbound frames are malformed.
    pub const MAX_FRAME_SIZE: usize = 64 * 1024;

    fn bare(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            sender: None,
            destination: None,
            payload: String::new(),
            password: None,
            status: None,
            timestamp: Timestamp::Unknown,
        }
    }

    /// Login request with credentials.
    pub fn login(user: UserId, password: impl Into<String>) -> Self {
        Self {
            sender: Some(user),
            password: Some(password.into()),
            ..Self::bare(EnvelopeKind::Login)
        }
    }

    /// Login request without a password, as sent by the oldest clients.
    pub fn bare_login(user: UserId) -> Self {
        Self { sender: Some(user), ..Self::bare(EnvelopeKind::Login) }
    }

    /// Account registration request.
    pub fn signup(user: UserId, password: impl Into<String>) -> Self {
        Self {
            sender: Some(user),
            password: Some(password.into()),
            ..Self::bare(EnvelopeKind::Signup)
        }
    }

    /// Server reply to a login.
    pub fn login_result(status: Status, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            payload: message.into(),
            ..Self::bare(EnvelopeKind::LoginResult)
        }
    }

    /// Server reply to a signup.
    pub fn signup_result(status: Status, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            payload: message.into(),
            ..Self::bare(EnvelopeKind::SignupResult)
        }
    }

    /// Announce that `user` opened the conversation at `destination`.
    pub fn join(user: UserId, destination: Destination) -> Self {
        Self {
            sender: Some(user),
            destination: Some(destination),
            ..Self::bare(EnvelopeKind::Join)
        }
    }

    /// Chat message from `sender` to `destination`.
    pub fn message(
        sender: UserId,
        destination: Destination,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            sender: Some(sender),
            destination: Some(destination),
            payload: content.into(),
            timestamp,
            ..Self::bare(EnvelopeKind::Message)
        }
    }

    /// Envelope of a type this revision does not understand.
    pub fn unknown(kind: impl Into<String>) -> Self {
        Self::bare(EnvelopeKind::Unknown(kind.into()))
    }

    /// Copy of this envelope with the sender replaced.
    #[must_use]
    pub fn with_sender(&self, sender: UserId) -> Self {
        Self { sender: Some(sender), ..self.clone() }
    }

    /// Copy of this envelope with the timestamp replaced.
    #[must_use]
    pub fn with_timestamp(&self, timestamp: Timestamp) -> Self {
        Self { timestamp, ..self.clone() }
    }

    /// Envelope type.
    pub fn kind(&self) -> &EnvelopeKind {
        &self.kind
    }

    /// Originating user. `None` for server results and unknown envelopes.
    pub fn sender(&self) -> Option<&UserId> {
        self.sender.as_ref()
    }

    /// Target of a message or join. `None` for other kinds.
    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    /// Message content, or the human-readable message of a result.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Password of a credential envelope.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Status of a result envelope.
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// True for a result envelope with `Status::Success`.
    pub fn is_success(&self) -> bool {
        self.status == Some(Status::Success)
    }

    /// Message timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("kind", &self.kind)
            .field("sender", &self.sender)
            .field("destination", &self.destination)
            .field("payload", &self.payload)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("status", &self.status)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn kind_wire_names_round_trip() {
        for kind in [
            EnvelopeKind::Login,
            EnvelopeKind::Signup,
            EnvelopeKind::LoginResult,
            EnvelopeKind::SignupResult,
            EnvelopeKind::Join,
            EnvelopeKind::Message,
        ] {
            assert_eq!(EnvelopeKind::from_wire(kind.wire_name()), kind);
        }
    }

    #[test]
    fn unrecognized_kind_is_kept_verbatim() {
        let kind = EnvelopeKind::from_wire("typing");
        assert_eq!(kind, EnvelopeKind::Unknown("typing".to_string()));
        assert_eq!(kind.wire_name(), "typing");
    }

    #[test]
    fn timestamp_is_truncated_to_millis() {
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let stamped = Timestamp::at(precise);
        assert_eq!(stamped.instant().unwrap().timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn unknown_timestamp_has_no_label() {
        assert_eq!(Timestamp::Unknown.label(), None);
        let known = Timestamp::at(Utc.with_ymd_and_hms(2024, 5, 1, 9, 7, 0).unwrap());
        assert_eq!(known.label().as_deref(), Some("09:07"));
    }

    #[test]
    fn debug_output_redacts_password() {
        let login = Envelope::login(UserId::new("alice"), "hunter2");
        let rendered = format!("{login:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn with_sender_leaves_original_untouched() {
        let original = Envelope::message(
            UserId::new("mallory"),
            Destination::room("general"),
            "hi",
            Timestamp::Unknown,
        );
        let rewritten = original.with_sender(UserId::new("alice"));

        assert_eq!(original.sender().map(UserId::as_str), Some("mallory"));
        assert_eq!(rewritten.sender().map(UserId::as_str), Some("alice"));
        assert_eq!(rewritten.payload(), "hi");
    }
}
