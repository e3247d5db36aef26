//! JSON wire codec.
//!
//! Frames are JSON objects with a mandatory `type` field. The field set has
//! drifted across protocol revisions, so decoding goes through a permissive
//! [`WireEnvelope`] and a single normalization step that produces an
//! [`Envelope`] or a [`ProtocolError`].
//!
//! # Normalization
//!
//! - Sender is read from `from`, falling back to `username`.
//! - Addressing mode is detected from which of `to` / `room` is present.
//!   Exactly one is required for `message` and `join`.
//! - A missing, null, or unparseable `timestamp` becomes
//!   [`Timestamp::Unknown`].
//! - A `login` without `password` is the legacy bare login and is accepted.
//! - Unknown `type` values become [`EnvelopeKind::Unknown`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    Destination, Envelope, EnvelopeKind, RoomId, Status, Timestamp, UserId,
    errors::{ProtocolError, Result},
};

/// Raw frame shape accepted from the wire. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
}

/// Encode an envelope as a JSON text frame.
///
/// Total: every [`Envelope`] that can be constructed has a wire form.
pub fn encode(envelope: &Envelope) -> String {
    let mut map = Map::new();
    map.insert("type".into(), Value::from(envelope.kind().wire_name()));

    match envelope.kind() {
        EnvelopeKind::Login | EnvelopeKind::Signup => {
            insert_user(&mut map, "username", envelope.sender());
            if let Some(password) = envelope.password() {
                map.insert("password".into(), Value::from(password));
            }
        },
        EnvelopeKind::LoginResult | EnvelopeKind::SignupResult => {
            if let Some(status) = envelope.status() {
                map.insert("status".into(), Value::from(status.wire_name()));
            }
            map.insert("message".into(), Value::from(envelope.payload()));
        },
        EnvelopeKind::Join => {
            insert_user(&mut map, "username", envelope.sender());
            insert_destination(&mut map, envelope.destination());
        },
        EnvelopeKind::Message => {
            insert_user(&mut map, "from", envelope.sender());
            insert_destination(&mut map, envelope.destination());
            map.insert("content".into(), Value::from(envelope.payload()));
            if let Some(instant) = envelope.timestamp().instant() {
                map.insert(
                    "timestamp".into(),
                    Value::from(instant.to_rfc3339_opts(SecondsFormat::Millis, true)),
                );
            }
        },
        EnvelopeKind::Unknown(_) => {
            insert_user(&mut map, "from", envelope.sender());
        },
    }

    Value::Object(map).to_string()
}

/// Decode a text frame.
///
/// # Errors
///
/// - `ProtocolError::FrameTooLarge` if the frame exceeds
///   [`Envelope::MAX_FRAME_SIZE`]
/// - `ProtocolError::Malformed` if the frame is not a JSON object with a
///   string `type`, or violates an envelope invariant
pub fn decode(frame: &str) -> Result<Envelope> {
    check_size(frame.len())?;
    let wire: WireEnvelope = serde_json::from_str(frame)?;
    normalize(wire)
}

/// Decode a frame received as raw bytes. Non-UTF-8 input is malformed.
pub fn decode_bytes(frame: &[u8]) -> Result<Envelope> {
    check_size(frame.len())?;
    let wire: WireEnvelope = serde_json::from_slice(frame)?;
    normalize(wire)
}

fn check_size(size: usize) -> Result<()> {
    if size > Envelope::MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size, max: Envelope::MAX_FRAME_SIZE });
    }
    Ok(())
}

fn normalize(wire: WireEnvelope) -> Result<Envelope> {
    let kind = EnvelopeKind::from_wire(&wire.kind);

    match &kind {
        EnvelopeKind::Login => {
            let user = required_user(wire.username.or(wire.from), &kind, "username")?;
            Ok(match wire.password {
                Some(password) => Envelope::login(user, password),
                None => Envelope::bare_login(user),
            })
        },
        EnvelopeKind::Signup => {
            let user = required_user(wire.username.or(wire.from), &kind, "username")?;
            let password = wire.password.ok_or_else(|| missing(&kind, "password"))?;
            Ok(Envelope::signup(user, password))
        },
        EnvelopeKind::LoginResult | EnvelopeKind::SignupResult => {
            let status = parse_status(wire.status.as_deref(), &kind)?;
            let message = wire.message.unwrap_or_default();
            Ok(if matches!(kind, EnvelopeKind::LoginResult) {
                Envelope::login_result(status, message)
            } else {
                Envelope::signup_result(status, message)
            })
        },
        EnvelopeKind::Join => {
            let user = required_user(wire.from.or(wire.username), &kind, "from")?;
            let destination = parse_destination(wire.to, wire.room, &kind)?;
            Ok(Envelope::join(user, destination))
        },
        EnvelopeKind::Message => {
            let sender = required_user(wire.from.or(wire.username), &kind, "from")?;
            let destination = parse_destination(wire.to, wire.room, &kind)?;
            let content = wire.content.ok_or_else(|| missing(&kind, "content"))?;
            let timestamp = parse_timestamp(wire.timestamp.as_ref());
            Ok(Envelope::message(sender, destination, content, timestamp))
        },
        EnvelopeKind::Unknown(name) => {
            tracing::debug!(kind = %name, "decoded envelope of unknown type");
            Ok(Envelope::unknown(name.clone()))
        },
    }
}

fn missing(kind: &EnvelopeKind, field: &str) -> ProtocolError {
    ProtocolError::malformed(format!("{kind} frame missing `{field}`"))
}

fn required_user(value: Option<String>, kind: &EnvelopeKind, field: &str) -> Result<UserId> {
    match value {
        Some(name) if !name.is_empty() => Ok(UserId::new(name)),
        _ => Err(missing(kind, field)),
    }
}

fn parse_destination(
    to: Option<String>,
    room: Option<String>,
    kind: &EnvelopeKind,
) -> Result<Destination> {
    match (to, room) {
        (Some(peer), None) if !peer.is_empty() => Ok(Destination::DirectPeer(UserId::new(peer))),
        (None, Some(room)) if !room.is_empty() => Ok(Destination::Room(RoomId::new(room))),
        (Some(_), Some(_)) => Err(ProtocolError::malformed(format!(
            "{kind} frame carries both `to` and `room`"
        ))),
        _ => Err(ProtocolError::malformed(format!("{kind} frame has no `to` or `room`"))),
    }
}

fn parse_status(status: Option<&str>, kind: &EnvelopeKind) -> Result<Status> {
    match status {
        Some("success") => Ok(Status::Success),
        Some("failure") => Ok(Status::Failure),
        Some(other) => {
            Err(ProtocolError::malformed(format!("{kind} frame has unknown status `{other}`")))
        },
        None => Err(missing(kind, "status")),
    }
}

fn parse_timestamp(value: Option<&Value>) -> Timestamp {
    match value {
        None | Some(Value::Null) => Timestamp::Unknown,
        Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(raw) {
            Ok(instant) => Timestamp::at(instant.with_timezone(&Utc)),
            Err(e) => {
                tracing::debug!(timestamp = %raw, error = %e, "ignoring unparseable timestamp");
                Timestamp::Unknown
            },
        },
        Some(other) => {
            tracing::debug!(timestamp = %other, "ignoring non-string timestamp");
            Timestamp::Unknown
        },
    }
}

fn insert_user(map: &mut Map<String, Value>, field: &str, user: Option<&UserId>) {
    if let Some(user) = user {
        map.insert(field.into(), Value::from(user.as_str()));
    }
}

fn insert_destination(map: &mut Map<String, Value>, destination: Option<&Destination>) {
    match destination {
        Some(Destination::DirectPeer(peer)) => {
            map.insert("to".into(), Value::from(peer.as_str()));
        },
        Some(Destination::Room(room)) => {
            map.insert("room".into(), Value::from(room.as_str()));
        },
        None => {},
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn legacy_message_without_timestamp_decodes() {
        let envelope =
            decode(r#"{"type":"message","from":"alice","to":"bob","content":"hi"}"#).unwrap();

        assert_eq!(envelope.kind(), &EnvelopeKind::Message);
        assert_eq!(envelope.timestamp(), Timestamp::Unknown);
        assert_eq!(envelope.timestamp().label(), None);
        assert_eq!(envelope.destination(), Some(&Destination::peer("bob")));
    }

    #[test]
    fn room_addressing_is_detected() {
        let envelope =
            decode(r#"{"type":"message","from":"bob","room":"general","content":"yo"}"#).unwrap();
        assert_eq!(envelope.destination(), Some(&Destination::room("general")));
    }

    #[test]
    fn both_addressing_fields_is_malformed() {
        let result = decode(r#"{"type":"message","from":"a","to":"b","room":"c","content":"x"}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed { .. })));
    }

    #[test]
    fn missing_addressing_is_malformed() {
        let result = decode(r#"{"type":"join","username":"alice"}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed { .. })));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let envelope = decode(r#"{"type":"typing","from":"bob"}"#).unwrap();
        assert_eq!(envelope.kind(), &EnvelopeKind::Unknown("typing".into()));
    }

    #[test]
    fn missing_type_is_malformed() {
        assert!(decode(r#"{"from":"bob","content":"hi"}"#).is_err());
        assert!(decode("not json").is_err());
        assert!(decode("[1,2,3]").is_err());
    }

    #[test]
    fn bare_login_is_tolerated() {
        let envelope = decode(r#"{"type":"login","username":"alice"}"#).unwrap();
        assert_eq!(envelope.kind(), &EnvelopeKind::Login);
        assert_eq!(envelope.password(), None);
    }

    #[test]
    fn signup_requires_password() {
        assert!(decode(r#"{"type":"signup","username":"alice"}"#).is_err());
    }

    #[test]
    fn response_message_is_kept_verbatim() {
        let envelope = decode(
            r#"{"type":"login_response","status":"failure","message":"Invalid password."}"#,
        )
        .unwrap();
        assert_eq!(envelope.status(), Some(Status::Failure));
        assert_eq!(envelope.payload(), "Invalid password.");
    }

    #[test]
    fn response_with_unknown_status_is_malformed() {
        assert!(decode(r#"{"type":"login_response","status":"maybe"}"#).is_err());
    }

    #[test]
    fn garbage_timestamp_degrades_to_unknown() {
        let envelope = decode(
            r#"{"type":"message","from":"a","room":"r","content":"x","timestamp":"yesterday"}"#,
        )
        .unwrap();
        assert_eq!(envelope.timestamp(), Timestamp::Unknown);

        let envelope =
            decode(r#"{"type":"message","from":"a","room":"r","content":"x","timestamp":17}"#)
                .unwrap();
        assert_eq!(envelope.timestamp(), Timestamp::Unknown);
    }

    #[test]
    fn encoded_message_uses_millisecond_timestamp() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let envelope = Envelope::message(
            UserId::new("alice"),
            Destination::room("general"),
            "hi",
            Timestamp::at(instant),
        );

        let frame = encode(&envelope);
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["type"], "message");
        assert_eq!(value["from"], "alice");
        assert_eq!(value["room"], "general");
        assert_eq!(value["timestamp"], "2024-05-01T12:30:00.000Z");
        assert!(value.get("to").is_none());
        assert_eq!(decode(&frame).unwrap(), envelope);
    }

    #[test]
    fn encoded_login_carries_credentials() {
        let frame = encode(&Envelope::login(UserId::new("alice"), "secret"));
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["type"], "login");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["password"], "secret");
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let frame = format!(
            r#"{{"type":"message","from":"a","room":"r","content":"{}"}}"#,
            "x".repeat(Envelope::MAX_FRAME_SIZE)
        );
        assert!(matches!(decode(&frame), Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn non_utf8_bytes_are_malformed() {
        assert!(decode_bytes(&[0x7b, 0xff, 0xfe, 0x7d]).is_err());
    }
}
