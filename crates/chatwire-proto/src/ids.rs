//! Identifiers and addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// User identifier (the login name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a user name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// User name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Named room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a room name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Room name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Logical recipient of a message.
///
/// The wire carries either a `to` field (direct conversation) or a `room`
/// field, never both. Decoding normalizes whichever is present into this
/// union so callers never inspect raw field presence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Direct user-to-user conversation with this peer.
    DirectPeer(UserId),
    /// Named room shared by every participant who joined it.
    Room(RoomId),
}

impl Destination {
    /// Direct conversation with `peer`.
    pub fn peer(peer: impl Into<String>) -> Self {
        Self::DirectPeer(UserId::new(peer))
    }

    /// Room conversation in `room`.
    pub fn room(room: impl Into<String>) -> Self {
        Self::Room(RoomId::new(room))
    }

    /// True for room addressing.
    pub fn is_room(&self) -> bool {
        matches!(self, Self::Room(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectPeer(peer) => write!(f, "@{peer}"),
            Self::Room(room) => write!(f, "#{room}"),
        }
    }
}
