//! Observable application state types.
//!
//! This module defines the data structures that represent the application's
//! current view of the world: [`ConnectionStatus`], the open
//! [`ConversationView`], and the append-only [`TranscriptLine`] feed.
//!
//! These structures serve as the "View Model" for the application. They
//! contain the subset of protocol state necessary for rendering without
//! exposing session internals.

use chatwire_client::{DeliveryStatus, Destination, Entry, EntryId, UserId};
use chatwire_core::Origin;

/// Connection state as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No session.
    Disconnected,
    /// Transport connecting.
    Connecting,
    /// Transport open, waiting for credentials or the server's answer.
    Authenticating,
    /// Logged in.
    Connected {
        /// Authenticated user.
        user: UserId,
    },
}

/// One message as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    /// Log entry this view mirrors.
    pub entry: EntryId,
    /// Author, if the envelope named one.
    pub sender: Option<UserId>,
    /// Message text.
    pub content: String,
    /// `HH:MM`, absent for frames without a timestamp.
    pub time_label: Option<String>,
    /// Delivery progress.
    pub delivery: DeliveryStatus,
    /// Sent from this client.
    pub local: bool,
}

impl MessageView {
    /// Snapshot a conversation entry.
    pub fn from_entry<I: Copy>(entry: &Entry<I>) -> Self {
        let envelope = entry.envelope();
        Self {
            entry: entry.id(),
            sender: envelope.sender().cloned(),
            content: envelope.payload().to_string(),
            time_label: envelope.timestamp().label(),
            delivery: entry.delivery(),
            local: entry.origin() == Origin::Local,
        }
    }

    /// Whether the send failed.
    pub fn delivery_failed(&self) -> bool {
        self.delivery == DeliveryStatus::Failed
    }
}

/// The conversation currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    /// Bound destination.
    pub destination: Destination,
    /// Messages in log order.
    pub messages: Vec<MessageView>,
}

impl ConversationView {
    /// Empty view for a destination.
    pub fn new(destination: Destination) -> Self {
        Self { destination, messages: Vec::new() }
    }

    /// Message mirroring `entry`.
    pub fn message_mut(&mut self, entry: EntryId) -> Option<&mut MessageView> {
        self.messages.iter_mut().find(|message| message.entry == entry)
    }
}

/// One line of the append-only transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptLine {
    /// Informational notice.
    Notice(String),
    /// Error surfaced to the user.
    Error(String),
    /// A conversation message.
    Message(MessageView),
    /// A local message that could not be delivered.
    Undelivered {
        /// Entry that failed.
        entry: EntryId,
        /// Its text.
        content: String,
    },
}
