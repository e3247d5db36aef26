//! Application input events.
//!
//! This module defines [`AppEvent`], the set of inputs that drive the
//! [`crate::App`] state machine.
//!
//! Events originate from two distinct sources:
//! - User input lines and system ticks.
//! - Protocol notifications translated from the underlying client.

use chatwire_client::{DeliveryStatus, Destination, EntryId, HandshakeFailure, UserId};

use crate::MessageView;

/// Events processed by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A line of user input.
    Input(String),

    /// Periodic tick.
    Tick,

    /// Connection in progress.
    Connecting,

    /// Transport open; credentials may be submitted.
    TransportOpened,

    /// Handshake succeeded.
    Authenticated {
        /// Logged-in user.
        user: UserId,
    },

    /// Signup succeeded; a login is still required.
    SignedUp {
        /// Server message.
        message: String,
    },

    /// Handshake did not authenticate.
    HandshakeFailed(HandshakeFailure),

    /// A conversation was bound to a destination.
    ConversationOpened {
        /// Bound destination.
        destination: Destination,
    },

    /// A message entered the conversation log.
    MessageAppended(MessageView),

    /// A message's delivery status changed.
    DeliveryUpdated {
        /// Affected entry.
        entry: EntryId,
        /// New status.
        status: DeliveryStatus,
    },

    /// The session ended.
    SessionEnded {
        /// Why it ended.
        reason: String,
        /// Ended by a failure rather than an orderly close.
        failed: bool,
    },

    /// Error occurred.
    Error {
        /// Error description.
        message: String,
    },
}
