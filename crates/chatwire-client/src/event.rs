//! Client events and actions.

use chatwire_core::{ConnectionState, Credentials, DeliveryStatus, EntryId, HandshakeFailure};
use chatwire_proto::{Destination, UserId};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Reporting transport lifecycle and inbound frames
/// - Driving time forward via ticks
/// - Forwarding user intents (log in, open a conversation, send a message)
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual) environments.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Transport connected.
    TransportOpened,

    /// Text frame received from server.
    FrameReceived(String),

    /// Transport closed by the server.
    TransportClosed {
        /// Close reason reported by the transport.
        reason: String,
    },

    /// Transport failed abruptly.
    TransportFailed {
        /// Failure cause reported by the transport.
        cause: String,
    },

    /// Time tick for timeout processing.
    ///
    /// The caller should send ticks periodically so the handshake can
    /// detect an unresponsive server.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// User submitted login or signup credentials.
    SubmitCredentials(Credentials),

    /// User opened a conversation.
    ///
    /// Accepted before authentication completes; the subscription is applied
    /// as soon as the session opens.
    OpenConversation(Destination),

    /// User typed a message into the open conversation.
    SendMessage {
        /// Message text.
        text: String,
    },

    /// Transport accepted the frame carrying `entry`.
    SendCompleted {
        /// Entry whose frame was written.
        entry: EntryId,
    },

    /// Transport refused the frame carrying `entry`.
    SendFailed {
        /// Entry whose frame could not be written.
        entry: EntryId,
        /// Failure reported by the transport.
        reason: String,
    },

    /// User left the conversation view.
    Close,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Write a text frame to the transport.
    Send {
        /// Encoded envelope.
        frame: String,
        /// Log entry carried by the frame, for delivery reporting.
        entry: Option<EntryId>,
    },

    /// Close the transport. Emitted at most once per session.
    CloseTransport,

    /// Server accepted the login.
    Authenticated {
        /// Authenticated user.
        user: UserId,
    },

    /// Server accepted a signup. The user should now log in.
    SignedUp {
        /// Server confirmation.
        message: String,
    },

    /// Credential exchange ended without authenticating.
    HandshakeFailed(HandshakeFailure),

    /// Conversation bound to a destination.
    ConversationOpened {
        /// Active destination.
        destination: Destination,
    },

    /// New entry in the conversation log.
    EntryAppended {
        /// Entry that was appended.
        entry: EntryId,
    },

    /// Delivery status of an entry changed.
    DeliveryUpdated {
        /// Entry whose status changed.
        entry: EntryId,
        /// New status.
        status: DeliveryStatus,
    },

    /// Session reached a terminal state.
    SessionEnded {
        /// `Closed` or `Failed`.
        state: ConnectionState,
        /// Close reason or failure cause.
        reason: String,
    },

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}
