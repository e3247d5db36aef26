//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use chatwire_app::{App, ConnectionStatus};
use chatwire_client::{DeliveryStatus, Destination, UserId};

/// Snapshot of the entire system state.
///
/// Contains observable state from one or more clients for invariant checking.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Client name used in violation messages.
    pub name: String,
    /// Connection state shown to the user.
    pub status: ConnectionStatus,
    /// Destination of the conversation on screen.
    pub destination: Option<Destination>,
    /// Messages in the conversation on screen, oldest first.
    pub messages: Vec<MessageSnapshot>,
    /// Transcript length at every render so far (for append-only checks).
    pub transcript_history: Vec<usize>,
    /// Successful connects issued by the runtime.
    pub connects: usize,
    /// Closes issued by the runtime.
    pub closes: usize,
    /// Whether the driver currently holds an open connection.
    pub transport_open: bool,
}

impl ClientSnapshot {
    /// Create a disconnected client with no history.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ConnectionStatus::Disconnected,
            destination: None,
            messages: Vec::new(),
            transcript_history: Vec::new(),
            connects: 0,
            closes: 0,
            transport_open: false,
        }
    }

    /// Capture the App's view of the session.
    ///
    /// Connection counters and transcript history come from the driver and
    /// are filled in by the caller.
    pub fn from_app(name: impl Into<String>, app: &App) -> Self {
        let mut snapshot = Self::new(name).with_status(app.connection_status().clone());
        if let Some(conversation) = app.conversation() {
            snapshot.destination = Some(conversation.destination.clone());
            snapshot.messages = conversation
                .messages
                .iter()
                .map(|message| MessageSnapshot {
                    entry: message.entry.value(),
                    sender: message.sender.clone(),
                    content: message.content.clone(),
                    local: message.local,
                    delivery: message.delivery,
                })
                .collect();
        }
        snapshot
    }

    /// Set the connection status.
    #[must_use]
    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the conversation destination.
    #[must_use]
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Append a message to the conversation.
    #[must_use]
    pub fn with_message(mut self, message: MessageSnapshot) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the connection counters.
    #[must_use]
    pub fn with_connections(mut self, connects: usize, closes: usize, open: bool) -> Self {
        self.connects = connects;
        self.closes = closes;
        self.transport_open = open;
        self
    }

    /// Record a transcript length observation.
    pub fn record_transcript(&mut self, len: usize) {
        self.transcript_history.push(len);
    }

    /// User the client is logged in as, if any.
    pub fn user(&self) -> Option<&UserId> {
        match &self.status {
            ConnectionStatus::Connected { user } => Some(user),
            _ => None,
        }
    }
}

/// Snapshot of one conversation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSnapshot {
    /// Conversation entry id.
    pub entry: u64,
    /// Sender, when known.
    pub sender: Option<UserId>,
    /// Message text.
    pub content: String,
    /// Appended by this client rather than received.
    pub local: bool,
    /// Delivery status.
    pub delivery: DeliveryStatus,
}

impl MessageSnapshot {
    /// A message this client sent.
    pub fn local(entry: u64, sender: &str, content: &str) -> Self {
        Self {
            entry,
            sender: Some(UserId::new(sender)),
            content: content.to_string(),
            local: true,
            delivery: DeliveryStatus::Pending,
        }
    }

    /// A message received from the network.
    pub fn remote(entry: u64, sender: &str, content: &str) -> Self {
        Self {
            entry,
            sender: Some(UserId::new(sender)),
            content: content.to_string(),
            local: false,
            delivery: DeliveryStatus::Received,
        }
    }
}
