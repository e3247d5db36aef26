//! Application state machine.
//!
//! This module defines the [`App`] state machine, which manages the interactive
//! state of the application completely decoupled from I/O and protocol
//! mechanics.
//!
//! This is a pure state machine: it consumes [`crate::AppEvent`] inputs and
//! produces [`crate::AppAction`] instructions for the runtime to execute.
//!
//! # Responsibilities
//!
//! - Turns input lines into protocol intents.
//! - Mirrors the open conversation and per-message delivery status.
//! - Keeps an append-only transcript for line-oriented renderers.
//! - Tracks high-level connection state for UI feedback.

use chatwire_client::{Credentials, DeliveryStatus, Destination, HandshakeFailure};

use crate::{
    AppAction, AppEvent, ConnectionStatus, ConversationView, TranscriptLine,
    input::{self, Command},
};

/// Application state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies - fully testable in simulation.
#[derive(Debug, Clone)]
pub struct App {
    /// Server endpoint, shown to the user.
    endpoint: String,
    /// Connection state.
    status: ConnectionStatus,
    /// Conversation on screen. Kept after the session ends until the next
    /// one opens a conversation.
    conversation: Option<ConversationView>,
    /// Everything rendered so far, oldest first.
    transcript: Vec<TranscriptLine>,
}

impl App {
    /// Create a new App for the given server endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            status: ConnectionStatus::Disconnected,
            conversation: None,
            transcript: Vec::new(),
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Input(line) => return self.handle_input(&line),
            AppEvent::Tick => return Vec::new(),
            AppEvent::Connecting => {
                self.status = ConnectionStatus::Connecting;
                self.notice(format!("Connecting to {}...", self.endpoint));
            },
            AppEvent::TransportOpened => {
                self.status = ConnectionStatus::Authenticating;
                self.notice("Connected. Log in with /login <user> <password> or /signup.");
            },
            AppEvent::Authenticated { user } => {
                self.notice(format!("Logged in as {user}."));
                self.status = ConnectionStatus::Connected { user };
            },
            AppEvent::SignedUp { message } => {
                self.notice(format!("{message} Log in with /login."));
            },
            AppEvent::HandshakeFailed(failure) => self.handshake_failed(&failure),
            AppEvent::ConversationOpened { destination } => {
                self.notice(match &destination {
                    Destination::Room(room) => format!("Joined room #{room}."),
                    Destination::DirectPeer(peer) => format!("Chatting with {peer}."),
                });
                self.conversation = Some(ConversationView::new(destination));
            },
            AppEvent::MessageAppended(message) => {
                if let Some(conversation) = &mut self.conversation {
                    conversation.messages.push(message.clone());
                }
                self.transcript.push(TranscriptLine::Message(message));
            },
            AppEvent::DeliveryUpdated { entry, status } => {
                let Some(message) =
                    self.conversation.as_mut().and_then(|c| c.message_mut(entry))
                else {
                    return Vec::new();
                };
                message.delivery = status;
                if status == DeliveryStatus::Failed {
                    let content = message.content.clone();
                    self.transcript.push(TranscriptLine::Undelivered { entry, content });
                }
            },
            AppEvent::SessionEnded { reason, failed } => {
                self.status = ConnectionStatus::Disconnected;
                let line = format!("Disconnected: {reason}. Use /connect to start a new session.");
                if failed {
                    self.error(line);
                } else {
                    self.notice(line);
                }
            },
            AppEvent::Error { message } => self.error(message),
        }

        vec![AppAction::Render]
    }

    fn handle_input(&mut self, line: &str) -> Vec<AppAction> {
        match input::parse(line) {
            Command::Login { username, password } => {
                vec![AppAction::SubmitCredentials(Credentials::login(username, password))]
            },
            Command::Signup { username, password } => {
                vec![AppAction::SubmitCredentials(Credentials::signup(username, password))]
            },
            Command::Room(room) => vec![AppAction::OpenConversation(Destination::room(room))],
            Command::Direct(peer) => vec![AppAction::OpenConversation(Destination::peer(peer))],
            Command::Leave => vec![AppAction::Disconnect, AppAction::Render],
            Command::Connect => self.connect(),
            Command::Quit => self.quit(),
            Command::Help => {
                self.notice(input::HELP);
                vec![AppAction::Render]
            },
            Command::Say(text) => vec![AppAction::SendMessage { text }],
            Command::Unknown(command) => {
                self.error(format!("Unknown command: {command} (try /help)"));
                vec![AppAction::Render]
            },
            Command::Empty => Vec::new(),
        }
    }

    fn handshake_failed(&mut self, failure: &HandshakeFailure) {
        if failure.is_retryable() {
            self.error(format!("{failure}. Use /connect to retry."));
        } else {
            self.error(failure.to_string());
        }
    }

    fn notice(&mut self, line: impl Into<String>) {
        self.transcript.push(TranscriptLine::Notice(line.into()));
    }

    fn error(&mut self, line: impl Into<String>) {
        self.transcript.push(TranscriptLine::Error(line.into()));
    }

    /// Open a fresh session.
    pub fn connect(&self) -> Vec<AppAction> {
        vec![AppAction::Connect, AppAction::Render]
    }

    /// Quit the application.
    pub fn quit(&self) -> Vec<AppAction> {
        vec![AppAction::Quit]
    }

    /// Current connection state.
    pub fn connection_status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Server endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Conversation on screen. `None` before the first one opens.
    pub fn conversation(&self) -> Option<&ConversationView> {
        self.conversation.as_ref()
    }

    /// Append-only transcript, oldest first.
    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }
}
