//! Protocol-to-Application translation layer.
//!
//! The [`Bridge`] wraps the low-level [`chatwire_client::Client`] and adapts
//! it to the high-level application lifecycle.
//!
//! # Responsibilities
//!
//! - Owns the live session: one fresh [`Client`] per connection, dropped when
//!   the next connection starts.
//! - Converts high-level [`crate::AppAction`] into client events.
//! - Accumulates outgoing frames to be sent by the driver in the next I/O
//!   cycle, and records when the client asks for the transport to close.
//! - Interprets results from the client and converts them back into
//!   [`crate::AppEvent`]s to update the UI.
//! - Manages time ticks generically to support both real-time execution and
//!   deterministic simulation.

use chatwire_client::{
    Client, ClientAction, ClientError, ClientEvent, ConnectionState, EntryId, Environment,
    HandshakeState, SessionConfig,
};

use crate::{AppAction, AppEvent, MessageView};

/// A frame queued for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Encoded envelope.
    pub frame: String,
    /// Conversation entry whose delivery this send decides.
    pub entry: Option<EntryId>,
}

/// Bridge between App and Client protocol logic.
///
/// Generic over Environment to support both production and simulation.
/// The Instant type is determined by the Environment's associated type.
pub struct Bridge<E: Environment> {
    env: E,
    config: SessionConfig,
    client: Option<Client<E>>,
    outgoing: Vec<Outgoing>,
    close_requested: bool,
}

impl<E: Environment> Bridge<E> {
    /// Create a bridge with no session.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self { env, config, client: None, outgoing: Vec::new(), close_requested: false }
    }

    /// Live client, if a session was started.
    pub fn client(&self) -> Option<&Client<E>> {
        self.client.as_ref()
    }

    /// Handshake state of the current session.
    pub fn handshake_state(&self) -> Option<&HandshakeState> {
        self.client.as_ref().map(Client::handshake_state)
    }

    /// Whether the current session has not ended.
    pub fn is_live(&self) -> bool {
        self.client.as_ref().is_some_and(|client| !client.connection_state().is_terminal())
    }

    /// Start a fresh session, discarding the previous one.
    ///
    /// Frames still queued for the old session are dropped.
    pub fn start_session(&mut self) {
        self.client = Some(Client::new(self.env.clone(), self.config.clone()));
        self.outgoing.clear();
        self.close_requested = false;
    }

    /// The driver connected the transport.
    pub fn transport_opened(&mut self) -> Vec<AppEvent> {
        let mut events = vec![AppEvent::TransportOpened];
        events.extend(self.dispatch(ClientEvent::TransportOpened));
        events
    }

    /// The driver could not connect.
    pub fn connect_failed(&mut self, cause: String) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::TransportFailed { cause })
    }

    /// Handle a frame from the server.
    pub fn handle_frame(&mut self, frame: String) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::FrameReceived(frame))
    }

    /// The server closed the connection.
    pub fn transport_closed(&mut self, reason: String) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::TransportClosed { reason })
    }

    /// The connection broke.
    pub fn transport_failed(&mut self, cause: String) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::TransportFailed { cause })
    }

    /// Process a time tick.
    pub fn handle_tick(&mut self, now: E::Instant) -> Vec<AppEvent> {
        if self.client.is_none() {
            return Vec::new();
        }
        self.dispatch(ClientEvent::Tick { now })
    }

    /// A queued frame reached the transport.
    pub fn send_completed(&mut self, entry: EntryId) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::SendCompleted { entry })
    }

    /// A queued frame could not be sent.
    pub fn send_failed(&mut self, entry: EntryId, reason: String) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::SendFailed { entry, reason })
    }

    /// Close the current session.
    pub fn close(&mut self) -> Vec<AppEvent> {
        if self.client.is_none() {
            return Vec::new();
        }
        self.dispatch(ClientEvent::Close)
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction) -> Vec<AppEvent> {
        let event = match action {
            AppAction::SubmitCredentials(credentials) => {
                ClientEvent::SubmitCredentials(credentials)
            },
            AppAction::OpenConversation(destination) => ClientEvent::OpenConversation(destination),
            AppAction::SendMessage { text } => ClientEvent::SendMessage { text },
            AppAction::Disconnect => return self.close(),
            AppAction::Render | AppAction::Quit | AppAction::Connect => return Vec::new(),
        };

        if self.client.is_none() {
            return vec![AppEvent::Error {
                message: "Not connected. Use /connect to start a session.".to_string(),
            }];
        }
        self.dispatch(event)
    }

    /// Take pending outgoing frames.
    pub fn take_outgoing(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outgoing)
    }

    /// Whether the client asked for the transport to close since the last
    /// call.
    pub fn take_close_request(&mut self) -> bool {
        std::mem::take(&mut self.close_requested)
    }

    fn dispatch(&mut self, event: ClientEvent<E::Instant>) -> Vec<AppEvent> {
        let Some(client) = &mut self.client else {
            return Vec::new();
        };
        let result = client.handle(event);
        self.handle_client_result(result)
    }

    fn handle_client_result(
        &mut self,
        result: Result<Vec<ClientAction>, ClientError>,
    ) -> Vec<AppEvent> {
        match result {
            Ok(actions) => self.process_client_actions(actions),
            Err(e) => {
                tracing::debug!(error = %e, "client rejected event");
                vec![AppEvent::Error { message: e.to_string() }]
            },
        }
    }

    fn process_client_actions(&mut self, actions: Vec<ClientAction>) -> Vec<AppEvent> {
        let mut events = Vec::new();

        for action in actions {
            match action {
                ClientAction::Send { frame, entry } => {
                    self.outgoing.push(Outgoing { frame, entry });
                },
                ClientAction::CloseTransport => {
                    self.close_requested = true;
                },
                ClientAction::Authenticated { user } => {
                    events.push(AppEvent::Authenticated { user });
                },
                ClientAction::SignedUp { message } => {
                    events.push(AppEvent::SignedUp { message });
                },
                ClientAction::HandshakeFailed(failure) => {
                    events.push(AppEvent::HandshakeFailed(failure));
                },
                ClientAction::ConversationOpened { destination } => {
                    events.push(AppEvent::ConversationOpened { destination });
                },
                ClientAction::EntryAppended { entry } => {
                    let view = self
                        .client
                        .as_ref()
                        .and_then(Client::conversation)
                        .and_then(|conversation| conversation.entry(entry))
                        .map(MessageView::from_entry);
                    if let Some(view) = view {
                        events.push(AppEvent::MessageAppended(view));
                    }
                },
                ClientAction::DeliveryUpdated { entry, status } => {
                    events.push(AppEvent::DeliveryUpdated { entry, status });
                },
                ClientAction::SessionEnded { state, reason } => {
                    let failed = state == ConnectionState::Failed;
                    events.push(AppEvent::SessionEnded { reason, failed });
                },
                ClientAction::Log { message } => {
                    tracing::debug!("{}", message);
                },
            }
        }

        events
    }
}
