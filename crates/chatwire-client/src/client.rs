//! Client state machine.
//!
//! The `Client` owns one session and wires the core state machines together:
//! [`Session`] gates sends, [`Handshake`] runs the credential exchange,
//! [`ChannelRouter`] filters inbound traffic, and [`Conversation`] holds the
//! log. The router and conversation only exist once the session is open.

use chatwire_core::{
    AppendOutcome, ChannelRouter, ConnectionState, Conversation, CredentialMode, Credentials,
    DeliveryStatus, EntryId, Environment, Handshake, HandshakeAction, HandshakeEvent,
    HandshakeFailure, HandshakeState, RouterError, Session, SessionConfig, SessionError,
};
use chatwire_proto::{Destination, Envelope, EnvelopeKind, Timestamp, UserId, decode, encode};
use tracing::{debug, warn};

use crate::{
    error::ClientError,
    event::{ClientAction, ClientEvent},
};

/// Client for one chat session.
pub struct Client<E: Environment> {
    /// Environment for time.
    env: E,

    /// Tunables shared by the handshake and conversation.
    config: SessionConfig,

    /// Connection lifecycle.
    session: Session,

    /// Credential exchange.
    handshake: Handshake<E::Instant>,

    /// Active destination. Present once authenticated.
    router: Option<ChannelRouter>,

    /// Log of the open conversation.
    conversation: Option<Conversation<E::Instant>>,

    /// Destination requested before the session opened.
    requested: Option<Destination>,
}

impl<E: Environment> Client<E> {
    /// Create a client whose session is connecting.
    pub fn new(env: E, config: SessionConfig) -> Self {
        let handshake = Handshake::new(config.handshake_timeout);
        Self {
            env,
            config,
            session: Session::new(),
            handshake,
            router: None,
            conversation: None,
            requested: None,
        }
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Current handshake state.
    pub fn handshake_state(&self) -> &HandshakeState {
        self.handshake.state()
    }

    /// Mode the next credential submission is expected in.
    pub fn credential_mode(&self) -> CredentialMode {
        self.handshake.mode()
    }

    /// Authenticated user. `None` unless the session is open.
    pub fn user(&self) -> Option<&UserId> {
        self.session.context().map(|context| context.user())
    }

    /// Active destination, if a conversation is open.
    pub fn destination(&self) -> Option<&Destination> {
        self.conversation.as_ref().map(Conversation::destination)
    }

    /// Log of the open conversation.
    pub fn conversation(&self) -> Option<&Conversation<E::Instant>> {
        self.conversation.as_ref()
    }

    /// Session tunables.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Process an event and return resulting actions.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::TransportOpened => self.handle_transport_opened(),
            ClientEvent::FrameReceived(frame) => self.handle_frame(&frame),
            ClientEvent::TransportClosed { reason } => Ok(self.handle_transport_end(reason, false)),
            ClientEvent::TransportFailed { cause } => Ok(self.handle_transport_end(cause, true)),
            ClientEvent::Tick { now } => self.handle_tick(now),
            ClientEvent::SubmitCredentials(credentials) => self.handle_submit(credentials),
            ClientEvent::OpenConversation(destination) => self.handle_open(destination),
            ClientEvent::SendMessage { text } => self.handle_send_message(&text),
            ClientEvent::SendCompleted { entry } => {
                Ok(self.update_delivery(entry, DeliveryStatus::Sent))
            },
            ClientEvent::SendFailed { entry, reason } => {
                warn!(entry = entry.value(), %reason, "send failed");
                Ok(self.update_delivery(entry, DeliveryStatus::Failed))
            },
            ClientEvent::Close => Ok(self.handle_close()),
        }
    }

    fn handle_transport_opened(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        self.session.transport_opened()?;
        let actions = self.handshake.handle(HandshakeEvent::TransportReady, self.env.now())?;
        self.apply_handshake(actions)
    }

    fn handle_frame(&mut self, frame: &str) -> Result<Vec<ClientAction>, ClientError> {
        if !self.session.accepts_inbound() {
            debug!(state = ?self.session.state(), "ignoring frame outside a live session");
            return Ok(Vec::new());
        }

        let envelope = match decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                return Ok(vec![ClientAction::Log { message: format!("dropped frame: {e}") }]);
            },
        };

        match envelope.kind().clone() {
            EnvelopeKind::LoginResult | EnvelopeKind::SignupResult => {
                let actions =
                    self.handshake.handle(HandshakeEvent::Response(envelope), self.env.now())?;
                self.apply_handshake(actions)
            },
            EnvelopeKind::Message => Ok(self.handle_inbound_message(envelope)),
            EnvelopeKind::Login
            | EnvelopeKind::Signup
            | EnvelopeKind::Join
            | EnvelopeKind::Unknown(_) => {
                debug!(kind = %envelope.kind(), "ignoring envelope");
                Ok(Vec::new())
            },
        }
    }

    fn handle_inbound_message(&mut self, envelope: Envelope) -> Vec<ClientAction> {
        let (Some(router), Some(conversation)) = (&self.router, &mut self.conversation) else {
            debug!("message before a conversation is open, dropping");
            return Vec::new();
        };

        let Some(routed) = router.route(envelope) else {
            return Vec::new();
        };

        match conversation.append_from_network(routed, self.env.now()) {
            AppendOutcome::Appended(entry) => vec![ClientAction::EntryAppended { entry }],
            AppendOutcome::Duplicate(entry) => {
                vec![ClientAction::DeliveryUpdated { entry, status: DeliveryStatus::Confirmed }]
            },
            AppendOutcome::Discarded => Vec::new(),
        }
    }

    fn handle_transport_end(&mut self, reason: String, failed: bool) -> Vec<ClientAction> {
        let ended = if failed {
            self.session.transport_failed(reason.clone())
        } else {
            self.session.transport_closed(reason.clone())
        };
        if !ended {
            return Vec::new();
        }

        let mut actions = Vec::new();
        let lost = self.handshake.handle(HandshakeEvent::TransportLost, self.env.now());
        if let Ok(lost) = lost
            && lost.contains(&HandshakeAction::ConnectionLost)
        {
            actions.push(ClientAction::HandshakeFailed(HandshakeFailure::ConnectionLost));
        }

        actions.push(ClientAction::SessionEnded { state: self.session.state(), reason });
        actions
    }

    fn handle_tick(&mut self, now: E::Instant) -> Result<Vec<ClientAction>, ClientError> {
        let actions = self.handshake.handle(HandshakeEvent::Tick, now)?;
        self.apply_handshake(actions)
    }

    fn handle_submit(
        &mut self,
        credentials: Credentials,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let state = self.session.state();
        if !matches!(state, ConnectionState::Authenticating | ConnectionState::Open) {
            let kind = match credentials.mode() {
                CredentialMode::Login => EnvelopeKind::Login,
                CredentialMode::Signup => EnvelopeKind::Signup,
            };
            return Err(SessionError::NotOpen { state, kind }.into());
        }

        let actions =
            self.handshake.handle(HandshakeEvent::Submit(credentials), self.env.now())?;
        self.apply_handshake(actions)
    }

    fn handle_open(&mut self, destination: Destination) -> Result<Vec<ClientAction>, ClientError> {
        match self.session.state() {
            ConnectionState::Open => self.open_conversation(destination),
            ConnectionState::Connecting | ConnectionState::Authenticating => {
                debug!(%destination, "conversation deferred until authenticated");
                self.requested = Some(destination);
                Ok(Vec::new())
            },
            state @ (ConnectionState::Closed | ConnectionState::Failed) => {
                Err(SessionError::NotOpen { state, kind: EnvelopeKind::Join }.into())
            },
        }
    }

    /// Subscribe before queueing the join, so nothing sent to the new
    /// destination can arrive ahead of the subscription.
    fn open_conversation(
        &mut self,
        destination: Destination,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let Some(router) = &mut self.router else {
            return Err(SessionError::InvalidState {
                state: self.session.state(),
                operation: "open_conversation",
            }
            .into());
        };

        let subscription = router.subscribe(destination.clone());
        self.conversation = Some(Conversation::new(subscription, &self.config));

        let join = router.join()?;
        self.session.check_send(&join)?;

        Ok(vec![ClientAction::ConversationOpened { destination }, ClientAction::Send {
            frame: encode(&join),
            entry: None,
        }])
    }

    fn handle_send_message(&mut self, text: &str) -> Result<Vec<ClientAction>, ClientError> {
        if text.trim().is_empty() {
            debug!("ignoring blank message");
            return Ok(Vec::new());
        }

        let (Some(router), Some(conversation)) = (&self.router, &mut self.conversation) else {
            return Err(RouterError::NoActiveDestination.into());
        };

        let envelope = router.address(text, Timestamp::at(self.env.wall_clock()))?;
        let entry = conversation.append_optimistic(envelope.clone(), self.env.now());
        let mut actions = vec![ClientAction::EntryAppended { entry }];

        match self.session.check_send(&envelope) {
            Ok(()) => {
                actions.push(ClientAction::Send { frame: encode(&envelope), entry: Some(entry) });
            },
            Err(e) => {
                warn!(error = %e, "message not sent");
                conversation.mark_failed(entry);
                let status = DeliveryStatus::Failed;
                actions.push(ClientAction::DeliveryUpdated { entry, status });
            },
        }

        Ok(actions)
    }

    fn update_delivery(&mut self, entry: EntryId, status: DeliveryStatus) -> Vec<ClientAction> {
        let Some(conversation) = &mut self.conversation else {
            return Vec::new();
        };

        let changed = match status {
            DeliveryStatus::Sent => conversation.mark_sent(entry),
            DeliveryStatus::Failed => conversation.mark_failed(entry),
            DeliveryStatus::Pending | DeliveryStatus::Confirmed | DeliveryStatus::Received => false,
        };

        if changed { vec![ClientAction::DeliveryUpdated { entry, status }] } else { Vec::new() }
    }

    fn handle_close(&mut self) -> Vec<ClientAction> {
        if !self.session.close() {
            return Vec::new();
        }

        // In-flight submissions are abandoned, not reported as lost.
        let _ = self.handshake.handle(HandshakeEvent::TransportLost, self.env.now());

        let reason = self.session.terminal_reason().unwrap_or_default().to_string();
        vec![ClientAction::CloseTransport, ClientAction::SessionEnded {
            state: self.session.state(),
            reason,
        }]
    }

    fn apply_handshake(
        &mut self,
        actions: Vec<HandshakeAction>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let mut out = Vec::new();

        for action in actions {
            match action {
                HandshakeAction::Send(envelope) => {
                    self.session.check_send(&envelope)?;
                    out.push(ClientAction::Send { frame: encode(&envelope), entry: None });
                },
                HandshakeAction::Authenticated(context) => {
                    let user = context.user().clone();
                    self.session.authenticated(context.clone())?;
                    self.router = Some(ChannelRouter::new(context));
                    out.push(ClientAction::Authenticated { user });

                    if let Some(destination) = self.requested.take() {
                        out.extend(self.open_conversation(destination)?);
                    }
                },
                HandshakeAction::SignedUp { message } => {
                    out.push(ClientAction::SignedUp { message });
                },
                HandshakeAction::Rejected { message } => {
                    out.push(ClientAction::HandshakeFailed(HandshakeFailure::Rejected { message }));
                },
                HandshakeAction::TimedOut { elapsed } => {
                    out.push(ClientAction::HandshakeFailed(HandshakeFailure::Timeout { elapsed }));
                    out.extend(self.handle_close());
                },
                HandshakeAction::ConnectionLost => {
                    out.push(ClientAction::HandshakeFailed(HandshakeFailure::ConnectionLost));
                },
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatwire_proto::Status;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    /// Virtual clock: instants are offsets from the start of the test.
    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Duration;

        fn now(&self) -> Duration {
            Duration::ZERO
        }

        fn wall_clock(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }
    }

    fn frame(envelope: &Envelope) -> ClientEvent<Duration> {
        ClientEvent::FrameReceived(encode(envelope))
    }

    fn authenticated_client(user: &str) -> Client<TestEnv> {
        let mut client = Client::new(TestEnv, SessionConfig::default());
        client.handle(ClientEvent::TransportOpened).unwrap();
        client.handle(ClientEvent::SubmitCredentials(Credentials::login(user, "pw"))).unwrap();
        client
            .handle(frame(&Envelope::login_result(Status::Success, "Login successful.")))
            .unwrap();
        client
    }

    #[test]
    fn login_then_open_room() {
        let mut client = authenticated_client("alice");
        assert_eq!(client.connection_state(), ConnectionState::Open);
        assert_eq!(client.user(), Some(&UserId::new("alice")));

        let actions = client.handle(ClientEvent::OpenConversation(Destination::room("general")));
        let actions = actions.unwrap();
        assert_eq!(actions[0], ClientAction::ConversationOpened {
            destination: Destination::room("general")
        });
        let ClientAction::Send { frame, entry: None } = &actions[1] else {
            panic!("expected join frame, got {:?}", actions[1]);
        };
        let join = decode(frame).unwrap();
        assert_eq!(join.kind(), &EnvelopeKind::Join);
        assert_eq!(join.destination(), Some(&Destination::room("general")));
    }

    #[test]
    fn conversation_requested_early_opens_after_login() {
        let mut client = Client::new(TestEnv, SessionConfig::default());
        client.handle(ClientEvent::OpenConversation(Destination::peer("bob"))).unwrap();
        client.handle(ClientEvent::TransportOpened).unwrap();
        client.handle(ClientEvent::SubmitCredentials(Credentials::login("alice", "pw"))).unwrap();

        let actions = client
            .handle(frame(&Envelope::login_result(Status::Success, "Login successful.")))
            .unwrap();
        assert!(actions.contains(&ClientAction::ConversationOpened {
            destination: Destination::peer("bob")
        }));
        assert_eq!(client.destination(), Some(&Destination::peer("bob")));
    }

    #[test]
    fn submit_before_transport_is_not_open() {
        let mut client = Client::new(TestEnv, SessionConfig::default());
        let result = client.handle(ClientEvent::SubmitCredentials(Credentials::login("a", "b")));
        assert!(matches!(result, Err(ClientError::Session(SessionError::NotOpen { .. }))));
        assert_eq!(client.handshake_state(), &HandshakeState::Idle);
    }

    #[test]
    fn send_message_appends_and_sends() {
        let mut client = authenticated_client("alice");
        client.handle(ClientEvent::OpenConversation(Destination::room("general"))).unwrap();

        let actions = client.handle(ClientEvent::SendMessage { text: "hi".to_string() }).unwrap();
        let ClientAction::EntryAppended { entry } = actions[0] else {
            panic!("expected append, got {:?}", actions[0]);
        };
        assert!(matches!(&actions[1], ClientAction::Send { entry: Some(e), .. } if *e == entry));

        client.handle(ClientEvent::SendCompleted { entry }).unwrap();
        let log = client.conversation().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].delivery(), DeliveryStatus::Sent);
        assert!(!log.entries()[0].delivery_failed());
    }

    #[test]
    fn blank_message_is_ignored() {
        let mut client = authenticated_client("alice");
        client.handle(ClientEvent::OpenConversation(Destination::room("general"))).unwrap();

        let actions = client.handle(ClientEvent::SendMessage { text: "   ".to_string() }).unwrap();
        assert!(actions.is_empty());
        assert!(client.conversation().unwrap().is_empty());
    }

    #[test]
    fn send_after_failure_is_marked_failed() {
        let mut client = authenticated_client("alice");
        client.handle(ClientEvent::OpenConversation(Destination::room("general"))).unwrap();
        client.handle(ClientEvent::TransportFailed { cause: "reset".to_string() }).unwrap();

        let actions = client.handle(ClientEvent::SendMessage { text: "hi".to_string() }).unwrap();
        assert!(!actions.iter().any(|a| matches!(a, ClientAction::Send { .. })));
        assert!(client.conversation().unwrap().entries()[0].delivery_failed());
    }

    #[test]
    fn echo_of_own_message_is_not_duplicated() {
        let mut client = authenticated_client("alice");
        client.handle(ClientEvent::OpenConversation(Destination::room("general"))).unwrap();
        let actions = client.handle(ClientEvent::SendMessage { text: "hi".to_string() }).unwrap();
        let Some(ClientAction::Send { frame: sent, .. }) = actions.get(1) else {
            panic!("expected send");
        };

        let actions = client.handle(ClientEvent::FrameReceived(sent.clone())).unwrap();
        assert!(matches!(actions.as_slice(), [ClientAction::DeliveryUpdated {
            status: DeliveryStatus::Confirmed,
            ..
        }]));
        assert_eq!(client.conversation().unwrap().len(), 1);
    }

    #[test]
    fn malformed_frame_is_dropped_without_error() {
        let mut client = authenticated_client("alice");
        let actions = client.handle(ClientEvent::FrameReceived("{not json".to_string())).unwrap();
        assert!(matches!(actions.as_slice(), [ClientAction::Log { .. }]));
        assert_eq!(client.connection_state(), ConnectionState::Open);
    }

    #[test]
    fn transport_failure_mid_handshake_is_connection_lost() {
        let mut client = Client::new(TestEnv, SessionConfig::default());
        client.handle(ClientEvent::TransportOpened).unwrap();
        client.handle(ClientEvent::SubmitCredentials(Credentials::login("a", "b"))).unwrap();

        let actions =
            client.handle(ClientEvent::TransportFailed { cause: "reset".to_string() }).unwrap();
        assert_eq!(actions[0], ClientAction::HandshakeFailed(HandshakeFailure::ConnectionLost));
        assert!(matches!(actions[1], ClientAction::SessionEnded {
            state: ConnectionState::Failed,
            ..
        }));

        let again =
            client.handle(ClientEvent::TransportClosed { reason: "late".to_string() }).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn handshake_timeout_closes_session() {
        let mut client = Client::new(TestEnv, SessionConfig::default());
        client.handle(ClientEvent::TransportOpened).unwrap();
        client.handle(ClientEvent::SubmitCredentials(Credentials::login("a", "b"))).unwrap();

        let actions = client.handle(ClientEvent::Tick { now: Duration::from_secs(6) }).unwrap();
        assert!(matches!(
            actions[0],
            ClientAction::HandshakeFailed(HandshakeFailure::Timeout { .. })
        ));
        assert!(actions.contains(&ClientAction::CloseTransport));
        assert_eq!(client.connection_state(), ConnectionState::Closed);
    }

    #[test]
    fn close_is_emitted_once() {
        let mut client = authenticated_client("alice");
        let actions = client.handle(ClientEvent::Close).unwrap();
        assert_eq!(actions[0], ClientAction::CloseTransport);
        assert!(client.handle(ClientEvent::Close).unwrap().is_empty());
    }
}
