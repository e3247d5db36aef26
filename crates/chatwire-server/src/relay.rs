//! Relay state machine.
//!
//! Pure routing logic for the reference server: account signup and login,
//! room membership, and message fan-out. The runtime feeds connection
//! lifecycle and inbound text frames in as [`RelayEvent`]s and executes the
//! returned [`RelayAction`]s. The same relay runs in-process under the
//! simulation harness.

use std::collections::BTreeSet;

use chatwire_proto::{Destination, Envelope, EnvelopeKind, Status, UserId, decode, encode};

use crate::{
    registry::ConnectionRegistry,
    storage::{StoreError, UserStore},
};

/// Reply to a signup or login with blank fields.
pub const MSG_MISSING_CREDENTIALS: &str = "Username and password are required.";
/// Reply to a signup for a taken name.
pub const MSG_USERNAME_TAKEN: &str = "Username already taken.";
/// Reply to a successful signup.
pub const MSG_REGISTERED: &str = "User registered successfully!";
/// Reply to a login for an unknown name.
pub const MSG_INVALID_USERNAME: &str = "Invalid username.";
/// Reply to a login with a wrong or missing password.
pub const MSG_INVALID_PASSWORD: &str = "Invalid password.";
/// Reply to a successful login.
pub const MSG_LOGIN_OK: &str = "Login successful.";
/// Reply when the account store cannot serve a request.
pub const MSG_UNAVAILABLE: &str = "Service unavailable, try again later.";

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Deliver each message back to the connection that sent it
    pub echo: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { echo: true }
    }
}

/// Events that the relay processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
    },

    /// A text frame was received from a connection
    FrameReceived {
        /// Connection that sent the frame
        session_id: u64,
        /// The received frame
        frame: String,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },
}

/// Log severity for [`RelayAction::Log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Routine detail
    Debug,
    /// Lifecycle
    Info,
    /// Client misbehavior
    Warn,
    /// Server-side failure
    Error,
}

/// Actions that the relay produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Send a text frame to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Encoded envelope
        frame: String,
    },

    /// Close a session
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closing
        reason: String,
    },

    /// Log a message
    Log {
        /// Severity
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl RelayAction {
    fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log { level, message: message.into() }
    }
}

/// Routing state machine for the reference server.
pub struct Relay<S: UserStore> {
    store: S,
    registry: ConnectionRegistry,
    config: RelayConfig,
}

impl<S: UserStore> Relay<S> {
    /// Create a relay over an account store.
    pub fn new(store: S, config: RelayConfig) -> Self {
        Self { store, registry: ConnectionRegistry::new(), config }
    }

    /// Connection registry, for inspection.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Account store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one event.
    pub fn process_event(&mut self, event: RelayEvent) -> Vec<RelayAction> {
        match event {
            RelayEvent::ConnectionAccepted { session_id } => {
                if !self.registry.register_session(session_id) {
                    return vec![
                        RelayAction::log(
                            LogLevel::Error,
                            format!("duplicate session id {session_id}"),
                        ),
                        RelayAction::CloseConnection {
                            session_id,
                            reason: "duplicate session id".to_string(),
                        },
                    ];
                }
                vec![RelayAction::log(LogLevel::Debug, format!("session {session_id} connected"))]
            },
            RelayEvent::FrameReceived { session_id, frame } => {
                self.handle_frame(session_id, &frame)
            },
            RelayEvent::ConnectionClosed { session_id, reason } => {
                match self.registry.unregister_session(session_id) {
                    Some((info, _rooms)) => vec![RelayAction::log(
                        LogLevel::Debug,
                        format!("session {session_id} ({:?}) closed: {reason}", info.user),
                    )],
                    None => Vec::new(),
                }
            },
        }
    }

    fn handle_frame(&mut self, session_id: u64, frame: &str) -> Vec<RelayAction> {
        if self.registry.session(session_id).is_none() {
            return vec![RelayAction::log(
                LogLevel::Warn,
                format!("frame from unknown session {session_id}"),
            )];
        }

        let envelope = match decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                return vec![RelayAction::log(
                    LogLevel::Warn,
                    format!("session {session_id}: dropping frame: {e}"),
                )];
            },
        };

        match envelope.kind() {
            EnvelopeKind::Signup => self.handle_signup(session_id, &envelope),
            EnvelopeKind::Login => self.handle_login(session_id, &envelope),
            EnvelopeKind::Join => self.handle_join(session_id, &envelope),
            EnvelopeKind::Message => self.handle_message(session_id, &envelope),
            EnvelopeKind::LoginResult | EnvelopeKind::SignupResult | EnvelopeKind::Unknown(_) => {
                vec![RelayAction::log(
                    LogLevel::Debug,
                    format!("session {session_id}: ignoring {} envelope", envelope.kind()),
                )]
            },
        }
    }

    fn handle_signup(&mut self, session_id: u64, envelope: &Envelope) -> Vec<RelayAction> {
        let (user, password) = credentials(envelope);
        let Some(user) = user.filter(|_| !password.trim().is_empty()) else {
            let missing = Envelope::signup_result(Status::Failure, MSG_MISSING_CREDENTIALS);
            return reply(session_id, missing);
        };

        let (status, message, log) = match self.store.register(&user, password) {
            Ok(()) => (Status::Success, MSG_REGISTERED, None),
            Err(StoreError::UserExists) => (Status::Failure, MSG_USERNAME_TAKEN, None),
            Err(e) => (Status::Failure, MSG_UNAVAILABLE, Some(e)),
        };

        let mut actions = reply(session_id, Envelope::signup_result(status, message));
        if let Some(e) = log {
            let message = format!("signup for {user} failed: {e}");
            actions.push(RelayAction::log(LogLevel::Error, message));
        } else if status == Status::Success {
            actions.push(RelayAction::log(LogLevel::Info, format!("registered {user}")));
        }
        actions
    }

    fn handle_login(&mut self, session_id: u64, envelope: &Envelope) -> Vec<RelayAction> {
        let (user, password) = credentials(envelope);
        let Some(user) = user else {
            return reply(session_id, Envelope::login_result(Status::Failure, MSG_INVALID_USERNAME));
        };

        let outcome = if envelope.password().is_none() {
            // Bare logins carry no password and are never accepted.
            match self.store.verify(&user, "") {
                Err(StoreError::UnknownUser) => Err(StoreError::UnknownUser),
                _ => Err(StoreError::WrongPassword),
            }
        } else {
            self.store.verify(&user, password)
        };

        match outcome {
            Ok(()) => {
                self.registry.login(session_id, user.clone());
                let mut actions =
                    reply(session_id, Envelope::login_result(Status::Success, MSG_LOGIN_OK));
                actions.push(RelayAction::log(
                    LogLevel::Info,
                    format!("session {session_id} logged in as {user}"),
                ));
                actions
            },
            Err(StoreError::UnknownUser) => {
                reply(session_id, Envelope::login_result(Status::Failure, MSG_INVALID_USERNAME))
            },
            Err(StoreError::WrongPassword | StoreError::UserExists) => {
                reply(session_id, Envelope::login_result(Status::Failure, MSG_INVALID_PASSWORD))
            },
            Err(e @ StoreError::Unavailable(_)) => {
                let mut actions =
                    reply(session_id, Envelope::login_result(Status::Failure, MSG_UNAVAILABLE));
                actions.push(RelayAction::log(LogLevel::Error, format!("login for {user}: {e}")));
                actions
            },
        }
    }

    fn handle_join(&mut self, session_id: u64, envelope: &Envelope) -> Vec<RelayAction> {
        if self.registry.user(session_id).is_none() {
            return vec![RelayAction::log(
                LogLevel::Warn,
                format!("session {session_id}: join before login"),
            )];
        }

        match envelope.destination() {
            Some(Destination::Room(room)) => {
                self.registry.join(session_id, room.clone());
                vec![RelayAction::log(
                    LogLevel::Debug,
                    format!("session {session_id} joined #{room}"),
                )]
            },
            Some(Destination::DirectPeer(_)) | None => Vec::new(),
        }
    }

    fn handle_message(&mut self, session_id: u64, envelope: &Envelope) -> Vec<RelayAction> {
        let Some(user) = self.registry.user(session_id).cloned() else {
            return vec![RelayAction::log(
                LogLevel::Warn,
                format!("session {session_id}: message before login"),
            )];
        };
        let Some(destination) = envelope.destination() else {
            return Vec::new();
        };

        let mut recipients: BTreeSet<u64> = match destination {
            Destination::Room(room) => self.registry.sessions_in_room(room).collect(),
            Destination::DirectPeer(peer) => self.registry.sessions_for_user(peer).collect(),
        };
        if self.config.echo {
            recipients.insert(session_id);
        } else {
            recipients.remove(&session_id);
        }

        // The sender is whoever logged in on this connection.
        let frame = encode(&envelope.with_sender(user));
        recipients
            .into_iter()
            .map(|session_id| RelayAction::SendToSession { session_id, frame: frame.clone() })
            .collect()
    }
}

fn credentials(envelope: &Envelope) -> (Option<UserId>, &str) {
    let user = envelope.sender().filter(|user| !user.as_str().trim().is_empty()).cloned();
    (user, envelope.password().unwrap_or_default())
}

fn reply(session_id: u64, envelope: Envelope) -> Vec<RelayAction> {
    vec![RelayAction::SendToSession { session_id, frame: encode(&envelope) }]
}
