//! Authentication handshake state machine.
//!
//! Turns a credential submission into an authenticated [`UserContext`] or a
//! typed [`HandshakeFailure`]. One transition function, [`Handshake::handle`],
//! consumes [`HandshakeEvent`]s and returns [`HandshakeAction`]s; the caller
//! writes `Send` envelopes to the transport and reports server responses,
//! transport loss, and clock ticks back in.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ ready  ┌─────────────────────┐ submit ┌───────────────────┐
//! │ Idle │───────>│ AwaitingCredentials │───────>│ AwaitingServerAck │
//! └──────┘        └─────────────────────┘        └───────────────────┘
//!    ^                                                     │
//!    │ signup ok        ┌───────────────┬──────────────────┼──────────────┐
//!    └──────────────────┤ login ok      │ failure          │ deadline     │ lost
//!                       ↓               ↓                  ↓              ↓
//!              ┌───────────────┐  ┌──────────┐      ┌──────────┐  ┌────────────────┐
//!              │ Authenticated │  │ Rejected │      │ TimedOut │  │ ConnectionLost │
//!              └───────────────┘  └──────────┘      └──────────┘  └────────────────┘
//! ```
//!
//! `Idle` and `Rejected` also accept a submission directly.
//!
//! Only one submission may be in flight. `TimedOut` and `ConnectionLost` are
//! terminal: recovery is a fresh session with a fresh handshake.

use std::{fmt, ops::Sub, time::Duration};

use chatwire_proto::{Envelope, EnvelopeKind, UserId};
use tracing::{debug, info, warn};

use crate::{
    context::UserContext,
    error::{HandshakeError, HandshakeFailure},
    session::DEFAULT_HANDSHAKE_TIMEOUT,
};

/// Which credential exchange a submission performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CredentialMode {
    /// Authenticate an existing account
    #[default]
    Login,
    /// Register a new account
    Signup,
}

/// Username and password entered by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    mode: CredentialMode,
    username: String,
    password: String,
}

impl Credentials {
    /// Credentials for a login.
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { mode: CredentialMode::Login, username: username.into(), password: password.into() }
    }

    /// Credentials for a signup.
    pub fn signup(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { mode: CredentialMode::Signup, username: username.into(), password: password.into() }
    }

    /// Exchange these credentials are for.
    pub fn mode(&self) -> CredentialMode {
        self.mode
    }

    /// Username as entered.
    pub fn username(&self) -> &str {
        &self.username
    }

    fn is_blank(&self) -> bool {
        self.username.trim().is_empty() || self.password.trim().is_empty()
    }

    fn into_envelope(self, user: UserId) -> Envelope {
        match self.mode {
            CredentialMode::Login => Envelope::login(user, self.password),
            CredentialMode::Signup => Envelope::signup(user, self.password),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mode", &self.mode)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Handshake state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Transport not ready, or a signup just completed
    Idle,
    /// Transport ready, nothing submitted yet
    AwaitingCredentials,
    /// Submission sent, waiting for the matching result
    AwaitingServerAck {
        /// Exchange in flight
        mode: CredentialMode,
    },
    /// Server accepted a login
    Authenticated,
    /// Server refused the last submission
    Rejected {
        /// Server-provided explanation, verbatim
        message: String,
    },
    /// Server did not answer in time
    TimedOut,
    /// Transport lost while waiting for the server
    ConnectionLost,
}

impl HandshakeState {
    /// True for `TimedOut` and `ConnectionLost`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TimedOut | Self::ConnectionLost)
    }
}

/// Events fed into the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// Transport is connected
    TransportReady,
    /// User submitted credentials
    Submit(Credentials),
    /// Server result envelope
    Response(Envelope),
    /// Transport closed or failed
    TransportLost,
    /// Clock tick for timeout processing
    Tick,
}

/// Actions returned by the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Write this envelope to the transport
    Send(Envelope),
    /// Login accepted
    Authenticated(UserContext),
    /// Server refused the submission
    Rejected {
        /// Server-provided explanation, verbatim
        message: String,
    },
    /// Signup accepted; the user should now log in
    SignedUp {
        /// Server-provided confirmation
        message: String,
    },
    /// No response within the handshake timeout
    TimedOut {
        /// How long we waited
        elapsed: Duration,
    },
    /// Transport lost while a response was outstanding
    ConnectionLost,
}

impl HandshakeAction {
    /// The failure this action reports, if it reports one.
    pub fn failure(&self) -> Option<HandshakeFailure> {
        match self {
            Self::Rejected { message } => {
                Some(HandshakeFailure::Rejected { message: message.clone() })
            },
            Self::TimedOut { elapsed } => Some(HandshakeFailure::Timeout { elapsed: *elapsed }),
            Self::ConnectionLost => Some(HandshakeFailure::ConnectionLost),
            Self::Send(_) | Self::Authenticated(_) | Self::SignedUp { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Pending<I> {
    user: UserId,
    sent_at: I,
}

/// Credential exchange for one session.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Handshake<I> {
    state: HandshakeState,
    mode: CredentialMode,
    timeout: Duration,
    pending: Option<Pending<I>>,
}

impl<I> Default for Handshake<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl<I> Handshake<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a handshake in [`HandshakeState::Idle`].
    pub fn new(timeout: Duration) -> Self {
        Self { state: HandshakeState::Idle, mode: CredentialMode::Login, timeout, pending: None }
    }

    /// Current handshake state
    #[must_use]
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Mode of the last submission. Switches back to `Login` after a signup
    /// succeeds.
    #[must_use]
    pub fn mode(&self) -> CredentialMode {
        self.mode
    }

    /// True while a submission awaits the server.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self.state, HandshakeState::AwaitingServerAck { .. })
    }

    /// Process one event.
    ///
    /// # Errors
    ///
    /// - `HandshakeError::SessionBusy` on submit while a submission is in
    ///   flight
    /// - `HandshakeError::MissingCredentials` on blank username or password
    /// - `HandshakeError::InvalidState` on submit after authentication or a
    ///   terminal failure, or on a repeated `TransportReady`
    /// - `HandshakeError::UnexpectedResponse` on a result that does not match
    ///   the outstanding submission
    pub fn handle(
        &mut self,
        event: HandshakeEvent,
        now: I,
    ) -> Result<Vec<HandshakeAction>, HandshakeError> {
        match event {
            HandshakeEvent::TransportReady => self.transport_ready(),
            HandshakeEvent::Submit(credentials) => self.submit(credentials, now),
            HandshakeEvent::Response(envelope) => self.response(envelope),
            HandshakeEvent::TransportLost => Ok(self.transport_lost()),
            HandshakeEvent::Tick => Ok(self.tick(now)),
        }
    }

    fn transport_ready(&mut self) -> Result<Vec<HandshakeAction>, HandshakeError> {
        match self.state {
            HandshakeState::Idle => {
                self.state = HandshakeState::AwaitingCredentials;
                Ok(Vec::new())
            },
            HandshakeState::AwaitingCredentials => Ok(Vec::new()),
            _ => Err(HandshakeError::InvalidState {
                state: self.state.clone(),
                operation: "transport_ready",
            }),
        }
    }

    fn submit(
        &mut self,
        credentials: Credentials,
        now: I,
    ) -> Result<Vec<HandshakeAction>, HandshakeError> {
        match self.state {
            HandshakeState::AwaitingServerAck { .. } => return Err(HandshakeError::SessionBusy),
            HandshakeState::Authenticated
            | HandshakeState::TimedOut
            | HandshakeState::ConnectionLost => {
                return Err(HandshakeError::InvalidState {
                    state: self.state.clone(),
                    operation: "submit",
                });
            },
            HandshakeState::Idle
            | HandshakeState::AwaitingCredentials
            | HandshakeState::Rejected { .. } => {},
        }

        if credentials.is_blank() {
            return Err(HandshakeError::MissingCredentials);
        }

        let mode = credentials.mode();
        let user = UserId::new(credentials.username().trim());
        let envelope = credentials.into_envelope(user.clone());

        debug!(?mode, %user, "submitting credentials");
        self.mode = mode;
        self.state = HandshakeState::AwaitingServerAck { mode };
        self.pending = Some(Pending { user, sent_at: now });

        Ok(vec![HandshakeAction::Send(envelope)])
    }

    fn response(&mut self, envelope: Envelope) -> Result<Vec<HandshakeAction>, HandshakeError> {
        let HandshakeState::AwaitingServerAck { mode } = self.state else {
            warn!(kind = %envelope.kind(), state = ?self.state, "result outside a submission");
            return Err(HandshakeError::UnexpectedResponse {
                kind: envelope.kind().clone(),
                state: self.state.clone(),
            });
        };

        let expected = match mode {
            CredentialMode::Login => EnvelopeKind::LoginResult,
            CredentialMode::Signup => EnvelopeKind::SignupResult,
        };
        if *envelope.kind() != expected {
            warn!(kind = %envelope.kind(), %expected, "result does not match submission");
            return Err(HandshakeError::UnexpectedResponse {
                kind: envelope.kind().clone(),
                state: self.state.clone(),
            });
        }

        let pending = self.pending.take();
        let message = envelope.payload().to_string();

        if !envelope.is_success() {
            info!(?mode, %message, "credentials rejected");
            self.state = HandshakeState::Rejected { message: message.clone() };
            return Ok(vec![HandshakeAction::Rejected { message }]);
        }

        match (mode, pending) {
            (CredentialMode::Login, Some(pending)) => {
                info!(user = %pending.user, "authenticated");
                self.state = HandshakeState::Authenticated;
                Ok(vec![HandshakeAction::Authenticated(UserContext::new(pending.user))])
            },
            (CredentialMode::Signup, _) => {
                info!(%message, "signed up, switching to login");
                self.state = HandshakeState::Idle;
                self.mode = CredentialMode::Login;
                Ok(vec![HandshakeAction::SignedUp { message }])
            },
            (CredentialMode::Login, None) => Err(HandshakeError::UnexpectedResponse {
                kind: envelope.kind().clone(),
                state: self.state.clone(),
            }),
        }
    }

    fn transport_lost(&mut self) -> Vec<HandshakeAction> {
        match self.state {
            HandshakeState::AwaitingServerAck { .. } => {
                warn!("transport lost while awaiting server");
                self.pending = None;
                self.state = HandshakeState::ConnectionLost;
                vec![HandshakeAction::ConnectionLost]
            },
            HandshakeState::Idle
            | HandshakeState::AwaitingCredentials
            | HandshakeState::Rejected { .. } => {
                self.state = HandshakeState::ConnectionLost;
                Vec::new()
            },
            HandshakeState::Authenticated
            | HandshakeState::TimedOut
            | HandshakeState::ConnectionLost => Vec::new(),
        }
    }

    fn tick(&mut self, now: I) -> Vec<HandshakeAction> {
        let Some(pending) = &self.pending else {
            return Vec::new();
        };

        let elapsed = now - pending.sent_at;
        if elapsed > self.timeout {
            warn!(?elapsed, "handshake timed out");
            self.pending = None;
            self.state = HandshakeState::TimedOut;
            return vec![HandshakeAction::TimedOut { elapsed }];
        }

        Vec::new()
    }
}
