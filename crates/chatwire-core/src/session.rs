//! Connection lifecycle state machine.
//!
//! Tracks where a single transport connection is in its life and gates what
//! may be sent at each point. The machine performs no I/O: the driver reports
//! transport events and asks [`Session::check_send`] before writing a frame.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐  transport  ┌────────────────┐  login ok  ┌──────┐
//! │ Connecting │────────────>│ Authenticating │───────────>│ Open │
//! └────────────┘    ready    └────────────────┘            └──────┘
//!       │                            │                         │
//!       │        close / remote close / network failure        │
//!       ↓                            ↓                         ↓
//!               ┌────────┐                 ┌────────┐
//!               │ Closed │                 │ Failed │
//!               └────────┘                 └────────┘
//! ```
//!
//! `Closed` and `Failed` are terminal. Exactly one terminal transition
//! happens per session; later transport events are ignored.

use std::time::Duration;

use chatwire_proto::{Envelope, EnvelopeKind};
use tracing::{debug, info};

use crate::{context::UserContext, error::SessionError};

/// Time allowed for the server to answer a credential submission.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How far back an inbound message is compared against optimistic entries.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(10);

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Transport connect in progress
    Connecting,
    /// Transport up, credentials not yet accepted
    Authenticating,
    /// Authenticated, conversation traffic allowed
    Open,
    /// Closed locally or by the server
    Closed,
    /// Transport failed abruptly
    Failed,
}

impl ConnectionState {
    /// True for `Closed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for a credential submission
    pub handshake_timeout: Duration,
    /// Recency window for echo suppression
    pub dedup_window: Duration,
    /// Whether inbound messages are checked against optimistic entries
    pub dedup_echoes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            dedup_echoes: true,
        }
    }
}

/// Connection lifecycle for one conversation view.
#[derive(Debug, Clone)]
pub struct Session {
    state: ConnectionState,
    context: Option<UserContext>,
    terminal_reason: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session in [`ConnectionState::Connecting`].
    pub fn new() -> Self {
        Self { state: ConnectionState::Connecting, context: None, terminal_reason: None }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Authenticated identity. `None` unless the session is `Open`.
    #[must_use]
    pub fn context(&self) -> Option<&UserContext> {
        self.context.as_ref()
    }

    /// Close reason or failure cause once terminal.
    #[must_use]
    pub fn terminal_reason(&self) -> Option<&str> {
        self.terminal_reason.as_deref()
    }

    /// True while the transport is connecting or connected.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.state.is_terminal()
    }

    /// True if inbound frames should be processed.
    #[must_use]
    pub fn accepts_inbound(&self) -> bool {
        matches!(self.state, ConnectionState::Authenticating | ConnectionState::Open)
    }

    /// Transport reported it is connected.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not `Connecting`
    pub fn transport_opened(&mut self) -> Result<(), SessionError> {
        if self.state != ConnectionState::Connecting {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "transport_opened",
            });
        }

        self.state = ConnectionState::Authenticating;
        debug!("transport connected, awaiting credentials");
        Ok(())
    }

    /// Handshake accepted the credentials.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not `Authenticating`
    pub fn authenticated(&mut self, context: UserContext) -> Result<(), SessionError> {
        if self.state != ConnectionState::Authenticating {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "authenticated",
            });
        }

        info!(user = %context.user(), "session open");
        self.context = Some(context);
        self.state = ConnectionState::Open;
        Ok(())
    }

    /// Check that `envelope` may be written to the transport now.
    ///
    /// Credential envelopes may be sent while `Authenticating` or `Open`.
    /// Everything else requires `Open`.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotOpen` if the current state forbids the send
    pub fn check_send(&self, envelope: &Envelope) -> Result<(), SessionError> {
        let allowed = match (self.state, envelope.kind()) {
            (ConnectionState::Authenticating, EnvelopeKind::Login | EnvelopeKind::Signup) => {
                true
            },
            (state, _) => state == ConnectionState::Open,
        };

        if allowed {
            Ok(())
        } else {
            Err(SessionError::NotOpen { state: self.state, kind: envelope.kind().clone() })
        }
    }

    /// Local close. Returns `true` only for the call that ended the session,
    /// so the driver closes the transport exactly once.
    pub fn close(&mut self) -> bool {
        self.terminate(ConnectionState::Closed, "closed by client")
    }

    /// Transport closed by the remote side.
    pub fn transport_closed(&mut self, reason: impl Into<String>) -> bool {
        self.terminate(ConnectionState::Closed, reason)
    }

    /// Transport failed abruptly.
    pub fn transport_failed(&mut self, cause: impl Into<String>) -> bool {
        self.terminate(ConnectionState::Failed, cause)
    }

    fn terminate(&mut self, target: ConnectionState, reason: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            debug!(state = ?self.state, "session already ended, ignoring terminal event");
            return false;
        }

        let reason = reason.into();
        info!(from = ?self.state, to = ?target, %reason, "session ended");
        self.state = target;
        self.context = None;
        self.terminal_reason = Some(reason);
        true
    }
}
