//! Error types for the session core.
//!
//! Two families: errors returned synchronously when an operation is invalid
//! for the current state ([`SessionError`], [`HandshakeError`],
//! [`RouterError`]), and [`HandshakeFailure`], the terminal outcome of a
//! credential exchange that the handshake reports through its actions.

use std::time::Duration;

use chatwire_proto::EnvelopeKind;
use thiserror::Error;

use crate::{handshake::HandshakeState, session::ConnectionState};

/// Errors raised by the connection lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Envelope cannot be sent in the current state
    #[error("session not open: cannot send {kind} while {state:?}")]
    NotOpen {
        /// Current state when the send was attempted
        state: ConnectionState,
        /// Kind of the rejected envelope
        kind: EnvelopeKind,
    },

    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// Errors raised synchronously by the handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// A credential submission is already awaiting the server
    #[error("a credential submission is already in flight")]
    SessionBusy,

    /// Username or password was blank
    #[error("Username and password are required.")]
    MissingCredentials,

    /// Operation not valid in the current handshake state
    #[error("invalid handshake transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: HandshakeState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Response did not match the outstanding request
    #[error("unexpected {kind} response in state {state:?}")]
    UnexpectedResponse {
        /// Kind of the response envelope
        kind: EnvelopeKind,
        /// Current state when the response arrived
        state: HandshakeState,
    },
}

/// Terminal outcome of a credential exchange that did not authenticate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// Server refused the credentials. `message` is shown to the user as-is.
    #[error("{message}")]
    Rejected {
        /// Server-provided explanation
        message: String,
    },

    /// No response within the handshake timeout
    #[error("no response from server after {elapsed:?}")]
    Timeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Transport closed while a response was outstanding
    #[error("connection lost during authentication")]
    ConnectionLost,
}

impl HandshakeFailure {
    /// Returns true if a fresh attempt may succeed without user changes.
    ///
    /// A rejection needs different credentials, so it is not retryable.
    /// Timeouts and lost connections need a new session but the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ConnectionLost)
    }
}

/// Errors raised by the channel router.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// No conversation is open
    #[error("no active destination")]
    NoActiveDestination,
}
