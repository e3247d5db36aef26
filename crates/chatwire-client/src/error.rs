//! Client error types.

use chatwire_core::{HandshakeError, RouterError, SessionError};
use thiserror::Error;

/// Errors returned synchronously by [`crate::Client::handle`].
///
/// Every variant is caller misuse or a protocol mismatch that leaves the
/// session usable. Failures the user should see in place (rejected
/// credentials, lost connection, undeliverable messages) are reported as
/// actions instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Operation not allowed in the current connection state.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Credential exchange misuse or unexpected server result.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// No conversation is open.
    #[error(transparent)]
    Router(#[from] RouterError),
}

impl ClientError {
    /// Returns true if the error should be shown to the user rather than
    /// only logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Handshake(HandshakeError::SessionBusy | HandshakeError::MissingCredentials)
                | Self::Session(SessionError::NotOpen { .. })
                | Self::Router(RouterError::NoActiveDestination)
        )
    }
}
