//! Storage errors.

use thiserror::Error;

/// Errors from a [`super::UserStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Account name already registered
    #[error("user already exists")]
    UserExists,

    /// No account with this name
    #[error("unknown user")]
    UnknownUser,

    /// Password does not match
    #[error("wrong password")]
    WrongPassword,

    /// Backend could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true for errors that say something about the credentials
    /// rather than the backend.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::UserExists | Self::UnknownUser | Self::WrongPassword)
    }
}
