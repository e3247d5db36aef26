//! Authenticated identity.

use chatwire_proto::UserId;

/// Identity bound to a session once the server accepted its credentials.
///
/// Only [`crate::Handshake`] produces one in normal operation. Router and
/// conversation logic take it as proof that authentication succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserContext {
    user: UserId,
}

impl UserContext {
    /// Context for `user`.
    pub fn new(user: UserId) -> Self {
        Self { user }
    }

    /// Authenticated user.
    pub fn user(&self) -> &UserId {
        &self.user
    }
}
