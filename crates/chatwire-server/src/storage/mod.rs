//! User account storage.
//!
//! Trait-based abstraction over the account table the relay authenticates
//! against. The trait is synchronous (no async) so the relay stays a pure
//! state machine.

mod error;
mod memory;

use chatwire_proto::UserId;
pub use error::StoreError;
pub use memory::MemoryUserStore;

/// Account storage.
///
/// Must be Clone (shared between the relay and tests), Send + Sync
/// (thread-safe), and synchronous (no async methods). Implementations
/// typically share internal state via Arc, so clones access the same
/// accounts.
pub trait UserStore: Clone + Send + Sync + 'static {
    /// Create an account.
    ///
    /// # Errors
    ///
    /// - `StoreError::UserExists` if the name is taken
    fn register(&self, user: &UserId, password: &str) -> Result<(), StoreError>;

    /// Check a password.
    ///
    /// # Errors
    ///
    /// - `StoreError::UnknownUser` if no such account exists
    /// - `StoreError::WrongPassword` if the password does not match
    fn verify(&self, user: &UserId, password: &str) -> Result<(), StoreError>;
}
