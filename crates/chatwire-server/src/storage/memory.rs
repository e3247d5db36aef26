use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chatwire_proto::UserId;

use super::{StoreError, UserStore};

/// In-memory account table.
///
/// Accounts live as long as the process; nothing is persisted. All state is
/// wrapped in Arc<Mutex<>> to allow Clone and concurrent access. A poisoned
/// mutex surfaces as [`StoreError::Unavailable`].
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<Mutex<HashMap<UserId, String>>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.lock().map(|users| users.len()).unwrap_or(0)
    }

    /// True if no account is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<UserId, String>>, StoreError> {
        self.inner.lock().map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl UserStore for MemoryUserStore {
    fn register(&self, user: &UserId, password: &str) -> Result<(), StoreError> {
        let mut users = self.lock()?;
        if users.contains_key(user) {
            return Err(StoreError::UserExists);
        }
        users.insert(user.clone(), password.to_string());
        Ok(())
    }

    fn verify(&self, user: &UserId, password: &str) -> Result<(), StoreError> {
        let users = self.lock()?;
        match users.get(user) {
            None => Err(StoreError::UnknownUser),
            Some(stored) if stored == password => Ok(()),
            Some(_) => Err(StoreError::WrongPassword),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_verify() {
        let store = MemoryUserStore::new();
        let alice = UserId::new("alice");

        store.register(&alice, "secret").unwrap();
        assert!(store.verify(&alice, "secret").is_ok());
        assert_eq!(store.verify(&alice, "nope"), Err(StoreError::WrongPassword));
        assert_eq!(store.verify(&UserId::new("bob"), "secret"), Err(StoreError::UnknownUser));
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let store = MemoryUserStore::new();
        let alice = UserId::new("alice");

        store.register(&alice, "one").unwrap();
        assert_eq!(store.register(&alice, "two"), Err(StoreError::UserExists));
        assert!(store.verify(&alice, "one").is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clones_share_accounts() {
        let store = MemoryUserStore::new();
        let clone = store.clone();

        store.register(&UserId::new("alice"), "pw").unwrap();
        assert!(clone.verify(&UserId::new("alice"), "pw").is_ok());
    }
}
