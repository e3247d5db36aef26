//! Connection registry for login and room membership tracking.
//!
//! The registry maintains bidirectional mappings: room → sessions (for room
//! fan-out), session → rooms (for cleanup on disconnect), and user →
//! sessions (for direct messages). A user may be logged in on several
//! connections at once; each receives its direct messages.
//!
//! Sessions must explicitly join rooms - no lazy membership. When a session
//! is unregistered, all its memberships and its login are removed with it.

use std::collections::{BTreeSet, HashMap, HashSet};

use chatwire_proto::{RoomId, UserId};

/// Information about a registered session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// User logged in on this connection, if any
    pub user: Option<UserId>,
}

/// Registry for tracking sessions, logins, and room memberships.
///
/// Session sets are ordered so fan-out is deterministic.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Session ID → session info
    sessions: HashMap<u64, SessionInfo>,
    /// Room → joined sessions
    room_members: HashMap<RoomId, BTreeSet<u64>>,
    /// Session ID → joined rooms
    session_rooms: HashMap<u64, HashSet<RoomId>>,
    /// User → sessions logged in as that user
    user_sessions: HashMap<UserId, BTreeSet<u64>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, not yet logged in session.
    ///
    /// Returns `false` if the session already exists.
    pub fn register_session(&mut self, session_id: u64) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }

        self.sessions.insert(session_id, SessionInfo::default());
        self.session_rooms.insert(session_id, HashSet::new());
        true
    }

    /// Unregister a session, dropping its login and memberships.
    ///
    /// Returns the session info if it existed, along with the rooms it was in.
    pub fn unregister_session(
        &mut self,
        session_id: u64,
    ) -> Option<(SessionInfo, HashSet<RoomId>)> {
        let info = self.sessions.remove(&session_id)?;
        let rooms = self.session_rooms.remove(&session_id).unwrap_or_default();

        if let Some(user) = &info.user {
            self.forget_login(user, session_id);
        }

        for room in &rooms {
            if let Some(members) = self.room_members.get_mut(room) {
                members.remove(&session_id);
                if members.is_empty() {
                    self.room_members.remove(room);
                }
            }
        }

        Some((info, rooms))
    }

    /// Session metadata. `None` if session doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// User logged in on a session.
    pub fn user(&self, session_id: u64) -> Option<&UserId> {
        self.sessions.get(&session_id).and_then(|info| info.user.as_ref())
    }

    /// Record a successful login, replacing any earlier login on the same
    /// connection.
    ///
    /// Returns `false` if the session is not registered.
    pub fn login(&mut self, session_id: u64, user: UserId) -> bool {
        let Some(info) = self.sessions.get_mut(&session_id) else {
            return false;
        };

        let previous = info.user.replace(user.clone());
        if let Some(previous) = previous {
            self.forget_login(&previous, session_id);
        }
        self.user_sessions.entry(user).or_default().insert(session_id);
        true
    }

    /// Add a session to a room.
    ///
    /// Returns `false` if the session is not registered.
    pub fn join(&mut self, session_id: u64, room: RoomId) -> bool {
        if !self.sessions.contains_key(&session_id) {
            return false;
        }

        self.room_members.entry(room.clone()).or_default().insert(session_id);
        self.session_rooms.entry(session_id).or_default().insert(room);
        true
    }

    /// Check if a session joined a room.
    pub fn is_member(&self, session_id: u64, room: &RoomId) -> bool {
        self.room_members.get(room).is_some_and(|members| members.contains(&session_id))
    }

    /// All sessions that joined a room, in ascending order.
    pub fn sessions_in_room(&self, room: &RoomId) -> impl Iterator<Item = u64> + '_ {
        self.room_members.get(room).into_iter().flat_map(|members| members.iter().copied())
    }

    /// All sessions logged in as `user`, in ascending order.
    pub fn sessions_for_user(&self, user: &UserId) -> impl Iterator<Item = u64> + '_ {
        self.user_sessions.get(user).into_iter().flat_map(|sessions| sessions.iter().copied())
    }

    /// Total number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of sessions in a room.
    pub fn room_member_count(&self, room: &RoomId) -> usize {
        self.room_members.get(room).map_or(0, BTreeSet::len)
    }

    fn forget_login(&mut self, user: &UserId, session_id: u64) {
        if let Some(sessions) = self.user_sessions.get_mut(user) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                self.user_sessions.remove(user);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup_session() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register_session(1));
        assert!(!registry.register_session(1));
        assert_eq!(registry.session(1), Some(&SessionInfo::default()));
        assert!(registry.user(1).is_none());
    }

    #[test]
    fn login_indexes_user_sessions() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.register_session(2);

        assert!(registry.login(1, UserId::new("alice")));
        assert!(registry.login(2, UserId::new("alice")));
        assert!(!registry.login(3, UserId::new("alice")));

        let sessions: Vec<_> = registry.sessions_for_user(&UserId::new("alice")).collect();
        assert_eq!(sessions, vec![1, 2]);
    }

    #[test]
    fn relogin_replaces_previous_user() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);

        registry.login(1, UserId::new("alice"));
        registry.login(1, UserId::new("bob"));

        assert_eq!(registry.user(1), Some(&UserId::new("bob")));
        assert_eq!(registry.sessions_for_user(&UserId::new("alice")).count(), 0);
    }

    #[test]
    fn join_unregistered_session_fails() {
        let mut registry = ConnectionRegistry::new();
        assert!(!registry.join(999, RoomId::new("general")));
    }

    #[test]
    fn unregister_session_removes_everything() {
        let mut registry = ConnectionRegistry::new();
        let general = RoomId::new("general");
        registry.register_session(1);
        registry.register_session(2);
        registry.login(1, UserId::new("alice"));
        registry.join(1, general.clone());
        registry.join(2, general.clone());

        let (info, rooms) = registry.unregister_session(1).unwrap();
        assert_eq!(info.user, Some(UserId::new("alice")));
        assert!(rooms.contains(&general));

        assert!(!registry.is_member(1, &general));
        assert!(registry.is_member(2, &general));
        assert_eq!(registry.room_member_count(&general), 1);
        assert_eq!(registry.sessions_for_user(&UserId::new("alice")).count(), 0);
        assert_eq!(registry.session_count(), 1);
    }
}
