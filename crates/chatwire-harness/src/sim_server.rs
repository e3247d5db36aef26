//! In-process relay for simulated clients.
//!
//! `SimServer` wraps the same [`Relay`] the production server runs, but
//! delivers its output into per-session mailboxes instead of sockets. Drivers
//! pull from their mailbox one event at a time, so delivery order is fully
//! determined by the test.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use chatwire_app::DriverEvent;
use chatwire_proto::UserId;
use chatwire_server::{
    LogLevel, MemoryUserStore, Relay, RelayAction, RelayConfig, RelayEvent, StoreError, UserStore,
};

/// Relay shared by every simulated client.
pub type SharedSimServer = Arc<Mutex<SimServer>>;

/// Create a shared server with the default relay configuration.
pub fn create_shared_server() -> SharedSimServer {
    Arc::new(Mutex::new(SimServer::new(RelayConfig::default())))
}

/// Simulated relay.
///
/// Sessions are numbered from 1 in accept order.
pub struct SimServer {
    relay: Relay<MemoryUserStore>,
    /// Sessions the relay still considers connected
    open: HashSet<u64>,
    /// Pending deliveries per session
    mailboxes: HashMap<u64, VecDeque<DriverEvent>>,
    /// Sessions whose inbound frames are discarded
    muted: HashSet<u64>,
    next_session_id: u64,
    dropped: usize,
}

impl SimServer {
    /// Create a server with its own empty account store.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            relay: Relay::new(MemoryUserStore::new(), config),
            open: HashSet::new(),
            mailboxes: HashMap::new(),
            muted: HashSet::new(),
            next_session_id: 1,
            dropped: 0,
        }
    }

    /// The wrapped relay, for inspection.
    pub fn relay(&self) -> &Relay<MemoryUserStore> {
        &self.relay
    }

    /// Create an account directly, bypassing the protocol.
    pub fn register_user(&self, user: &str, password: &str) -> Result<(), StoreError> {
        self.relay.store().register(&UserId::new(user), password)
    }

    /// Accept a new connection and return its session id.
    pub fn accept(&mut self) -> u64 {
        let session_id = self.next_session_id;
        self.next_session_id += 1;

        self.open.insert(session_id);
        self.mailboxes.insert(session_id, VecDeque::new());
        let actions = self.relay.process_event(RelayEvent::ConnectionAccepted { session_id });
        self.execute(actions);
        session_id
    }

    /// Feed a frame from a client to the relay.
    pub fn receive(&mut self, session_id: u64, frame: String) {
        if !self.open.contains(&session_id) {
            tracing::debug!(session_id, "frame after close ignored");
            return;
        }
        let actions = self.relay.process_event(RelayEvent::FrameReceived { session_id, frame });
        self.execute(actions);
    }

    /// The client side closed the connection.
    ///
    /// Undelivered mail for the session is discarded.
    pub fn disconnect(&mut self, session_id: u64, reason: &str) {
        self.mailboxes.remove(&session_id);
        self.muted.remove(&session_id);
        self.end_session(session_id, reason);
    }

    /// Close a connection from the server side.
    ///
    /// The client sees the close after any mail already queued for it.
    pub fn kick(&mut self, session_id: u64, reason: &str) {
        if !self.open.contains(&session_id) {
            return;
        }
        if let Some(mailbox) = self.mailboxes.get_mut(&session_id) {
            mailbox.push_back(DriverEvent::TransportClosed { reason: reason.to_string() });
        }
        self.end_session(session_id, reason);
    }

    /// Discard (or resume delivering) frames addressed to a session.
    pub fn set_muted(&mut self, session_id: u64, muted: bool) {
        if muted {
            self.muted.insert(session_id);
        } else {
            self.muted.remove(&session_id);
        }
    }

    /// Next delivery for a session.
    pub fn take_delivery(&mut self, session_id: u64) -> Option<DriverEvent> {
        self.mailboxes.get_mut(&session_id).and_then(VecDeque::pop_front)
    }

    /// Whether a session has mail waiting.
    pub fn has_mail(&self, session_id: u64) -> bool {
        self.mailboxes.get(&session_id).is_some_and(|mailbox| !mailbox.is_empty())
    }

    /// Whether the relay still considers a session connected.
    pub fn is_open(&self, session_id: u64) -> bool {
        self.open.contains(&session_id)
    }

    /// Frames discarded because their session was muted.
    pub fn dropped_frames(&self) -> usize {
        self.dropped
    }

    fn end_session(&mut self, session_id: u64, reason: &str) {
        if !self.open.remove(&session_id) {
            return;
        }
        let actions = self.relay.process_event(RelayEvent::ConnectionClosed {
            session_id,
            reason: reason.to_string(),
        });
        self.execute(actions);
    }

    fn execute(&mut self, actions: Vec<RelayAction>) {
        for action in actions {
            match action {
                RelayAction::SendToSession { session_id, frame } => {
                    if self.muted.contains(&session_id) {
                        self.dropped += 1;
                        continue;
                    }
                    if let Some(mailbox) = self.mailboxes.get_mut(&session_id) {
                        mailbox.push_back(DriverEvent::Frame(frame));
                    }
                },
                RelayAction::CloseConnection { session_id, reason } => {
                    self.kick(session_id, &reason);
                },
                RelayAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chatwire_proto::{Destination, Envelope, Timestamp, decode, encode};

    use super::*;

    fn logged_in(server: &mut SimServer, user: &str) -> u64 {
        let session = server.accept();
        server.receive(session, encode(&Envelope::login(UserId::new(user), "pw")));
        assert!(matches!(server.take_delivery(session), Some(DriverEvent::Frame(_))));
        session
    }

    #[test]
    fn room_messages_reach_every_member() {
        let mut server = SimServer::new(RelayConfig::default());
        server.register_user("alice", "pw").unwrap();
        server.register_user("bob", "pw").unwrap();
        let alice = logged_in(&mut server, "alice");
        let bob = logged_in(&mut server, "bob");

        for (session, user) in [(alice, "alice"), (bob, "bob")] {
            let join = Envelope::join(UserId::new(user), Destination::room("general"));
            server.receive(session, encode(&join));
        }
        let message = Envelope::message(
            UserId::new("alice"),
            Destination::room("general"),
            "hi",
            Timestamp::Unknown,
        );
        server.receive(alice, encode(&message));

        for session in [alice, bob] {
            let Some(DriverEvent::Frame(frame)) = server.take_delivery(session) else {
                panic!("session {session} got no message");
            };
            assert_eq!(decode(&frame).unwrap().payload(), "hi");
        }
    }

    #[test]
    fn muted_sessions_lose_their_mail() {
        let mut server = SimServer::new(RelayConfig::default());
        server.register_user("alice", "pw").unwrap();
        let session = server.accept();
        server.set_muted(session, true);

        server.receive(session, encode(&Envelope::login(UserId::new("alice"), "pw")));
        assert!(!server.has_mail(session));
        assert_eq!(server.dropped_frames(), 1);
        assert_eq!(server.relay().registry().user(session), Some(&UserId::new("alice")));
    }

    #[test]
    fn kick_queues_close_after_pending_mail() {
        let mut server = SimServer::new(RelayConfig::default());
        server.register_user("alice", "pw").unwrap();
        let session = server.accept();
        server.receive(session, encode(&Envelope::login(UserId::new("alice"), "pw")));

        server.kick(session, "maintenance");
        assert!(!server.is_open(session));
        assert!(matches!(server.take_delivery(session), Some(DriverEvent::Frame(_))));
        assert_eq!(
            server.take_delivery(session),
            Some(DriverEvent::TransportClosed { reason: "maintenance".into() })
        );
        assert_eq!(server.relay().registry().session_count(), 0);
    }
}
