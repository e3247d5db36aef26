//! Property-based tests for the relay.
//!
//! Random interleavings of logins, joins, and messages across a handful of
//! connections. Fan-out is checked against membership tracked independently
//! by the test.

use std::collections::{BTreeSet, HashMap};

use chatwire_proto::{Destination, Envelope, EnvelopeKind, Timestamp, UserId, decode, encode};
use chatwire_server::{MemoryUserStore, Relay, RelayAction, RelayConfig, RelayEvent};
use proptest::prelude::*;

const USERS: [&str; 3] = ["alice", "bob", "carol"];
const ROOMS: [&str; 2] = ["general", "random"];

#[derive(Debug, Clone, Copy)]
enum Op {
    Login { session: u64, user: usize },
    Join { session: u64, room: usize },
    ToRoom { session: u64, room: usize },
    ToPeer { session: u64, user: usize },
    Close { session: u64 },
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    let session = 1u64..=4;
    prop_oneof![
        (session.clone(), 0..USERS.len()).prop_map(|(session, user)| Op::Login { session, user }),
        (session.clone(), 0..ROOMS.len()).prop_map(|(session, room)| Op::Join { session, room }),
        (session.clone(), 0..ROOMS.len()).prop_map(|(session, room)| Op::ToRoom { session, room }),
        (session.clone(), 0..USERS.len()).prop_map(|(session, user)| Op::ToPeer { session, user }),
        session.prop_map(|session| Op::Close { session }),
    ]
}

/// What the test expects the relay to know.
#[derive(Default)]
struct Model {
    open: BTreeSet<u64>,
    logins: HashMap<u64, &'static str>,
    rooms: HashMap<u64, BTreeSet<&'static str>>,
}

impl Model {
    fn recipients(&self, sender: u64, destination: &Destination, echo: bool) -> BTreeSet<u64> {
        let mut out: BTreeSet<u64> = self
            .open
            .iter()
            .copied()
            .filter(|session| match destination {
                Destination::Room(room) => self
                    .rooms
                    .get(session)
                    .is_some_and(|rooms| rooms.contains(room.as_str())),
                Destination::DirectPeer(peer) => {
                    self.logins.get(session).is_some_and(|user| *user == peer.as_str())
                },
            })
            .collect();
        if echo {
            out.insert(sender);
        } else {
            out.remove(&sender);
        }
        out
    }
}

fn frame(session_id: u64, envelope: &Envelope) -> RelayEvent {
    RelayEvent::FrameReceived { session_id, frame: encode(envelope) }
}

fn sends(actions: &[RelayAction]) -> Vec<(u64, Envelope)> {
    actions
        .iter()
        .filter_map(|action| match action {
            RelayAction::SendToSession { session_id, frame } => {
                Some((*session_id, decode(frame).unwrap()))
            },
            _ => None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: Messages reach exactly the sessions entitled to them, stamped
    /// with the sender's logged-in identity
    #[test]
    fn prop_fanout_matches_membership(
        echo in any::<bool>(),
        ops in prop::collection::vec(arbitrary_op(), 1..60),
    ) {
        let store = MemoryUserStore::new();
        let mut relay = Relay::new(store, RelayConfig { echo });
        let mut model = Model::default();

        for session_id in 1..=4 {
            relay.process_event(RelayEvent::ConnectionAccepted { session_id });
            model.open.insert(session_id);
        }
        for user in USERS {
            relay.process_event(frame(1, &Envelope::signup(UserId::new(user), "pw")));
        }

        for op in ops {
            match op {
                Op::Login { session, user } => {
                    let login = Envelope::login(UserId::new(USERS[user]), "pw");
                    relay.process_event(frame(session, &login));
                    if model.open.contains(&session) {
                        model.logins.insert(session, USERS[user]);
                    }
                },
                Op::Join { session, room } => {
                    let user = UserId::new(model.logins.get(&session).copied().unwrap_or("anon"));
                    let join = Envelope::join(user, Destination::room(ROOMS[room]));
                    relay.process_event(frame(session, &join));
                    if model.open.contains(&session) && model.logins.contains_key(&session) {
                        model.rooms.entry(session).or_default().insert(ROOMS[room]);
                    }
                },
                Op::ToRoom { session, room } | Op::ToPeer { session, user: room } => {
                    let destination = if matches!(op, Op::ToRoom { .. }) {
                        Destination::room(ROOMS[room])
                    } else {
                        Destination::peer(USERS[room])
                    };
                    let envelope = Envelope::message(
                        UserId::new("forged"),
                        destination.clone(),
                        "hello",
                        Timestamp::Unknown,
                    );
                    let out = sends(&relay.process_event(frame(session, &envelope)));

                    let expected = match model.logins.get(&session) {
                        Some(_) if model.open.contains(&session) => {
                            model.recipients(session, &destination, echo)
                        },
                        _ => BTreeSet::new(),
                    };
                    let actual: BTreeSet<u64> = out.iter().map(|(session, _)| *session).collect();
                    prop_assert_eq!(out.len(), actual.len());
                    prop_assert_eq!(actual, expected);

                    for (_, delivered) in &out {
                        prop_assert_eq!(delivered.kind(), &EnvelopeKind::Message);
                        prop_assert_eq!(
                            delivered.sender().map(UserId::as_str),
                            model.logins.get(&session).copied()
                        );
                    }
                },
                Op::Close { session } => {
                    relay.process_event(RelayEvent::ConnectionClosed {
                        session_id: session,
                        reason: "test".to_string(),
                    });
                    model.open.remove(&session);
                    model.logins.remove(&session);
                    model.rooms.remove(&session);
                },
            }
        }
    }

    /// Property: Arbitrary text never panics the relay or produces a reply
    #[test]
    fn prop_garbage_frames_are_dropped(frame in "[^{\\[]{0,64}") {
        let mut relay = Relay::new(MemoryUserStore::new(), RelayConfig::default());
        relay.process_event(RelayEvent::ConnectionAccepted { session_id: 1 });

        let actions = relay.process_event(RelayEvent::FrameReceived { session_id: 1, frame });
        prop_assert!(sends(&actions).is_empty());
    }
}
