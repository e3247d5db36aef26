//! Property-based tests over random session histories.
//!
//! Two clients share one simulated relay while a random sequence of user
//! input, clock movement and injected faults is applied to them. The standard
//! invariants are checked on every render; the tests additionally verify the
//! end state once both clients shut down.

use std::time::Duration;

use chatwire_client::{DeliveryStatus, UserId};
use chatwire_harness::{
    InvariantRegistry, SharedSimServer, SimClient, SimEnv, SimError, SystemSnapshot,
    create_shared_server,
};
use proptest::prelude::*;

const NAMES: [&str; 2] = ["alice", "bob"];

#[derive(Debug, Clone)]
enum Line {
    Connect,
    Login,
    WrongPassword,
    Room(&'static str),
    DirectToOther,
    DirectToStranger,
    Leave,
    Say(&'static str),
    Help,
    Garbage,
}

impl Line {
    fn render(&self, me: usize) -> String {
        match self {
            Self::Connect => "/connect".to_string(),
            Self::Login => format!("/login {} pw", NAMES[me]),
            Self::WrongPassword => format!("/login {} nope", NAMES[me]),
            Self::Room(room) => format!("/room {room}"),
            Self::DirectToOther => format!("/dm {}", NAMES[1 - me]),
            Self::DirectToStranger => "/dm carol".to_string(),
            Self::Leave => "/leave".to_string(),
            Self::Say(text) => (*text).to_string(),
            Self::Help => "/help".to_string(),
            Self::Garbage => "/dance".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Type(usize, Line),
    Tick(usize, u64),
    BreakTransport(usize),
    Kick(usize),
    Mute(usize, bool),
    FailSends(usize, bool),
    RefuseConnect(usize),
}

fn line_strategy() -> impl Strategy<Value = Line> {
    prop_oneof![
        2 => Just(Line::Connect),
        3 => Just(Line::Login),
        1 => Just(Line::WrongPassword),
        2 => prop_oneof![Just("general"), Just("random")].prop_map(Line::Room),
        1 => Just(Line::DirectToOther),
        1 => Just(Line::DirectToStranger),
        1 => Just(Line::Leave),
        4 => prop_oneof![Just("hi"), Just("hello"), Just("hi")].prop_map(Line::Say),
        1 => Just(Line::Help),
        1 => Just(Line::Garbage),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let client = 0..NAMES.len();
    prop_oneof![
        10 => (client.clone(), line_strategy()).prop_map(|(c, line)| Op::Type(c, line)),
        2 => (client.clone(), 0u64..3_000).prop_map(|(c, ms)| Op::Tick(c, ms)),
        1 => client.clone().prop_map(Op::BreakTransport),
        1 => client.clone().prop_map(Op::Kick),
        1 => (client.clone(), any::<bool>()).prop_map(|(c, on)| Op::Mute(c, on)),
        1 => (client.clone(), any::<bool>()).prop_map(|(c, on)| Op::FailSends(c, on)),
        1 => client.prop_map(Op::RefuseConnect),
    ]
}

async fn apply(clients: &mut [SimClient], op: &Op) -> Result<(), SimError> {
    match op {
        Op::Type(c, line) => clients[*c].input(&line.render(*c)).await,
        Op::Tick(c, ms) => clients[*c].tick(Duration::from_millis(*ms)).await,
        Op::BreakTransport(c) => {
            if clients[*c].driver().session().is_some() {
                clients[*c].driver_mut().inject_transport_failure("connection reset");
            }
            clients[*c].settle().await
        },
        Op::Kick(c) => {
            clients[*c].driver_mut().kick("kicked");
            clients[*c].settle().await
        },
        Op::Mute(c, on) => {
            clients[*c].driver_mut().mute_inbound(*on);
            Ok(())
        },
        Op::FailSends(c, on) => {
            clients[*c].driver_mut().fail_sends(on.then_some("broken pipe"));
            Ok(())
        },
        Op::RefuseConnect(c) => {
            clients[*c].driver_mut().refuse_connects(1);
            Ok(())
        },
    }
}

/// Run `ops`, letting every client drain its mail after each one.
async fn run(ops: &[Op]) -> Result<(SharedSimServer, Vec<SimClient>), SimError> {
    let env = SimEnv::new();
    let server = create_shared_server();
    for name in NAMES {
        server.lock().unwrap().register_user(name, "pw").unwrap();
    }
    let mut clients: Vec<_> =
        NAMES.iter().map(|&name| SimClient::new(name, &server, &env)).collect();

    for op in ops {
        apply(&mut clients, op).await?;
        // Deliveries caused by one client wait in the other's mailbox.
        for client in &mut clients {
            client.settle().await?;
        }
    }
    Ok((server, clients))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_invariants_hold_under_random_histories(
        ops in prop::collection::vec(op_strategy(), 1..60)
    ) {
        let (server, mut clients) =
            block_on(run(&ops)).map_err(|e| TestCaseError::fail(e.to_string()))?;

        let snapshot =
            SystemSnapshot::from_clients(clients.iter().map(SimClient::snapshot).collect());
        prop_assert!(InvariantRegistry::standard().check_all(&snapshot).is_ok());

        for client in &mut clients {
            client.shutdown();
            let stats = client.driver().stats();
            prop_assert_eq!(stats.connects, stats.closes);
        }
        prop_assert_eq!(server.lock().unwrap().relay().registry().session_count(), 0);
    }

    #[test]
    fn prop_local_messages_belong_to_their_author(
        ops in prop::collection::vec(op_strategy(), 1..60)
    ) {
        let (_, clients) = block_on(run(&ops)).map_err(|e| TestCaseError::fail(e.to_string()))?;

        for (client, name) in clients.iter().zip(NAMES) {
            let Some(view) = client.app().conversation() else { continue };
            let confirmed =
                view.messages.iter().filter(|m| m.delivery == DeliveryStatus::Confirmed).count();
            prop_assert!(confirmed <= client.driver().stats().frames_sent);

            for message in view.messages.iter().filter(|m| m.local) {
                prop_assert_eq!(message.sender.as_ref().map(UserId::as_str), Some(name));
            }
        }
    }
}
