//! Property-based tests for the App state machine.
//!
//! The App is fed arbitrary interleavings of user input and protocol
//! notifications. Whatever the order, the transcript only ever grows and the
//! connection status follows the last lifecycle event.

use std::time::Duration;

use chatwire_app::{
    App, AppAction, AppEvent, ConnectionStatus,
    input::{self, Command},
};
use chatwire_client::{Destination, HandshakeFailure, UserId};
use proptest::prelude::*;

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-z ]{0,12}",
        2 => prop_oneof![
            Just("/login alice pw"),
            Just("/login alice my pw"),
            Just("/signup bob"),
            Just("/room general"),
            Just("/dm bob"),
            Just("/leave"),
            Just("/connect"),
            Just("/help"),
            Just("/dance"),
        ]
        .prop_map(str::to_string),
        1 => "/[ -~]{0,20}",
    ]
}

fn failure_strategy() -> impl Strategy<Value = HandshakeFailure> {
    prop_oneof![
        Just(HandshakeFailure::Rejected { message: "Invalid password.".into() }),
        (0u64..10_000)
            .prop_map(|ms| HandshakeFailure::Timeout { elapsed: Duration::from_millis(ms) }),
        Just(HandshakeFailure::ConnectionLost),
    ]
}

fn event_strategy() -> impl Strategy<Value = AppEvent> {
    prop_oneof![
        4 => line_strategy().prop_map(AppEvent::Input),
        1 => Just(AppEvent::Tick),
        1 => Just(AppEvent::Connecting),
        1 => Just(AppEvent::TransportOpened),
        1 => Just(AppEvent::Authenticated { user: UserId::new("alice") }),
        1 => Just(AppEvent::SignedUp { message: "User registered successfully!".into() }),
        1 => failure_strategy().prop_map(AppEvent::HandshakeFailed),
        1 => prop_oneof![Just(Destination::room("general")), Just(Destination::peer("bob"))]
            .prop_map(|destination| AppEvent::ConversationOpened { destination }),
        1 => any::<bool>().prop_map(|failed| AppEvent::SessionEnded {
            reason: "connection reset".into(),
            failed,
        }),
        1 => Just(AppEvent::Error { message: "send failed".into() }),
    ]
}

proptest! {
    #[test]
    fn prop_transcript_is_append_only(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut app = App::new("ws://127.0.0.1:9000");

        for event in events {
            let before = app.transcript().to_vec();
            app.handle(event);
            prop_assert!(app.transcript().len() >= before.len());
            prop_assert_eq!(&app.transcript()[..before.len()], before.as_slice());
        }
    }

    #[test]
    fn prop_status_follows_lifecycle(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut app = App::new("ws://127.0.0.1:9000");

        for event in events {
            let expected = match &event {
                AppEvent::Connecting => Some(ConnectionStatus::Connecting),
                AppEvent::TransportOpened => Some(ConnectionStatus::Authenticating),
                AppEvent::Authenticated { user } => {
                    Some(ConnectionStatus::Connected { user: user.clone() })
                },
                AppEvent::SessionEnded { .. } => Some(ConnectionStatus::Disconnected),
                _ => None,
            };
            let previous = app.connection_status().clone();
            let is_input = matches!(event, AppEvent::Input(_));

            app.handle(event);

            match expected {
                Some(status) => prop_assert_eq!(app.connection_status(), &status),
                // Input alone only asks for actions; it never moves the status.
                None if is_input => prop_assert_eq!(app.connection_status(), &previous),
                None => {},
            }
        }
    }

    #[test]
    fn prop_parse_is_total(line in "\\PC{0,40}") {
        let command = input::parse(&line);
        if !line.trim_start().starts_with('/') && !line.trim().is_empty() {
            prop_assert_eq!(command, Command::Say(line.trim_end_matches(['\r', '\n']).to_string()));
        }
    }

    #[test]
    fn prop_extra_words_never_become_credentials(
        user in "[a-z]{1,8}",
        words in prop::collection::vec("[a-z]{1,6}", 2..4),
    ) {
        let line = format!("/login {user} {}", words.join(" "));
        let mut app = App::new("ws://127.0.0.1:9000");

        let actions = app.handle(AppEvent::Input(line));

        prop_assert!(!actions.iter().any(|a| matches!(a, AppAction::SubmitCredentials(_))));
    }
}
