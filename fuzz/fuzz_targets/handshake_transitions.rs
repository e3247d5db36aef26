//! Fuzz target for the credential handshake state machine
//!
//! Drives a handshake with arbitrary event sequences, including raw frames
//! from the fuzzer, and checks that:
//! - Terminal states (`TimedOut`, `ConnectionLost`) are never left
//! - Envelopes are only sent in response to a submission
//! - `is_busy` agrees with the state
//! - A timeout never fires before the configured duration

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use chatwire_core::{Credentials, Handshake, HandshakeAction, HandshakeEvent, HandshakeState};
use chatwire_proto::{decode_bytes, Envelope, Status};
use libfuzzer_sys::fuzz_target;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Arbitrary)]
enum Op {
    TransportReady,
    Submit { signup: bool, username: String, password: String },
    LoginResult { success: bool, message: String },
    SignupResult { success: bool, message: String },
    RawFrame(Vec<u8>),
    TransportLost,
    Advance(u16),
}

fuzz_target!(|ops: Vec<Op>| {
    let mut handshake: Handshake<Duration> = Handshake::new(TIMEOUT);
    let mut now = Duration::ZERO;
    let mut submitted_at = None;

    for op in ops {
        let before = handshake.state().clone();
        let is_submit = matches!(op, Op::Submit { .. });

        let event = match op {
            Op::TransportReady => HandshakeEvent::TransportReady,
            Op::Submit { signup, username, password } => HandshakeEvent::Submit(if signup {
                Credentials::signup(username, password)
            } else {
                Credentials::login(username, password)
            }),
            Op::LoginResult { success, message } => {
                HandshakeEvent::Response(Envelope::login_result(status(success), message))
            },
            Op::SignupResult { success, message } => {
                HandshakeEvent::Response(Envelope::signup_result(status(success), message))
            },
            Op::RawFrame(bytes) => match decode_bytes(&bytes) {
                Ok(envelope) => HandshakeEvent::Response(envelope),
                Err(_) => continue,
            },
            Op::TransportLost => HandshakeEvent::TransportLost,
            Op::Advance(ms) => {
                now += Duration::from_millis(u64::from(ms));
                HandshakeEvent::Tick
            },
        };

        let actions = handshake.handle(event, now).unwrap_or_default();

        if before.is_terminal() {
            assert_eq!(handshake.state(), &before, "left a terminal state");
        }

        for action in &actions {
            match action {
                HandshakeAction::Send(_) => {
                    assert!(is_submit, "sent an envelope outside a submission");
                    submitted_at = Some(now);
                },
                HandshakeAction::TimedOut { elapsed } => {
                    assert!(*elapsed > TIMEOUT, "timed out early: {elapsed:?}");
                    let sent = submitted_at.expect("timeout without a submission");
                    assert_eq!(now - sent, *elapsed);
                },
                _ => {},
            }
        }

        assert_eq!(
            handshake.is_busy(),
            matches!(handshake.state(), HandshakeState::AwaitingServerAck { .. })
        );
    }
});

fn status(success: bool) -> Status {
    if success { Status::Success } else { Status::Failure }
}
