//! End-to-end session scenarios against the simulated relay.
//!
//! Every client runs the production runtime with the standard invariants
//! checked on each render, so any step that breaks one fails the test with
//! the violation.

use std::time::Duration;

use chatwire_app::{ConnectionStatus, Runtime, TranscriptLine};
use chatwire_client::{DeliveryStatus, SessionConfig, UserId};
use chatwire_harness::{
    InvariantRegistry, SIM_ENDPOINT, SharedSimServer, SimClient, SimDriver, SimEnv,
    create_shared_server,
};

async fn logged_in(name: &str, server: &SharedSimServer, env: &SimEnv) -> SimClient {
    let mut client = SimClient::new(name, server, env);
    client.input("/connect").await.unwrap();
    client.input(&format!("/signup {name} pw")).await.unwrap();
    client.input(&format!("/login {name} pw")).await.unwrap();
    assert_eq!(client.app().connection_status(), &ConnectionStatus::Connected {
        user: UserId::new(name)
    });
    client
}

fn errors(client: &SimClient) -> Vec<&str> {
    client
        .app()
        .transcript()
        .iter()
        .filter_map(|line| match line {
            TranscriptLine::Error(message) => Some(message.as_str()),
            _ => None,
        })
        .collect()
}

fn last_delivery(client: &SimClient) -> DeliveryStatus {
    client.app().conversation().unwrap().messages.last().unwrap().delivery
}

#[tokio::test]
async fn room_messages_reach_members_only() {
    let env = SimEnv::new();
    let server = create_shared_server();
    let mut alice = logged_in("alice", &server, &env).await;
    let mut bob = logged_in("bob", &server, &env).await;
    let mut carol = logged_in("carol", &server, &env).await;

    alice.input("/room general").await.unwrap();
    bob.input("/room general").await.unwrap();
    carol.input("/room random").await.unwrap();

    alice.input("hi").await.unwrap();
    assert_eq!(alice.messages(), vec!["hi"]);
    assert_eq!(last_delivery(&alice), DeliveryStatus::Confirmed);

    bob.settle().await.unwrap();
    bob.input("yo").await.unwrap();
    carol.input("psst").await.unwrap();
    alice.settle().await.unwrap();

    assert_eq!(alice.messages(), vec!["hi", "yo"]);
    assert_eq!(bob.messages(), vec!["hi", "yo"]);
    assert_eq!(carol.messages(), vec!["psst"]);

    let view = alice.app().conversation().unwrap();
    assert_eq!(view.messages[0].sender, Some(UserId::new("alice")));
    assert!(!view.messages[0].delivery_failed());
    assert_eq!(view.messages[1].sender, Some(UserId::new("bob")));
    assert_eq!(view.messages[1].time_label.as_deref(), Some("12:00"));
}

#[tokio::test]
async fn direct_conversation_ignores_third_parties() {
    let env = SimEnv::new();
    let server = create_shared_server();
    let mut alice = logged_in("alice", &server, &env).await;
    let mut bob = logged_in("bob", &server, &env).await;
    let mut carol = logged_in("carol", &server, &env).await;

    alice.input("/dm bob").await.unwrap();
    bob.input("/dm alice").await.unwrap();
    carol.input("/dm bob").await.unwrap();

    alice.input("hey bob").await.unwrap();
    carol.input("psst").await.unwrap();
    bob.settle().await.unwrap();
    bob.input("hey alice").await.unwrap();
    alice.settle().await.unwrap();

    assert_eq!(alice.messages(), vec!["hey bob", "hey alice"]);
    assert_eq!(bob.messages(), vec!["hey bob", "hey alice"]);
    assert_eq!(carol.messages(), vec!["psst"]);
}

#[tokio::test]
async fn wrong_password_then_busy_submit() {
    let env = SimEnv::new();
    let server = create_shared_server();
    server.lock().unwrap().register_user("alice", "pw").unwrap();

    let mut alice = SimClient::new("alice", &server, &env);
    alice.input("/connect").await.unwrap();
    alice.input("/login alice nope").await.unwrap();
    assert_eq!(errors(&alice), vec!["Invalid password."]);
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Authenticating);

    alice.driver_mut().mute_inbound(true);
    alice.input("/login alice pw").await.unwrap();
    let sent = alice.driver().stats().frames_sent;
    alice.input("/login alice pw").await.unwrap();

    assert_eq!(alice.driver().stats().frames_sent, sent);
    assert_eq!(errors(&alice).last(), Some(&"a credential submission is already in flight"));
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Authenticating);
}

#[tokio::test]
async fn handshake_times_out_on_virtual_clock() {
    let env = SimEnv::new();
    let server = create_shared_server();
    let mut alice = SimClient::new("alice", &server, &env);
    alice.driver_mut().mute_inbound(true);
    alice.input("/connect").await.unwrap();
    alice.input("/signup alice pw").await.unwrap();

    alice.tick(Duration::from_secs(5)).await.unwrap();
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Authenticating);

    alice.tick(Duration::from_millis(1)).await.unwrap();
    assert!(errors(&alice)[0].starts_with("no response from server after"));
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Disconnected);
    assert_eq!(alice.driver().stats().closes, 1);
}

#[tokio::test]
async fn transport_failure_mid_handshake_is_not_a_rejection() {
    let env = SimEnv::new();
    let server = create_shared_server();
    server.lock().unwrap().register_user("alice", "pw").unwrap();

    let mut alice = SimClient::new("alice", &server, &env);
    alice.driver_mut().mute_inbound(true);
    alice.input("/connect").await.unwrap();
    alice.input("/login alice pw").await.unwrap();

    alice.driver_mut().inject_transport_failure("connection reset");
    alice.settle().await.unwrap();

    assert_eq!(errors(&alice)[0], "connection lost during authentication. Use /connect to retry.");
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Disconnected);
    assert_eq!(alice.driver().stats().closes, 1);
    assert_eq!(server.lock().unwrap().relay().registry().session_count(), 0);

    alice.driver_mut().mute_inbound(false);
    alice.input("/connect").await.unwrap();
    alice.input("/login alice pw").await.unwrap();
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Connected {
        user: UserId::new("alice")
    });
    assert_eq!(alice.driver().stats().connects, 2);
}

#[tokio::test]
async fn server_close_keeps_history_and_fails_late_sends() {
    let env = SimEnv::new();
    let server = create_shared_server();
    let mut alice = logged_in("alice", &server, &env).await;
    alice.input("/room general").await.unwrap();
    alice.input("before").await.unwrap();

    alice.driver_mut().kick("maintenance");
    alice.settle().await.unwrap();
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Disconnected);
    assert!(matches!(
        alice.app().transcript().last(),
        Some(TranscriptLine::Notice(line)) if line.starts_with("Disconnected: maintenance")
    ));

    alice.input("after").await.unwrap();
    assert_eq!(alice.messages(), vec!["before", "after"]);
    assert_eq!(last_delivery(&alice), DeliveryStatus::Failed);
    assert!(matches!(alice.app().transcript().last(), Some(TranscriptLine::Undelivered { .. })));
    assert_eq!(alice.driver().stats().closes, 1);
}

#[tokio::test]
async fn failed_send_is_marked_inline() {
    let env = SimEnv::new();
    let server = create_shared_server();
    let mut alice = logged_in("alice", &server, &env).await;
    alice.input("/room general").await.unwrap();

    alice.driver_mut().fail_sends(Some("broken pipe"));
    alice.input("lost").await.unwrap();
    assert_eq!(last_delivery(&alice), DeliveryStatus::Failed);

    alice.driver_mut().fail_sends(None);
    alice.input("kept").await.unwrap();
    assert_eq!(alice.messages(), vec!["lost", "kept"]);
    assert_eq!(last_delivery(&alice), DeliveryStatus::Confirmed);
    assert!(alice.app().connection_status() != &ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn refused_connect_can_be_retried() {
    let env = SimEnv::new();
    let server = create_shared_server();
    let mut alice = SimClient::new("alice", &server, &env);
    alice.driver_mut().refuse_connects(1);

    alice.input("/connect").await.unwrap();
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Disconnected);
    assert_eq!(errors(&alice).len(), 1);

    alice.input("/connect").await.unwrap();
    assert_eq!(alice.app().connection_status(), &ConnectionStatus::Authenticating);
    assert_eq!(alice.driver().stats().refused, 1);
    assert_eq!(alice.driver().stats().connects, 1);
}

#[tokio::test]
async fn scripted_run_closes_once() {
    let env = SimEnv::new();
    let server = create_shared_server();
    let driver = SimDriver::new("alice", server.clone(), env.clone())
        .with_invariants(InvariantRegistry::standard())
        .with_input(["/signup alice pw", "/login alice pw", "/room general", "hi", "/quit"]);
    let mut runtime = Runtime::new(driver, env, SessionConfig::default(), SIM_ENDPOINT);

    runtime.run().await.unwrap();

    let stats = runtime.driver().stats();
    assert_eq!((stats.connects, stats.closes), (1, 1));
    let view = runtime.app().conversation().unwrap();
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].delivery, DeliveryStatus::Confirmed);
    assert_eq!(server.lock().unwrap().relay().registry().session_count(), 0);
}

#[tokio::test]
async fn idle_ticks_expire_a_silent_handshake() {
    let env = SimEnv::new();
    let server = create_shared_server();
    let mut driver = SimDriver::new("alice", server, env.clone())
        .with_invariants(InvariantRegistry::standard())
        .with_input(["/signup alice pw"])
        .with_idle_ticks(60, Duration::from_millis(100));
    driver.mute_inbound(true);
    let mut runtime = Runtime::new(driver, env.clone(), SessionConfig::default(), SIM_ENDPOINT);

    runtime.run().await.unwrap();

    assert_eq!(env.elapsed(), Duration::from_secs(6));
    assert_eq!(runtime.app().connection_status(), &ConnectionStatus::Disconnected);
    let stats = runtime.driver().stats();
    assert_eq!((stats.connects, stats.closes), (1, 1));
}
