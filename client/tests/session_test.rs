//! Subscriber session tests against a live hub and a bare WebSocket acceptor.

mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use helpers::{eventually, spawn_hub, unused_addr};
use hr_client::session::{ConnectionStatus, EventCallback, StatusCallback};
use hr_client::{ClientError, SessionState, SubscriberConfig, SubscriberSession};
use hr_common::WebhookEvent;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn recording() -> (StatusCallback, Arc<Mutex<Vec<ConnectionStatus>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: StatusCallback = Arc::new(move |status: &ConnectionStatus| {
        sink.lock().unwrap().push(status.clone());
    });
    (callback, seen)
}

fn capturing() -> (EventCallback, mpsc::UnboundedReceiver<WebhookEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: EventCallback = Arc::new(move |event| {
        let _ = tx.send(event);
    });
    (callback, rx)
}

/// Accept `closing` connections and close each right after the handshake,
/// then keep accepting and hold connections open while `keep_listening`.
async fn flaky_acceptor(closing: usize, keep_listening: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for _ in 0..closing {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.close(None).await.ok();
        }
        if !keep_listening {
            return;
        }
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                while ws.next().await.is_some() {}
            });
        }
    });

    format!("ws://{addr}/ws")
}

/// Complete one handshake and close it, then accept TCP connections that
/// never answer the WebSocket handshake.
async fn stalling_acceptor() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.close(None).await.ok();

        let mut held = Vec::new();
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            held.push(stream);
        }
    });

    format!("ws://{addr}/ws")
}

fn reconnect_attempts_seen(seen: &Mutex<Vec<ConnectionStatus>>) -> usize {
    seen.lock()
        .unwrap()
        .iter()
        .filter(|s| s.state == SessionState::Reconnecting)
        .count()
}

#[tokio::test]
async fn test_session_receives_broadcasts_and_disconnects_cleanly() {
    let server = spawn_hub().await;
    let (on_event, mut events) = capturing();
    let config = SubscriberConfig::new(&server.url).unwrap();
    let session = SubscriberSession::with_callbacks(&config, None, Some(on_event));

    session.connect().await.unwrap();

    let status = session.status();
    assert_eq!(status.state, SessionState::Connected);
    assert!(status.connected);
    assert!(status.last_connected.is_some());
    assert_eq!(status.reconnect_attempts, 0);
    assert!(status.last_error.is_none());

    // Stats arrive once the hub has registered the connection
    let handle = &session;
    eventually(|| async move { handle.last_stats().is_some() }).await;
    assert_eq!(session.last_stats().unwrap().active_connections, 1);

    let response = reqwest::Client::new()
        .post(format!("{}/github/push", server.url))
        .json(&serde_json::json!({ "ref": "main" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for event")
        .unwrap();
    assert_eq!(event.endpoint(), "/github/push");
    assert_eq!(event.body()["ref"], "main");

    assert!(session.ping().await);

    session.disconnect().await;

    let status = session.status();
    assert_eq!(status.state, SessionState::Disconnected);
    assert!(!status.connected);
    assert!(status.last_error.is_none());
    assert!(!session.ping().await);

    let hub = Arc::clone(&server.hub);
    eventually(|| {
        let hub = Arc::clone(&hub);
        async move { hub.connection_count() == 0 }
    })
    .await;
}

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let server = spawn_hub().await;
    let config = SubscriberConfig::new(&server.url).unwrap();
    let session = SubscriberSession::new(&config);

    session.connect().await.unwrap();
    assert!(matches!(
        session.connect().await,
        Err(ClientError::AlreadyConnected)
    ));

    session.disconnect().await;
}

#[tokio::test]
async fn test_first_attempt_failure_is_an_error() {
    let url = format!("ws://{}/ws", unused_addr().await);
    let config = SubscriberConfig::new(&url).unwrap();
    let (on_status, seen) = recording();
    let session = SubscriberSession::with_callbacks(&config, Some(on_status), None);

    let result = session.connect().await;
    assert!(matches!(result, Err(ClientError::ConnectionFailed(_))));

    let status = session.status();
    assert_eq!(status.state, SessionState::Disconnected);
    assert!(!status.connected);
    assert!(status.last_error.is_some());

    let states: Vec<_> = seen.lock().unwrap().iter().map(|s| s.state).collect();
    assert_eq!(
        states,
        vec![SessionState::Connecting, SessionState::Disconnected]
    );
}

#[tokio::test]
async fn test_session_fails_after_exhausting_reconnects() {
    let url = flaky_acceptor(1, false).await;
    let config = SubscriberConfig::new(&url)
        .unwrap()
        .with_reconnect(Duration::from_millis(50), 3);
    let (on_status, seen) = recording();
    let session = SubscriberSession::with_callbacks(&config, Some(on_status), None);

    session.connect().await.unwrap();

    let mut status = session.watch_status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.state == SessionState::Failed),
    )
    .await
    .expect("session never failed")
    .unwrap();

    let failed = session.status();
    assert!(!failed.connected);
    assert_eq!(failed.reconnect_attempts, 3);
    assert_eq!(
        failed.last_error.as_deref(),
        Some("Failed to reconnect after 3 attempts")
    );

    let mut attempts: Vec<u32> = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.state == SessionState::Reconnecting)
        .map(|s| s.reconnect_attempts)
        .collect();
    attempts.dedup();
    assert_eq!(attempts, vec![1, 2, 3]);

    // Terminal: nothing more happens
    let transitions = seen.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(seen.lock().unwrap().len(), transitions);
    assert_eq!(session.status(), failed);
}

#[tokio::test]
async fn test_session_recovers_after_a_drop() {
    let url = flaky_acceptor(1, true).await;
    let config = SubscriberConfig::new(&url)
        .unwrap()
        .with_reconnect(Duration::from_millis(50), 5);
    let (on_status, seen) = recording();
    let session = SubscriberSession::with_callbacks(&config, Some(on_status), None);

    session.connect().await.unwrap();

    eventually(|| {
        let seen = Arc::clone(&seen);
        async move {
            let seen = seen.lock().unwrap();
            seen.iter().any(|s| s.state == SessionState::Reconnecting)
                && seen.last().is_some_and(|s| s.state == SessionState::Connected)
        }
    })
    .await;

    let status = session.status();
    assert!(status.connected);
    assert_eq!(status.reconnect_attempts, 0);
    assert!(status.last_error.is_none());

    let dropped = seen
        .lock()
        .unwrap()
        .iter()
        .find(|s| s.state == SessionState::Disconnected)
        .cloned()
        .expect("drop was not reported");
    assert!(dropped.last_error.is_some());

    session.disconnect().await;
    assert_eq!(session.status().state, SessionState::Disconnected);
}

#[tokio::test]
async fn test_disconnect_during_reconnect_delay_stops_the_session() {
    let url = flaky_acceptor(1, false).await;
    let config = SubscriberConfig::new(&url)
        .unwrap()
        .with_reconnect(Duration::from_secs(30), 5);
    let (on_status, seen) = recording();
    let session = SubscriberSession::with_callbacks(&config, Some(on_status), None);

    session.connect().await.unwrap();

    let mut status = session.watch_status();
    tokio::time::timeout(
        Duration::from_secs(2),
        status.wait_for(|s| s.state == SessionState::Disconnected && s.last_error.is_some()),
    )
    .await
    .expect("drop was not reported")
    .unwrap();

    tokio::time::timeout(Duration::from_secs(2), session.disconnect())
        .await
        .expect("disconnect waited out the reconnect delay");

    let status = session.status();
    assert_eq!(status.state, SessionState::Disconnected);
    assert!(!status.connected);
    assert!(status.last_error.is_none());
    assert_eq!(status.reconnect_attempts, 0);
    assert_eq!(reconnect_attempts_seen(&seen), 0);
}

#[tokio::test]
async fn test_disconnect_during_reconnect_attempt_stops_the_session() {
    let url = stalling_acceptor().await;
    let config = SubscriberConfig::new(&url)
        .unwrap()
        .with_reconnect(Duration::from_millis(50), 5);
    let (on_status, seen) = recording();
    let session = SubscriberSession::with_callbacks(&config, Some(on_status), None);

    session.connect().await.unwrap();

    let mut status = session.watch_status();
    tokio::time::timeout(
        Duration::from_secs(2),
        status.wait_for(|s| s.state == SessionState::Reconnecting),
    )
    .await
    .expect("reconnect never started")
    .unwrap();

    tokio::time::timeout(Duration::from_secs(2), session.disconnect())
        .await
        .expect("disconnect waited on the stalled handshake");

    let stopped = session.status();
    assert_eq!(stopped.state, SessionState::Disconnected);
    assert!(!stopped.connected);
    assert!(stopped.last_error.is_none());
    assert_eq!(stopped.reconnect_attempts, 1);

    let attempts = reconnect_attempts_seen(&seen);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(reconnect_attempts_seen(&seen), attempts);
    assert_eq!(session.status(), stopped);
}
