//! Shared helpers for client integration tests.
//!
//! `spawn_hub` runs the real hub router on a random port so sessions talk to
//! the same server code the `hr-server` binary serves.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hr_common::{InboundRequest, WebhookEvent};
use hr_server::api::{create_router, AppState};
use hr_server::config::Config;
use hr_server::hub::BroadcastHub;
use tokio::task::JoinHandle;

/// A hub listening on 127.0.0.1.
pub struct TestHub {
    pub addr: SocketAddr,
    /// Base URL for webhook calls (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    pub hub: Arc<BroadcastHub>,
    _handle: JoinHandle<()>,
}

/// Spawn the hub router on a random port.
pub async fn spawn_hub() -> TestHub {
    let state = AppState::new(Config::default_for_test());
    let hub = Arc::clone(&state.hub);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test hub");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test hub failed");
    });

    TestHub {
        addr,
        url: format!("http://{addr}"),
        hub,
        _handle: handle,
    }
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    listener.local_addr().expect("Failed to get local addr")
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// A captured event as the hub would broadcast it.
pub fn sample_event(endpoint: &str) -> WebhookEvent {
    WebhookEvent::capture(InboundRequest {
        source: "203.0.113.7".into(),
        ip: "203.0.113.7".into(),
        endpoint: endpoint.into(),
        method: "POST".into(),
        body: serde_json::json!({ "action": "opened" }),
        ..InboundRequest::default()
    })
}
