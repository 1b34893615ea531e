//! Reusable test helpers for HTTP and WebSocket integration tests.
//!
//! Provides `TestApp` for sending requests through the full axum router, and
//! `spawn_test_server` for tests that need a real listener (WebSocket).
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use hr_common::WebhookEvent;
use http_body_util::BodyExt;
use hr_server::api::{create_router, AppState};
use hr_server::config::Config;
use hr_server::hub::BroadcastHub;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower::ServiceExt;

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub hub: Arc<BroadcastHub>,
}

impl TestApp {
    /// Create a test app that broadcasts through its hub.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config (for limit testing).
    pub fn with_config(config: Config) -> Self {
        let state = AppState::new(config);
        let hub = Arc::clone(&state.hub);
        Self {
            router: create_router(state),
            hub,
        }
    }

    /// Create a test app whose ingestion callback feeds a channel instead of the hub.
    pub fn capturing() -> (Self, mpsc::UnboundedReceiver<WebhookEvent>) {
        let config = Config::default_for_test();
        let hub = Arc::new(BroadcastHub::new(config.subscriber_queue_capacity));
        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState::with_callback(
            config,
            Arc::clone(&hub),
            Arc::new(move |event| {
                let _ = tx.send(event);
            }),
        );
        (
            Self {
                router: create_router(state),
                hub,
            },
            rx,
        )
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

// ============================================================================
// Test Server
// ============================================================================

/// A running test server bound to a random port.
pub struct TestServer {
    /// Server address (127.0.0.1:PORT).
    pub addr: SocketAddr,
    /// Base URL for HTTP requests (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    /// WebSocket URL of the hub.
    pub ws_url: String,
    /// Handle to the server task for cleanup.
    _handle: JoinHandle<()>,
}

/// Spawn a real HTTP server on a random port.
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");
    let ws_url = format!("ws://{addr}/ws");

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        ws_url,
        _handle: handle,
    }
}
