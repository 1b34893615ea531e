//! API Router and Application State
//!
//! Central routing configuration and shared state.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use hr_common::HubStats;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    hub::BroadcastHub,
    ingest::{self, EventCallback, IngestionGateway},
    ws,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Real-time fan-out hub
    pub hub: Arc<BroadcastHub>,
    /// Webhook ingestion gateway
    pub gateway: Arc<IngestionGateway>,
}

impl AppState {
    /// Create state where every ingested event is broadcast through the hub.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let hub = Arc::new(BroadcastHub::new(config.subscriber_queue_capacity));
        let broadcast_hub = Arc::clone(&hub);
        let on_event: EventCallback = Arc::new(move |event| {
            broadcast_hub.broadcast_event(event);
        });
        Self::with_callback(config, hub, on_event)
    }

    /// Create state with a custom ingestion callback.
    #[must_use]
    pub fn with_callback(config: Config, hub: Arc<BroadcastHub>, on_event: EventCallback) -> Self {
        let gateway = Arc::new(IngestionGateway::new(config.max_body_size, on_event));
        Self {
            config: Arc::new(config),
            hub,
            gateway,
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check).post(ingest::handler))
        // Hub statistics
        .route("/stats", get(stats).post(ingest::handler))
        // WebSocket
        .route("/ws", get(ws::handler).post(ingest::handler))
        // Every other path: POST is a webhook, anything else is 405
        .fallback(ingest::fallback)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Server version
    version: &'static str,
    /// Open subscriber connections
    connections: usize,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.hub.connection_count(),
    })
}

/// Hub statistics endpoint.
async fn stats(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.hub.get_stats())
}
