//! WebSocket Handler
//!
//! Real-time channel between the broadcast hub and subscribers.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use hr_common::ClientEvent;
use tracing::{debug, error, info, warn};

use crate::api::AppState;
use crate::hub::{BroadcastHub, ConnectionId, FrameReceiver};

/// WebSocket upgrade handler.
pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Handle WebSocket connection.
async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (ws_sender, mut ws_receiver) = socket.split();

    let subscription = hub.connect();
    let connection_id = subscription.id;

    // Spawn task to forward queued frames to the WebSocket
    let sender_handle = tokio::spawn(forward_frames(subscription.frames, ws_sender));

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_client_message(&hub, connection_id, text.as_str()),
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "WebSocket closed by subscriber");
                break;
            }
            Err(e) => {
                warn!(connection_id = %connection_id, "WebSocket error: {}", e);
                break;
            }
            // Axum answers protocol-level pings itself
            _ => {}
        }
    }

    // Cleanup
    hub.disconnect(connection_id);
    sender_handle.abort();
}

/// Drain a subscription's queue into the socket until either side goes away.
async fn forward_frames(
    mut frames: FrameReceiver,
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
) {
    while let Some(frame) = frames.recv().await {
        let text = match frame.encode() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize frame: {}", e);
                continue;
            }
        };

        if ws_sender.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}

/// Handle a subscriber frame.
fn handle_client_message(hub: &BroadcastHub, connection_id: ConnectionId, text: &str) {
    match ClientEvent::decode(text) {
        Ok(ClientEvent::Ping) => {
            hub.pong(connection_id);
        }
        Err(e) => {
            debug!(connection_id = %connection_id, "Ignoring unknown frame: {}", e);
        }
    }
}
