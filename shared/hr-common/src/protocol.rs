//! Real-time Protocol
//!
//! Frames exchanged between the hub and subscribers over WebSocket text messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{HubStats, Result, WebhookEvent};

/// Subscriber-to-hub frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Keep-alive heartbeat
    Ping,
}

/// Hub-to-subscriber frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// An ingested webhook
    Webhook(WebhookEvent),
    /// Hub statistics, pushed once on connect
    Stats(HubStats),
    /// Heartbeat reply
    Pong { timestamp: DateTime<Utc> },
}

impl ServerEvent {
    /// Build a pong stamped with the current time.
    pub fn pong() -> Self {
        Self::Pong {
            timestamp: Utc::now(),
        }
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ClientEvent {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
