//! Webhook Event Model
//!
//! The immutable record produced for every inbound webhook call.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Replacement value for sensitive header values.
pub const REDACTED: &str = "[REDACTED]";

/// Header names (lowercase) whose values never leave the ingestion host.
pub const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "cookie", "x-api-key", "x-auth-token"];

/// Raw material for a [`WebhookEvent`], as seen by the ingestion layer.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Best-effort origin (forwarding chain or peer address).
    pub source: String,
    /// Best-effort client IP.
    pub ip: String,
    /// Request path the call arrived on.
    pub endpoint: String,
    /// HTTP method.
    pub method: String,
    /// Request headers, unredacted.
    pub headers: BTreeMap<String, String>,
    /// Parsed payload.
    pub body: serde_json::Value,
    /// User-Agent header, if sent.
    pub user_agent: Option<String>,
}

/// One normalized inbound webhook call.
///
/// Fields are read-only once the event is captured; downstream components
/// only ever observe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    id: Uuid,
    timestamp: DateTime<Utc>,
    source: String,
    ip: String,
    endpoint: String,
    method: String,
    headers: BTreeMap<String, String>,
    body: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
}

impl WebhookEvent {
    /// Capture an inbound request as an event.
    ///
    /// Assigns a fresh id and timestamp and redacts sensitive headers. This is
    /// the only way to build an event from raw request data.
    pub fn capture(request: InboundRequest) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            source: request.source,
            ip: request.ip,
            endpoint: request.endpoint,
            method: request.method,
            headers: redact_headers(request.headers),
            body: request.body,
            user_agent: request.user_agent,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub const fn body(&self) -> &serde_json::Value {
        &self.body
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

/// Replace the value of every sensitive header with [`REDACTED`].
///
/// Name matching is case-insensitive; all other headers pass through verbatim.
pub fn redact_headers(headers: BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .into_iter()
        .map(|(name, value)| {
            if is_sensitive(&name) {
                (name, REDACTED.to_string())
            } else {
                (name, value)
            }
        })
        .collect()
}

fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| name.eq_ignore_ascii_case(sensitive))
}
