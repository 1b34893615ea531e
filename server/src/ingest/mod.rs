//! Ingestion Gateway
//!
//! Turns inbound webhook calls into [`WebhookEvent`]s, acknowledges the
//! sender, and only then hands the event to the registered callback.
//! The callback is tied to the end of the acknowledgement body, so it
//! cannot run before the sender's response has been written out.

mod origin;

pub use origin::resolve_origin;

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use hr_common::{InboundRequest, WebhookEvent};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::IngestError;

/// Callback receiving every successfully ingested event.
pub type EventCallback = Arc<dyn Fn(WebhookEvent) + Send + Sync>;

/// Acknowledgement sent to the webhook sender.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Builds events from requests and emits them to a single callback.
pub struct IngestionGateway {
    max_body_size: usize,
    on_event: EventCallback,
}

impl IngestionGateway {
    /// Create a gateway that emits captured events to `on_event`.
    pub fn new(max_body_size: usize, on_event: EventCallback) -> Self {
        Self {
            max_body_size,
            on_event,
        }
    }

    /// Build an event from a raw request.
    pub async fn capture(&self, request: Request) -> Result<WebhookEvent, IngestError> {
        let connect_info = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .cloned();
        let (parts, body) = request.into_parts();

        let bytes = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| {
                if is_length_limit(&e) {
                    IngestError::PayloadTooLarge
                } else {
                    IngestError::MalformedBody(e.to_string())
                }
            })?;

        let (source, ip) = resolve_origin(&parts.headers, connect_info.as_ref());
        let body = parse_body(&parts.headers, &bytes)?;
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        Ok(WebhookEvent::capture(InboundRequest {
            source,
            ip,
            endpoint: parts.uri.path().to_string(),
            method: parts.method.as_str().to_string(),
            headers: collect_headers(&parts.headers),
            body,
            user_agent,
        }))
    }

    /// Acknowledge `event` to the sender.
    ///
    /// The callback fires once the acknowledgement body has been fully
    /// produced, or when the body is dropped unread. It runs on the
    /// connection's task and must not block.
    pub fn acknowledge(&self, event: WebhookEvent) -> Response {
        let ack = IngestResponse {
            success: true,
            event_id: event.id(),
            timestamp: event.timestamp(),
        };
        let bytes = match serde_json::to_vec(&ack) {
            Ok(bytes) => bytes,
            Err(e) => return IngestError::Internal(e.to_string()).into_response(),
        };

        let pending = PendingDispatch {
            event: Some(event),
            on_event: Arc::clone(&self.on_event),
        };
        let release = stream::once(async move { drop(pending) })
            .filter_map(|()| async { None::<Result<Vec<u8>, Infallible>> });
        let body = stream::once(async move { Ok::<_, Infallible>(bytes) }).chain(release);

        (
            [(header::CONTENT_TYPE, "application/json")],
            Body::from_stream(body),
        )
            .into_response()
    }
}

/// Emits its event to the callback when dropped.
struct PendingDispatch {
    event: Option<WebhookEvent>,
    on_event: EventCallback,
}

impl Drop for PendingDispatch {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            (self.on_event)(event);
        }
    }
}

/// Ingest handler for `POST <any path>`.
pub async fn handler(State(state): State<AppState>, request: Request) -> Response {
    let gateway = &state.gateway;

    let event = match gateway.capture(request).await {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Failed to ingest webhook");
            return e.into_response();
        }
    };

    info!(
        event_id = %event.id(),
        endpoint = %event.endpoint(),
        ip = %event.ip(),
        "Webhook received"
    );

    gateway.acknowledge(event)
}

/// Router fallback: POST is ingested, every other method is rejected.
pub async fn fallback(state: State<AppState>, request: Request) -> Response {
    if request.method() == Method::POST {
        return handler(state, request).await;
    }

    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({
            "success": false,
            "error": "Method not allowed",
        })),
    )
        .into_response()
}

/// Flatten headers into a name → value map, joining repeated headers.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

/// Decode the body according to its content type.
fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> Result<serde_json::Value, IngestError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }

    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if media_type == "application/json" || media_type.ends_with("+json") {
        return Ok(serde_json::from_slice(bytes)?);
    }

    if media_type == "application/x-www-form-urlencoded" {
        let fields = url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
            .collect();
        return Ok(serde_json::Value::Object(fields));
    }

    Ok(serde_json::Value::String(
        String::from_utf8_lossy(bytes).into_owned(),
    ))
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
