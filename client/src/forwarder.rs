//! Forwarding engine
//!
//! Re-delivers accepted events to downstream HTTP targets. Every target gets
//! its own call with its own timeout, and a failure on one target never stops
//! delivery to the next.

use std::time::{Duration, Instant};

use futures::future::join_all;
use hr_common::WebhookEvent;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ClientResult;

/// Header carrying the originating event id.
pub const HEADER_EVENT_ID: &str = "X-Hookrelay-Event-Id";
/// Header carrying the event's origin.
pub const HEADER_SOURCE: &str = "X-Hookrelay-Source";
/// Header carrying the path the webhook arrived on.
pub const HEADER_ENDPOINT: &str = "X-Hookrelay-Endpoint";

const USER_AGENT: &str = concat!("hookrelay/", env!("CARGO_PKG_VERSION"));

/// How targets are walked for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardMode {
    /// One target at a time, in list order.
    #[default]
    Sequential,
    /// All targets at once; results still come back in list order.
    Concurrent,
}

/// Outcome of delivering one event to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardResult {
    pub endpoint: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Delivers events to an ordered list of targets.
pub struct Forwarder {
    client: reqwest::Client,
    endpoints: Vec<String>,
    timeout: Duration,
    mode: ForwardMode,
}

impl Forwarder {
    pub fn new<I, S>(endpoints: I, timeout: Duration) -> ClientResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let mut forwarder = Self {
            client,
            endpoints: Vec::new(),
            timeout,
            mode: ForwardMode::Sequential,
        };
        forwarder.set_endpoints(endpoints);
        Ok(forwarder)
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: ForwardMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub const fn mode(&self) -> ForwardMode {
        self.mode
    }

    /// Append a target. Returns `false` if it was already present.
    pub fn add_endpoint(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.endpoints.contains(&url) {
            return false;
        }
        self.endpoints.push(url);
        true
    }

    /// Remove a target. Returns `false` if it was not present.
    pub fn remove_endpoint(&mut self, url: &str) -> bool {
        let before = self.endpoints.len();
        self.endpoints.retain(|e| e != url);
        self.endpoints.len() != before
    }

    /// Replace all targets, keeping the first occurrence of duplicates.
    pub fn set_endpoints<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.clear();
        for url in urls {
            self.add_endpoint(url);
        }
    }

    /// Deliver `event` to every target.
    ///
    /// Returns one result per target, in target-list order, after every
    /// target has been attempted.
    pub async fn forward_event(&self, event: &WebhookEvent) -> Vec<ForwardResult> {
        match self.mode {
            ForwardMode::Sequential => {
                let mut results = Vec::with_capacity(self.endpoints.len());
                for endpoint in &self.endpoints {
                    results.push(self.forward_to(endpoint, event).await);
                }
                results
            }
            ForwardMode::Concurrent => {
                join_all(
                    self.endpoints
                        .iter()
                        .map(|endpoint| self.forward_to(endpoint, event)),
                )
                .await
            }
        }
    }

    async fn forward_to(&self, endpoint: &str, event: &WebhookEvent) -> ForwardResult {
        let start = Instant::now();
        let result = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .header(HEADER_EVENT_ID, event.id().to_string())
            .header(HEADER_SOURCE, event.source())
            .header(HEADER_ENDPOINT, event.endpoint())
            .json(event)
            .send()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(resp) => {
                let status = resp.status();
                debug!(
                    event_id = %event.id(),
                    target = endpoint,
                    status = status.as_u16(),
                    duration_ms,
                    "Event forwarded"
                );
                ForwardResult {
                    endpoint: endpoint.to_string(),
                    success: status.is_success(),
                    status_code: Some(status.as_u16()),
                    error: (!status.is_success()).then(|| format!("HTTP {}", status.as_u16())),
                    duration_ms,
                }
            }
            Err(e) => {
                let error = describe_error(&e, self.timeout);
                warn!(
                    event_id = %event.id(),
                    target = endpoint,
                    error = %error,
                    duration_ms,
                    "Event forward failed"
                );
                ForwardResult {
                    endpoint: endpoint.to_string(),
                    success: false,
                    status_code: None,
                    error: Some(error),
                    duration_ms,
                }
            }
        }
    }
}

fn describe_error(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("Timeout after {}ms", timeout.as_millis())
    } else if err.is_connect() {
        format!("Connection failed: {err}")
    } else {
        err.to_string()
    }
}
