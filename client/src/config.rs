//! Subscriber configuration
//!
//! Everything a session needs is fixed when it starts; nothing here changes
//! while it runs.

use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::forwarder::ForwardMode;

pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 100;

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// WebSocket URL of the hub.
    pub hub_url: Url,
    /// Endpoint prefixes to act on. Empty means every endpoint.
    pub endpoints: Vec<String>,
    /// Downstream HTTP targets, in delivery order.
    pub forward_targets: Vec<String>,
    /// Bound on each forward call.
    pub forward_timeout: Duration,
    /// Fixed delay between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Reconnect attempts before the session gives up.
    pub max_reconnect_attempts: u32,
    /// Heartbeat period; `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
    /// Accepted events waiting for the forwarder.
    pub event_queue_capacity: usize,
    /// Sequential or concurrent delivery to targets.
    pub forward_mode: ForwardMode,
}

impl SubscriberConfig {
    /// Configuration for `hub` with every other setting at its default.
    pub fn new(hub: &str) -> ClientResult<Self> {
        Ok(Self {
            hub_url: normalize_hub_url(hub)?,
            endpoints: Vec::new(),
            forward_targets: Vec::new(),
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            forward_mode: ForwardMode::Sequential,
        })
    }

    #[must_use]
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints
            .into_iter()
            .map(Into::into)
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn with_forward_targets<I, S>(mut self, targets: I) -> ClientResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forward_targets = targets
            .into_iter()
            .map(Into::into)
            .map(|t| validate_forward_target(t.trim()))
            .collect::<ClientResult<_>>()?;
        Ok(self)
    }

    #[must_use]
    pub const fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_reconnect(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.reconnect_interval = interval;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    #[must_use]
    pub const fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_forward_mode(mut self, mode: ForwardMode) -> Self {
        self.forward_mode = mode;
        self
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> ClientResult<()> {
        if self.forward_timeout.is_zero() {
            return Err(ClientError::Config("forward timeout must be greater than zero".into()));
        }
        if self.reconnect_interval.is_zero() {
            return Err(ClientError::Config(
                "reconnect interval must be greater than zero".into(),
            ));
        }
        if self.event_queue_capacity == 0 {
            return Err(ClientError::Config("event queue must hold at least one event".into()));
        }
        Ok(())
    }
}

/// Turn user input into the hub's WebSocket URL.
///
/// `http`/`https` become `ws`/`wss`, and `/ws` is used when no path is given.
pub fn normalize_hub_url(raw: &str) -> ClientResult<Url> {
    let invalid = |reason: String| ClientError::InvalidHubUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid("cannot switch to WebSocket scheme".into()))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/ws");
    }

    Ok(url)
}

fn validate_forward_target(raw: &str) -> ClientResult<String> {
    let url = Url::parse(raw).map_err(|e| ClientError::InvalidForwardTarget {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        other => Err(ClientError::InvalidForwardTarget {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}
