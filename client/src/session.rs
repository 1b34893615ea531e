//! Subscriber Session
//!
//! Owns the single WebSocket connection to the hub, reconnects on a fixed
//! delay, and reports every state transition.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use hr_common::{ClientEvent, HubStats, ServerEvent, WebhookEvent};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::SubscriberConfig;
use crate::error::{ClientError, ClientResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Invoked with a snapshot after every status transition.
pub type StatusCallback = Arc<dyn Fn(&ConnectionStatus) + Send + Sync>;
/// Invoked with every webhook the hub broadcasts.
pub type EventCallback = Arc<dyn Fn(WebhookEvent) + Send + Sync>;

const OUTBOUND_CAPACITY: usize = 16;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted. Terminal.
    Failed,
}

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: SessionState,
    pub connected: bool,
    pub last_connected: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
}

/// State shared between the session handle and its connection task.
struct Shared {
    status: watch::Sender<ConnectionStatus>,
    on_status: Option<StatusCallback>,
    on_event: Option<EventCallback>,
    last_stats: Mutex<Option<HubStats>>,
}

impl Shared {
    fn update(&self, f: impl FnOnce(&mut ConnectionStatus)) {
        self.status.send_modify(f);
        if let Some(on_status) = &self.on_status {
            let snapshot = self.status.borrow().clone();
            on_status(&snapshot);
        }
    }

    fn mark_connected(&self) {
        self.update(|s| {
            s.state = SessionState::Connected;
            s.connected = true;
            s.last_connected = Some(Utc::now());
            s.reconnect_attempts = 0;
            s.last_error = None;
        });
    }

    fn mark_disconnected(&self, error: Option<String>) {
        self.update(|s| {
            s.state = SessionState::Disconnected;
            s.connected = false;
            s.last_error = error;
        });
    }

    fn handle_frame(&self, text: &str) {
        match ServerEvent::decode(text) {
            Ok(ServerEvent::Webhook(event)) => {
                debug!(event_id = %event.id(), endpoint = %event.endpoint(), "Webhook received");
                if let Some(on_event) = &self.on_event {
                    on_event(event);
                }
            }
            Ok(ServerEvent::Stats(stats)) => {
                debug!(
                    total_events = stats.total_events,
                    active_connections = stats.active_connections,
                    "Hub stats received"
                );
                *self
                    .last_stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(stats);
            }
            Ok(ServerEvent::Pong { timestamp }) => {
                debug!(%timestamp, "Pong received");
            }
            Err(e) => {
                warn!("Failed to parse hub frame: {} - {}", e, text);
            }
        }
    }
}

/// Where to connect and how hard to try.
#[derive(Debug, Clone)]
struct ReconnectPolicy {
    url: Url,
    interval: Duration,
    max_attempts: u32,
}

struct RunningTask {
    outbound: mpsc::Sender<ClientEvent>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// How a live connection ended.
enum Exit {
    Shutdown,
    Dropped(String),
}

/// One subscriber's connection to the hub.
pub struct SubscriberSession {
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    task: tokio::sync::Mutex<Option<RunningTask>>,
}

impl SubscriberSession {
    pub fn new(config: &SubscriberConfig) -> Self {
        Self::with_callbacks(config, None, None)
    }

    /// Create a session with optional status and event callbacks.
    pub fn with_callbacks(
        config: &SubscriberConfig,
        on_status: Option<StatusCallback>,
        on_event: Option<EventCallback>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            policy: ReconnectPolicy {
                url: config.hub_url.clone(),
                interval: config.reconnect_interval,
                max_attempts: config.max_reconnect_attempts,
            },
            shared: Arc::new(Shared {
                status,
                on_status,
                on_event,
                last_stats: Mutex::new(None),
            }),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Open the connection.
    ///
    /// Returns once the first attempt succeeds; later drops are handled by
    /// the background reconnect loop. A failed first attempt is returned as
    /// an error and is not retried.
    pub async fn connect(&self) -> ClientResult<()> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Err(ClientError::AlreadyConnected);
        }

        self.shared.update(|s| {
            s.state = SessionState::Connecting;
            s.connected = false;
            s.reconnect_attempts = 0;
            s.last_error = None;
        });
        info!(hub = %self.policy.url, "Connecting to hub");

        let stream = match connect_async(self.policy.url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                let reason = e.to_string();
                error!(hub = %self.policy.url, error = %reason, "Failed to connect");
                self.shared.mark_disconnected(Some(reason.clone()));
                return Err(ClientError::ConnectionFailed(reason));
            }
        };

        info!(hub = %self.policy.url, "Connected to hub");
        self.shared.mark_connected();

        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(connection_loop(
            stream,
            self.policy.clone(),
            Arc::clone(&self.shared),
            outbound_rx,
            shutdown_rx,
        ));

        *task = Some(RunningTask {
            outbound,
            shutdown,
            handle,
        });
        Ok(())
    }

    /// Close the connection deliberately. No reconnect follows.
    pub async fn disconnect(&self) {
        let running = self.task.lock().await.take();
        let Some(running) = running else {
            return;
        };

        let _ = running.shutdown.send(());
        if let Err(e) = running.handle.await {
            error!("Connection task ended abnormally: {}", e);
            self.shared.mark_disconnected(None);
        }
    }

    /// Queue a heartbeat. Returns `false` when not connected.
    pub async fn ping(&self) -> bool {
        if !self.shared.status.borrow().connected {
            return false;
        }

        let task = self.task.lock().await;
        task.as_ref()
            .is_some_and(|t| t.outbound.try_send(ClientEvent::Ping).is_ok())
    }

    /// Current status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Most recent stats pushed by the hub.
    pub fn last_stats(&self) -> Option<HubStats> {
        self.shared
            .last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Drive the connection and reconnect after drops until shut down or failed.
async fn connection_loop(
    stream: WsStream,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::Receiver<ClientEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut stream = stream;

    loop {
        match drive(stream, &shared, &mut outbound_rx, &mut shutdown_rx).await {
            Exit::Shutdown => {
                info!("Disconnected from hub");
                shared.mark_disconnected(None);
                return;
            }
            Exit::Dropped(reason) => {
                warn!(reason = %reason, "Connection to hub lost");
                shared.mark_disconnected(Some(reason));
            }
        }

        match reconnect(&policy, &shared, &mut shutdown_rx).await {
            Some(next) => stream = next,
            None => return,
        }
    }
}

/// Pump one live connection until it drops or shutdown is requested.
async fn drive(
    stream: WsStream,
    shared: &Shared,
    outbound_rx: &mut mpsc::Receiver<ClientEvent>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> Exit {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => shared.handle_frame(text.as_str()),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            return Exit::Dropped(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map_or_else(
                            || "Connection closed by hub".to_string(),
                            |f| format!("Connection closed by hub: {} {}", f.code, f.reason.as_str()),
                        );
                        return Exit::Dropped(reason);
                    }
                    Some(Err(e)) => return Exit::Dropped(e.to_string()),
                    None => return Exit::Dropped("Connection closed".to_string()),
                    _ => {}
                }
            }

            Some(event) = outbound_rx.recv() => {
                match event.encode() {
                    Ok(json) => {
                        debug!("Sending: {}", json);
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            return Exit::Dropped(e.to_string());
                        }
                    }
                    Err(e) => error!("Failed to serialize frame: {}", e),
                }
            }

            _ = &mut *shutdown_rx => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!("Close frame not sent: {}", e);
                }
                return Exit::Shutdown;
            }
        }
    }
}

/// Retry on a fixed delay. `None` means shutdown was requested or the
/// attempts ran out.
async fn reconnect(
    policy: &ReconnectPolicy,
    shared: &Shared,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> Option<WsStream> {
    for attempt in 1..=policy.max_attempts {
        tokio::select! {
            () = tokio::time::sleep(policy.interval) => {}
            _ = &mut *shutdown_rx => {
                info!("Shutdown during reconnect delay");
                shared.mark_disconnected(None);
                return None;
            }
        }

        info!(attempt, max_attempts = policy.max_attempts, "Reconnecting to hub");
        shared.update(|s| {
            s.state = SessionState::Reconnecting;
            s.reconnect_attempts = attempt;
        });

        let result = tokio::select! {
            result = connect_async(policy.url.as_str()) => result,
            _ = &mut *shutdown_rx => {
                info!("Shutdown during reconnect attempt");
                shared.mark_disconnected(None);
                return None;
            }
        };

        match result {
            Ok((stream, _)) => {
                info!(attempt, "Reconnected to hub");
                shared.mark_connected();
                return Some(stream);
            }
            Err(e) => {
                warn!(attempt, error = %e, "Reconnect attempt failed");
                shared.update(|s| s.last_error = Some(e.to_string()));
            }
        }
    }

    let reason = format!("Failed to reconnect after {} attempts", policy.max_attempts);
    error!("{}", reason);
    shared.update(|s| {
        s.state = SessionState::Failed;
        s.connected = false;
        s.last_error = Some(reason);
    });
    None
}
