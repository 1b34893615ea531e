//! Broadcast Hub
//!
//! Holds every open subscriber connection and fans ingested events out to all
//! of them. Each connection owns a bounded frame queue; a subscriber that
//! falls behind has frames dropped rather than slowing anyone else down.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hr_common::{HubStats, ServerEvent, WebhookEvent};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of one subscriber connection.
pub type ConnectionId = Uuid;

/// Frames queued for a single subscriber.
pub type FrameReceiver = mpsc::Receiver<Arc<ServerEvent>>;

/// A registered subscriber connection.
pub struct Subscription {
    /// Connection id, used to disconnect or answer heartbeats.
    pub id: ConnectionId,
    /// Outbound frames for this connection only.
    pub frames: FrameReceiver,
}

#[derive(Debug, Default)]
struct Counters {
    total_events: u64,
    active_connections: usize,
    last_event_at: Option<DateTime<Utc>>,
}

/// Real-time fan-out point for all subscriber connections.
pub struct BroadcastHub {
    connections: DashMap<ConnectionId, mpsc::Sender<Arc<ServerEvent>>>,
    counters: Mutex<Counters>,
    started: Instant,
    started_at: DateTime<Utc>,
    queue_capacity: usize,
}

impl BroadcastHub {
    /// Create a hub whose connections each buffer up to `queue_capacity` frames.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            counters: Mutex::new(Counters::default()),
            started: Instant::now(),
            started_at: Utc::now(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection and push the current stats to it.
    ///
    /// Connections are never deduplicated; every call yields an independent
    /// subscription.
    pub fn connect(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, frames) = mpsc::channel(self.queue_capacity);

        let active = {
            let mut counters = self.lock_counters();
            counters.active_connections += 1;
            counters.active_connections
        };
        info!(connection_id = %id, active, "Subscriber connected");

        // Stats go in before the connection is visible to broadcasts.
        if let Err(e) = tx.try_send(Arc::new(ServerEvent::Stats(self.get_stats()))) {
            warn!(connection_id = %id, "Failed to queue stats: {}", e);
        }
        self.connections.insert(id, tx);

        Subscription { id, frames }
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn disconnect(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_none() {
            return;
        }

        let active = {
            let mut counters = self.lock_counters();
            counters.active_connections = counters.active_connections.saturating_sub(1);
            counters.active_connections
        };
        info!(connection_id = %id, active, "Subscriber disconnected");
    }

    /// Answer a heartbeat on the connection that sent it.
    pub fn pong(&self, id: ConnectionId) -> bool {
        self.send_to(id, ServerEvent::pong())
    }

    /// Push an event to every currently connected subscriber.
    ///
    /// Delivery is best-effort and never waits: subscribers whose queue is
    /// full miss this event. Returns how many subscribers accepted it.
    pub fn broadcast_event(&self, event: WebhookEvent) -> usize {
        {
            let mut counters = self.lock_counters();
            counters.total_events += 1;
            counters.last_event_at = Some(event.timestamp());
        }

        let event_id = event.id();
        let frame = Arc::new(ServerEvent::Webhook(event));
        let mut delivered = 0;

        for entry in &self.connections {
            match entry.value().try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        connection_id = %entry.key(),
                        event_id = %event_id,
                        "Subscriber queue full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection_id = %entry.key(), "Subscriber queue closed");
                }
            }
        }

        debug!(event_id = %event_id, delivered, "Event broadcast");
        delivered
    }

    /// Snapshot of the hub counters.
    pub fn get_stats(&self) -> HubStats {
        let counters = self.lock_counters();
        HubStats {
            total_events: counters.total_events,
            active_connections: counters.active_connections,
            uptime_secs: self.started.elapsed().as_secs_f64(),
            started_at: self.started_at,
            last_event_at: counters.last_event_at,
        }
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.lock_counters().active_connections
    }

    fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let Some(tx) = self.connections.get(&id) else {
            return false;
        };
        match tx.try_send(Arc::new(event)) {
            Ok(()) => true,
            Err(e) => {
                warn!(connection_id = %id, "Failed to queue frame: {}", e);
                false
            }
        }
    }

    fn lock_counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
