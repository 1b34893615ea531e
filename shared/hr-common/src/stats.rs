//! Hub Statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the broadcast hub's process-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    /// Events broadcast since the hub started.
    pub total_events: u64,
    /// Currently open subscriber connections.
    pub active_connections: usize,
    /// Seconds since the hub started, on a monotonic clock.
    pub uptime_secs: f64,
    /// Wall-clock hub start time.
    pub started_at: DateTime<Utc>,
    /// Timestamp of the most recently broadcast event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
}
