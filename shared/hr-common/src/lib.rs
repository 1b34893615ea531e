//! Hookrelay Common Library
//!
//! Shared types and the real-time protocol used by both server and client.

pub mod error;
pub mod event;
pub mod protocol;
pub mod stats;

pub use error::{Error, Result};
pub use event::{redact_headers, InboundRequest, WebhookEvent, REDACTED, SENSITIVE_HEADERS};
pub use protocol::{ClientEvent, ServerEvent};
pub use stats::HubStats;
