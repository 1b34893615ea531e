//! Hookrelay Client Library
//!
//! Subscribes to a hub, filters incoming webhooks by endpoint, and re-delivers
//! them to local HTTP targets.

pub mod config;
pub mod error;
pub mod filter;
pub mod forwarder;
pub mod intake;
pub mod output;
pub mod session;

pub use config::SubscriberConfig;
pub use error::{ClientError, ClientResult};
pub use filter::EndpointFilter;
pub use forwarder::{ForwardMode, ForwardResult, Forwarder};
pub use session::{ConnectionStatus, SessionState, SubscriberSession};
