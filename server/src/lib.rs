//! Hookrelay Server
//!
//! Accepts webhooks on any path and relays them in real time to every
//! connected subscriber.

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod ws;
