//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:3000")
    pub bind_address: String,

    /// Maximum inbound webhook body size in bytes (default: 10MB)
    pub max_body_size: usize,

    /// Outbound frame queue per subscriber connection (default: 256)
    pub subscriber_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            max_body_size: parse_var("MAX_BODY_SIZE")?.unwrap_or(10 * 1024 * 1024), // 10MB
            subscriber_queue_capacity: parse_var("SUBSCRIBER_QUEUE_CAPACITY")?.unwrap_or(256),
        };

        if config.subscriber_queue_capacity == 0 {
            anyhow::bail!("SUBSCRIBER_QUEUE_CAPACITY must be greater than zero");
        }

        Ok(config)
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:0".into(),
            max_body_size: 64 * 1024,
            subscriber_queue_capacity: 16,
        }
    }
}

/// Parse an optional numeric environment variable.
fn parse_var(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be a positive integer, got {raw:?}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_small_and_local() {
        let config = Config::default_for_test();
        assert_eq!(config.bind_address, "127.0.0.1:0");
        assert!(config.subscriber_queue_capacity > 0);
    }
}
