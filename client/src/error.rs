//! Client error types

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid hub URL {url:?}: {reason}")]
    InvalidHubUrl { url: String, reason: String },

    #[error("Invalid forward target {url:?}: {reason}")]
    InvalidForwardTarget { url: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Session is already connected")]
    AlreadyConnected,

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}
