//! Common Errors

use thiserror::Error;

/// Result alias for the common crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while encoding or decoding protocol frames.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame was not valid JSON or did not match the protocol.
    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] serde_json::Error),
}
