//! Error types, one per failure domain.
//!
//! Only [`ConfigError`] is fatal.  Everything else is logged by the monitor
//! and the loop carries on with the next poll.

use thiserror::Error;

/// Invalid or incomplete configuration, detected before the loop starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
    #[error("Invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Failed to load configuration: {0}")]
    Figment(#[from] figment::Error),
    #[error("Failed to read secret file: {0}")]
    SecretFile(#[from] std::io::Error),
}

/// A failed read from a snapshot source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),
}

impl FetchError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Webhook returned status {0}")]
    Status(u16),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Snapshot file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
