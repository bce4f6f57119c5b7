//! Collaborator error type.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by pipeline collaborators.
///
/// The worker classifies these per stage; the variant only says which
/// collaborator gave up.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("article fetch failed: {0}")]
    Fetch(String),

    #[error("ai provider error: {0}")]
    AiProvider(String),

    #[error("note persistence failed: {0}")]
    Persistence(String),

    #[error("reply delivery failed: {0}")]
    Delivery(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ConnectorError {
    /// Maps a reqwest error, keeping timeouts distinct.
    pub(crate) fn from_http(
        err: reqwest::Error,
        timeout: Duration,
        wrap: fn(String) -> ConnectorError,
    ) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            wrap(err.to_string())
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;
