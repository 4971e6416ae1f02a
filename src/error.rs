//! Error types for the harvester core.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the crawl core.
///
/// Missing fields inside a third-party payload are not errors; extractors
/// resolve them to defaults and report an [`crate::extract::ExtractionGap`].
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Bad caller-supplied parameters (grid size, bounding box, dates).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The embedded script payload was missing or not valid JSON.
    #[error("Malformed page {url}: {reason}")]
    MalformedPage { url: String, reason: String },

    /// Network-level failure talking to the target host.
    #[error("Transport failure for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The target host answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// 429 or 503, with the host's `Retry-After` when it sent one.
    #[error("HTTP {status} (rate limited) from {url}")]
    RateLimited {
        url: String,
        status: u16,
        retry_after: Option<Duration>,
    },

    /// Persistence error reported by a storage sink.
    #[error("Sink failure: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled before the request could be issued.
    #[error("Crawl cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPage {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn transport(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether a retry through the admission controller may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// How long the host asked us to wait, if it said.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for HarvestError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sink(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(HarvestError::transport("https://example.com", "reset").is_retryable());
        assert!(HarvestError::Status {
            url: "u".into(),
            status: 429
        }
        .is_retryable());
        assert!(HarvestError::Status {
            url: "u".into(),
            status: 502
        }
        .is_retryable());
        assert!(!HarvestError::Status {
            url: "u".into(),
            status: 404
        }
        .is_retryable());
        assert!(HarvestError::RateLimited {
            url: "u".into(),
            status: 429,
            retry_after: None
        }
        .is_retryable());
        assert!(!HarvestError::malformed("u", "no script").is_retryable());
        assert!(!HarvestError::InvalidInput("n".into()).is_retryable());
    }
}
