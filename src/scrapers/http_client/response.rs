//! Fetched response bodies.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::HarvestError;

/// A response whose body has been read.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl FetchedPage {
    /// A 200 response with no headers, for scripted fetchers.
    pub fn ok(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Retry-After` in seconds, when the host sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get("retry-after")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// The error for a non-success response; 429 and 503 keep `Retry-After`.
    pub fn status_error(&self) -> HarvestError {
        match self.status {
            429 | 503 => HarvestError::RateLimited {
                url: self.url.clone(),
                status: self.status,
                retry_after: self.retry_after(),
            },
            status => HarvestError::Status {
                url: self.url.clone(),
                status,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after() {
        let mut page = FetchedPage::ok("https://example.com", "");
        assert_eq!(page.retry_after(), None);
        page.headers.insert("retry-after".into(), "30".into());
        assert_eq!(page.retry_after(), Some(Duration::from_secs(30)));
        page.headers.insert("retry-after".into(), "Wed, 21 Oct 2015 07:28:00 GMT".into());
        assert_eq!(page.retry_after(), None);
    }

    #[test]
    fn test_status_error_keeps_retry_after() {
        let mut page = FetchedPage::ok("https://example.com/s", "");
        page.status = 429;
        page.headers.insert("retry-after".into(), "7".into());
        let err = page.status_error();
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));

        page.status = 404;
        assert!(matches!(
            page.status_error(),
            HarvestError::Status { status: 404, .. }
        ));
    }

    #[test]
    fn test_is_success() {
        let mut page = FetchedPage::ok("u", "");
        assert!(page.is_success());
        page.status = 429;
        assert!(!page.is_success());
    }
}
