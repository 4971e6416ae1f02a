//! The seam between the crawl and the network.

use async_trait::async_trait;

use super::http_client::FetchedPage;
use crate::error::Result;

/// What a request is for; used for logging and accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    SearchPage,
    Detail,
}

/// One outbound GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub kind: RequestKind,
}

impl FetchRequest {
    pub fn search(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            kind: RequestKind::SearchPage,
        }
    }

    pub fn detail(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            kind: RequestKind::Detail,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Issues requests. Implementations return `Err(Status)` for non-2xx.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage>;
}
