//! HTTP client that routes every request through the admission controller.

mod response;
mod user_agent;

pub use response::FetchedPage;
pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::fetcher::{FetchRequest, PageFetcher};
use super::rate_limiter::RateLimiter;
use crate::error::{HarvestError, Result};

/// reqwest client plus shared per-host admission.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter,
    cancel: CancellationToken,
}

impl HttpClient {
    /// Build a client.
    /// - `user_agent_config` None: harvester agent
    /// - Some("impersonate"): browser agent
    /// - Some(custom): verbatim
    pub fn new(
        timeout: Duration,
        user_agent_config: Option<&str>,
        rate_limiter: RateLimiter,
    ) -> Result<Self> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| HarvestError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop admitting requests once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage> {
        let url = request.url.as_str();

        let admission = tokio::select! {
            _ = self.cancel.cancelled() => return Err(HarvestError::Cancelled),
            admission = self.rate_limiter.acquire(url) => admission?,
        };

        let mut builder = self.client.get(url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let start = Instant::now();
        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                self.rate_limiter.report_server_error(admission.host()).await;
                return Err(HarvestError::transport(url, e));
            }
        };

        let status = response.status().as_u16();
        self.rate_limiter.report_status(admission.host(), status).await;

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::transport(url, e))?;

        // Release the in-flight slot only after the body is read.
        drop(admission);

        debug!(
            "GET {:?} {} -> {} ({} bytes, {:?})",
            request.kind,
            url,
            status,
            body.len(),
            start.elapsed()
        );

        let page = FetchedPage {
            url: url.to_string(),
            status,
            headers,
            body,
        };

        if !page.is_success() {
            return Err(page.status_error());
        }

        Ok(page)
    }
}
