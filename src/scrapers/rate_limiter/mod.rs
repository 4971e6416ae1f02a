//! Per-host admission controller.
//!
//! Every outbound request, search page or listing detail, is admitted here
//! first. A host gets a semaphore capping in-flight requests and a minimum
//! spacing between request starts. The spacing backs off on 429/503 and
//! other 5xx responses and recovers after a run of successes.

mod config;
mod host_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, RwLock};
use tracing::{debug, info, warn};
use url::Url;

pub use config::{HostStats, RateLimitConfig};
use host_state::HostState;

use crate::error::{HarvestError, Result};

/// Permission to issue one request. Dropping it frees the in-flight slot.
#[derive(Debug)]
pub struct Admission {
    host: String,
    _permit: OwnedSemaphorePermit,
}

impl Admission {
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Shared admission controller; clones share state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    hosts: Arc<RwLock<HashMap<String, HostState>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            hosts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn extract_host(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait for an in-flight slot and the host's next start time.
    pub async fn acquire(&self, url: &str) -> Result<Admission> {
        let host = Self::extract_host(url)
            .ok_or_else(|| HarvestError::InvalidInput(format!("URL has no host: {}", url)))?;

        let permits = {
            let mut hosts = self.hosts.write().await;
            hosts
                .entry(host.clone())
                .or_insert_with(|| HostState::new(self.config.max_in_flight, self.config.base_delay))
                .permits
                .clone()
        };

        let permit = permits
            .acquire_owned()
            .await
            .map_err(|_| HarvestError::Cancelled)?;

        let wait = {
            let mut hosts = self.hosts.write().await;
            match hosts.get_mut(&host) {
                Some(state) => state.reserve_slot(Instant::now()),
                None => Duration::ZERO,
            }
        };

        if wait > Duration::ZERO {
            debug!("Pacing {}: waiting {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }

        Ok(Admission {
            host,
            _permit: permit,
        })
    }

    /// Feed a response status back into the host's pacing.
    pub async fn report_status(&self, host: &str, status: u16) {
        match status {
            429 | 503 => self.report_rate_limit(host, status).await,
            500..=599 => self.report_server_error(host).await,
            200..=399 => self.report_success(host).await,
            _ => self.report_client_error(host).await,
        }
    }

    /// Successful request; may shorten the delay while in backoff.
    pub async fn report_success(&self, host: &str) {
        let mut hosts = self.hosts.write().await;
        if let Some(state) = hosts.get_mut(host) {
            state.consecutive_successes += 1;

            if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
                let new_delay = Duration::from_secs_f64(
                    state.current_delay.as_secs_f64() * self.config.recovery_multiplier,
                );
                state.current_delay = new_delay.max(self.config.min_delay);

                if state.current_delay <= self.config.base_delay {
                    state.in_backoff = false;
                    state.current_delay = self.config.base_delay;
                    info!("Host {} recovered from rate limit backoff", host);
                } else {
                    debug!("Host {} delay reduced to {:?}", host, state.current_delay);
                }

                state.consecutive_successes = 0;
            }
        }
    }

    /// 429 or 503: multiply the delay.
    pub async fn report_rate_limit(&self, host: &str, status: u16) {
        let mut hosts = self.hosts.write().await;
        if let Some(state) = hosts.get_mut(host) {
            state.rate_limit_hits += 1;
            state.consecutive_successes = 0;
            state.in_backoff = true;

            let new_delay = Duration::from_secs_f64(
                state.current_delay.as_secs_f64() * self.config.backoff_multiplier,
            );
            state.current_delay = new_delay.min(self.config.max_delay);

            warn!(
                "Rate limited by {} (HTTP {}), backing off to {:?}",
                host, status, state.current_delay
            );
        }
    }

    /// Other 5xx: mild backoff.
    pub async fn report_server_error(&self, host: &str) {
        let mut hosts = self.hosts.write().await;
        if let Some(state) = hosts.get_mut(host) {
            state.consecutive_successes = 0;
            let new_delay = Duration::from_secs_f64(state.current_delay.as_secs_f64() * 1.5);
            state.current_delay = new_delay.min(self.config.max_delay);
            state.in_backoff = true;
            debug!(
                "Server error for {}, delay increased to {:?}",
                host, state.current_delay
            );
        }
    }

    /// 4xx other than 429 leaves pacing alone.
    pub async fn report_client_error(&self, host: &str) {
        let hosts = self.hosts.read().await;
        if let Some(state) = hosts.get(host) {
            debug!(
                "Client error for {}, delay unchanged at {:?}",
                host, state.current_delay
            );
        }
    }

    pub async fn get_stats(&self) -> HashMap<String, HostStats> {
        let hosts = self.hosts.read().await;
        hosts
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    HostStats {
                        current_delay: v.current_delay,
                        in_backoff: v.in_backoff,
                        in_flight: v.in_flight(),
                        total_requests: v.total_requests,
                        rate_limit_hits: v.rate_limit_hits,
                    },
                )
            })
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
