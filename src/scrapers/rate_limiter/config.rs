//! Admission controller configuration.

use std::time::Duration;

/// Per-host pacing and concurrency settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed in flight to one host at a time.
    pub max_in_flight: usize,
    /// Delay between request starts to the same host.
    pub base_delay: Duration,
    /// Floor when recovering from backoff.
    pub min_delay: Duration,
    /// Ceiling for backoff.
    pub max_delay: Duration,
    /// Multiplier applied on 429/503.
    pub backoff_multiplier: f64,
    /// Multiplier (< 1.0) applied while recovering.
    pub recovery_multiplier: f64,
    /// Consecutive successes before the delay is reduced.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 1,
            base_delay: Duration::from_millis(20),
            min_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.8,
            recovery_threshold: 5,
        }
    }
}

/// Snapshot of one host's state.
#[derive(Debug, Clone)]
pub struct HostStats {
    pub current_delay: Duration,
    pub in_backoff: bool,
    pub in_flight: usize,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}
