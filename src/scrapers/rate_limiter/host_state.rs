//! Per-host admission state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

/// State for a single target host.
#[derive(Debug, Clone)]
pub struct HostState {
    /// Caps requests in flight to this host.
    pub permits: Arc<Semaphore>,
    pub max_in_flight: usize,
    /// Current spacing between request starts.
    pub current_delay: Duration,
    /// Start time reserved by the most recent admission; may be in the future.
    pub next_slot: Option<Instant>,
    pub consecutive_successes: u32,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}

impl HostState {
    pub fn new(max_in_flight: usize, base_delay: Duration) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            current_delay: base_delay,
            next_slot: None,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            rate_limit_hits: 0,
        }
    }

    /// Reserve the next start time and return how long to wait for it.
    ///
    /// Slots are spaced by `current_delay` from the previous reservation,
    /// so concurrent callers queue up instead of all firing at once.
    pub fn reserve_slot(&mut self, now: Instant) -> Duration {
        let slot = match self.next_slot {
            Some(previous) => (previous + self.current_delay).max(now),
            None => now,
        };
        self.next_slot = Some(slot);
        self.total_requests += 1;
        slot.saturating_duration_since(now)
    }

    pub fn in_flight(&self) -> usize {
        self.max_in_flight
            .saturating_sub(self.permits.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_slot_is_immediate() {
        let mut state = HostState::new(1, Duration::from_millis(20));
        assert_eq!(state.reserve_slot(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_slots_are_spaced() {
        let mut state = HostState::new(1, Duration::from_millis(100));
        let now = Instant::now();
        state.reserve_slot(now);
        assert_eq!(state.reserve_slot(now), Duration::from_millis(100));
        assert_eq!(state.reserve_slot(now), Duration::from_millis(200));
        assert_eq!(state.total_requests, 3);
    }

    #[test]
    fn test_idle_host_does_not_accumulate_wait() {
        let mut state = HostState::new(1, Duration::from_millis(10));
        let start = Instant::now();
        state.reserve_slot(start);
        let later = start + Duration::from_secs(5);
        assert_eq!(state.reserve_slot(later), Duration::ZERO);
    }
}
