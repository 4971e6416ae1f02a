//! Crawl run accounting.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counts reported at the end of a crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub pages_fetched: u64,
    pub listings_discovered: u64,
    pub duplicates_skipped: u64,
    pub details_fetched: u64,
    pub normalized: u64,
    pub saved_created: u64,
    pub saved_duplicate: u64,
    /// Existing records overwritten by a refresh.
    pub saved_updated: u64,
    pub failed: u64,
    pub cancelled: bool,
}

/// Lock-free counters shared by the session workers of one run.
#[derive(Debug, Default)]
pub struct CrawlCounters {
    pub sessions_started: AtomicU64,
    pub sessions_completed: AtomicU64,
    pub sessions_failed: AtomicU64,
    pub pages_fetched: AtomicU64,
    pub listings_discovered: AtomicU64,
    pub duplicates_skipped: AtomicU64,
    pub details_fetched: AtomicU64,
    pub normalized: AtomicU64,
    pub saved_created: AtomicU64,
    pub saved_duplicate: AtomicU64,
    pub saved_updated: AtomicU64,
    pub failed: AtomicU64,
}

impl CrawlCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cancelled: bool) -> CrawlReport {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CrawlReport {
            sessions_started: get(&self.sessions_started),
            sessions_completed: get(&self.sessions_completed),
            sessions_failed: get(&self.sessions_failed),
            pages_fetched: get(&self.pages_fetched),
            listings_discovered: get(&self.listings_discovered),
            duplicates_skipped: get(&self.duplicates_skipped),
            details_fetched: get(&self.details_fetched),
            normalized: get(&self.normalized),
            saved_created: get(&self.saved_created),
            saved_duplicate: get(&self.saved_duplicate),
            saved_updated: get(&self.saved_updated),
            failed: get(&self.failed),
            cancelled,
        }
    }
}
