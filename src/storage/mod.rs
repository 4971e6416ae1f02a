//! Storage sinks for harvested listings.
//!
//! The crawl hands every [`ListingRecord`] to a [`ListingSink`]. Sinks own
//! cross-run deduplication; the crawl only dedupes within a run.

mod memory;
mod sqlite;

use async_trait::async_trait;

pub use memory::MemorySink;
pub use sqlite::SqliteSink;

use crate::error::Result;
use crate::models::ListingRecord;

/// Result of handing one record to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    /// The listing was already stored; nothing changed.
    Duplicate,
    /// An existing listing was overwritten (refresh).
    Updated,
    Failed(String),
}

#[async_trait]
pub trait ListingSink: Send + Sync {
    async fn exists(&self, listing_id: &str) -> Result<bool>;

    /// The stored record, if any.
    async fn get(&self, listing_id: &str) -> Result<Option<ListingRecord>>;

    /// Insert a new listing; existing ids report [`SaveOutcome::Duplicate`].
    async fn save(&self, record: &ListingRecord) -> SaveOutcome;

    /// Insert or overwrite.
    async fn replace(&self, record: &ListingRecord) -> SaveOutcome;

    /// Every stored listing id.
    async fn listing_ids(&self) -> Result<Vec<String>>;
}
