//! In-memory sink for dry runs and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ListingSink, SaveOutcome};
use crate::error::Result;
use crate::models::ListingRecord;

#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<BTreeMap<String, ListingRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Stored records ordered by listing id.
    pub async fn records(&self) -> Vec<ListingRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl ListingSink for MemorySink {
    async fn exists(&self, listing_id: &str) -> Result<bool> {
        Ok(self.records.read().await.contains_key(listing_id))
    }

    async fn get(&self, listing_id: &str) -> Result<Option<ListingRecord>> {
        Ok(self.records.read().await.get(listing_id).cloned())
    }

    async fn save(&self, record: &ListingRecord) -> SaveOutcome {
        let mut records = self.records.write().await;
        if records.contains_key(record.listing_id()) {
            return SaveOutcome::Duplicate;
        }
        records.insert(record.listing_id().to_string(), record.clone());
        SaveOutcome::Created
    }

    async fn replace(&self, record: &ListingRecord) -> SaveOutcome {
        let mut records = self.records.write().await;
        match records.insert(record.listing_id().to_string(), record.clone()) {
            Some(_) => SaveOutcome::Updated,
            None => SaveOutcome::Created,
        }
    }

    async fn listing_ids(&self) -> Result<Vec<String>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }
}
