//! Storage ports and in-memory implementations
//!
//! The core consumes two storage contracts:
//!
//! - [`FeedStore`] - feed configuration records, queried with a compound
//!   boolean filter ([`FeedCondition`]) that a document-store adapter can
//!   push down (equality, presence checks, OR-of-ranges) or evaluate
//!   in-memory with identical selection semantics.
//! - [`SeenArticleStore`] - long-term seen-article ids per (feed, id type),
//!   used to decide which batch members are genuinely new.
//!
//! [`MemoryFeedStore`] and [`MemorySeenStore`] back single-node mode and
//! the test suites.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::FeedRecord;

/// Storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store could not be reached
    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },

    /// The store rejected the request
    #[error("storage query failed during {operation}: {reason}")]
    QueryFailed { operation: String, reason: String },
}

impl StorageError {
    /// Create an unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a query failure with operation context
    pub fn query_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable (worth retrying next tick)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Compound boolean filter over feed records
///
/// The due-feed selection of one scheduler tick is expressed as a single
/// condition tree so storage adapters can evaluate it at the query level;
/// [`FeedCondition::matches`] defines the reference semantics any pushdown
/// must preserve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedCondition {
    /// Every child must hold
    AllOf(Vec<FeedCondition>),

    /// At least one child must hold
    AnyOf(Vec<FeedCondition>),

    /// Effective refresh interval equals the tick's target interval
    RefreshRateSecondsEq(u64),

    /// Feed carries no disabled code
    NotDisabled,

    /// At least one delivery destination is active
    HasActiveDestination,

    /// Feed has no persisted slot offset (legacy/unmigrated)
    SlotOffsetMissing,

    /// Slot offset falls inside `[start_ms, end_ms)`
    SlotOffsetInRange { start_ms: u64, end_ms: u64 },
}

impl FeedCondition {
    /// Reference evaluation of the condition against one record
    pub fn matches(&self, feed: &FeedRecord) -> bool {
        match self {
            Self::AllOf(children) => children.iter().all(|c| c.matches(feed)),
            Self::AnyOf(children) => children.iter().any(|c| c.matches(feed)),
            Self::RefreshRateSecondsEq(rate) => feed.refresh_rate_seconds == *rate,
            Self::NotDisabled => feed.is_enabled(),
            Self::HasActiveDestination => feed.has_active_destination(),
            Self::SlotOffsetMissing => feed.slot_offset_ms.is_none(),
            Self::SlotOffsetInRange { start_ms, end_ms } => feed
                .slot_offset_ms
                .map(|offset| offset >= *start_ms && offset < *end_ms)
                .unwrap_or(false),
        }
    }
}

/// Feed configuration store contract
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Select feeds matching a compound condition
    async fn find_matching(
        &self,
        condition: &FeedCondition,
    ) -> Result<Vec<FeedRecord>, StorageError>;

    /// Distinct effective refresh intervals currently present
    async fn distinct_refresh_rates(&self) -> Result<Vec<u64>, StorageError>;

    /// Feeds lacking a slot offset, up to `limit` (backfill batches)
    async fn find_missing_slot_offset(
        &self,
        limit: usize,
    ) -> Result<Vec<FeedRecord>, StorageError>;

    /// Persist slot offsets in bulk: (feed id, offset ms) pairs
    async fn set_slot_offsets(&self, updates: &[(String, u64)]) -> Result<(), StorageError>;

    /// Persist a recomputed effective interval and its matching slot offset
    async fn apply_refresh_rate(
        &self,
        feed_id: &str,
        refresh_rate_seconds: u64,
        slot_offset_ms: u64,
    ) -> Result<(), StorageError>;

    /// Persist the content hash of the last processed response
    async fn set_response_hash(&self, feed_id: &str, hash: &str) -> Result<(), StorageError>;
}

/// Seen-article store contract
#[async_trait]
pub trait SeenArticleStore: Send + Sync {
    /// Whether any ids were ever recorded for this feed
    async fn has_any(&self, feed_id: &str) -> Result<bool, StorageError>;

    /// Of `ids`, return those not yet recorded for (feed, id type),
    /// preserving input order
    async fn filter_new(
        &self,
        feed_id: &str,
        id_type: &str,
        ids: &[String],
    ) -> Result<Vec<String>, StorageError>;

    /// Record ids as seen for (feed, id type)
    async fn record_seen(
        &self,
        feed_id: &str,
        id_type: &str,
        ids: &[String],
    ) -> Result<(), StorageError>;
}

/// In-memory feed store
#[derive(Default)]
pub struct MemoryFeedStore {
    feeds: RwLock<HashMap<String, FeedRecord>>,
}

impl MemoryFeedStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with records
    pub async fn with_feeds(feeds: Vec<FeedRecord>) -> Self {
        let store = Self::new();
        for feed in feeds {
            store.upsert(feed).await;
        }
        store
    }

    /// Insert or replace a record
    pub async fn upsert(&self, feed: FeedRecord) {
        self.feeds.write().await.insert(feed.id.clone(), feed);
    }

    /// Fetch a record by id
    pub async fn get(&self, feed_id: &str) -> Option<FeedRecord> {
        self.feeds.read().await.get(feed_id).cloned()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.feeds.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.feeds.read().await.is_empty()
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn find_matching(
        &self,
        condition: &FeedCondition,
    ) -> Result<Vec<FeedRecord>, StorageError> {
        let feeds = self.feeds.read().await;
        let mut matched: Vec<FeedRecord> = feeds
            .values()
            .filter(|f| condition.matches(f))
            .cloned()
            .collect();
        // Deterministic order for tests and logs
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    async fn distinct_refresh_rates(&self) -> Result<Vec<u64>, StorageError> {
        let feeds = self.feeds.read().await;
        let rates: BTreeSet<u64> = feeds.values().map(|f| f.refresh_rate_seconds).collect();
        Ok(rates.into_iter().collect())
    }

    async fn find_missing_slot_offset(
        &self,
        limit: usize,
    ) -> Result<Vec<FeedRecord>, StorageError> {
        let feeds = self.feeds.read().await;
        let mut missing: Vec<FeedRecord> = feeds
            .values()
            .filter(|f| f.slot_offset_ms.is_none())
            .cloned()
            .collect();
        missing.sort_by(|a, b| a.id.cmp(&b.id));
        missing.truncate(limit);
        Ok(missing)
    }

    async fn set_slot_offsets(&self, updates: &[(String, u64)]) -> Result<(), StorageError> {
        let mut feeds = self.feeds.write().await;
        for (feed_id, offset) in updates {
            if let Some(feed) = feeds.get_mut(feed_id) {
                feed.slot_offset_ms = Some(*offset);
            }
        }
        Ok(())
    }

    async fn apply_refresh_rate(
        &self,
        feed_id: &str,
        refresh_rate_seconds: u64,
        slot_offset_ms: u64,
    ) -> Result<(), StorageError> {
        let mut feeds = self.feeds.write().await;
        if let Some(feed) = feeds.get_mut(feed_id) {
            feed.refresh_rate_seconds = refresh_rate_seconds;
            feed.slot_offset_ms = Some(slot_offset_ms);
        }
        Ok(())
    }

    async fn set_response_hash(&self, feed_id: &str, hash: &str) -> Result<(), StorageError> {
        let mut feeds = self.feeds.write().await;
        if let Some(feed) = feeds.get_mut(feed_id) {
            feed.last_response_hash = Some(hash.to_string());
        }
        Ok(())
    }
}

/// In-memory seen-article store
#[derive(Default)]
pub struct MemorySeenStore {
    // Keyed by feed id, then id type
    seen: RwLock<HashMap<String, HashMap<String, HashSet<String>>>>,
}

impl MemorySeenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeenArticleStore for MemorySeenStore {
    async fn has_any(&self, feed_id: &str) -> Result<bool, StorageError> {
        let seen = self.seen.read().await;
        Ok(seen
            .get(feed_id)
            .map(|by_type| by_type.values().any(|ids| !ids.is_empty()))
            .unwrap_or(false))
    }

    async fn filter_new(
        &self,
        feed_id: &str,
        id_type: &str,
        ids: &[String],
    ) -> Result<Vec<String>, StorageError> {
        let seen = self.seen.read().await;
        let recorded = seen.get(feed_id).and_then(|by_type| by_type.get(id_type));
        Ok(ids
            .iter()
            .filter(|id| recorded.map(|set| !set.contains(*id)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn record_seen(
        &self,
        feed_id: &str,
        id_type: &str,
        ids: &[String],
    ) -> Result<(), StorageError> {
        let mut seen = self.seen.write().await;
        let set = seen
            .entry(feed_id.to_string())
            .or_default()
            .entry(id_type.to_string())
            .or_default();
        for id in ids {
            set.insert(id.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryDestination;

    fn feed(id: &str, rate: u64, offset: Option<u64>) -> FeedRecord {
        let mut feed = FeedRecord::new(id, format!("https://example.com/{id}"), "owner");
        feed.refresh_rate_seconds = rate;
        feed.slot_offset_ms = offset;
        feed.destinations
            .push(DeliveryDestination::new("d1", "main", "https://hooks.example.com/x"));
        feed
    }

    #[tokio::test]
    async fn test_condition_composition() {
        let store = MemoryFeedStore::with_feeds(vec![
            feed("a", 600, Some(1_000)),
            feed("b", 600, Some(500_000)),
            feed("c", 600, None),
            feed("d", 120, Some(1_000)),
        ])
        .await;

        let condition = FeedCondition::AllOf(vec![
            FeedCondition::RefreshRateSecondsEq(600),
            FeedCondition::NotDisabled,
            FeedCondition::HasActiveDestination,
            FeedCondition::AnyOf(vec![
                FeedCondition::SlotOffsetMissing,
                FeedCondition::SlotOffsetInRange {
                    start_ms: 0,
                    end_ms: 60_000,
                },
            ]),
        ]);

        let matched = store.find_matching(&condition).await.unwrap();
        let ids: Vec<&str> = matched.iter().map(|f| f.id.as_str()).collect();
        // a (offset in range), c (legacy, no offset); b out of range, d wrong rate
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_disabled_and_destination_predicates() {
        let mut disabled = feed("a", 600, Some(1));
        disabled.disabled_code = Some(crate::models::FeedDisabledCode::Manual);

        let mut no_dest = feed("b", 600, Some(1));
        no_dest.destinations.clear();

        let store =
            MemoryFeedStore::with_feeds(vec![disabled, no_dest, feed("c", 600, Some(1))]).await;

        let condition = FeedCondition::AllOf(vec![
            FeedCondition::NotDisabled,
            FeedCondition::HasActiveDestination,
        ]);
        let matched = store.find_matching(&condition).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "c");
    }

    #[tokio::test]
    async fn test_distinct_refresh_rates_sorted() {
        let store = MemoryFeedStore::with_feeds(vec![
            feed("a", 600, None),
            feed("b", 120, None),
            feed("c", 600, None),
        ])
        .await;

        assert_eq!(
            store.distinct_refresh_rates().await.unwrap(),
            vec![120, 600]
        );
    }

    #[tokio::test]
    async fn test_backfill_queries() {
        let store = MemoryFeedStore::with_feeds(vec![
            feed("a", 600, None),
            feed("b", 600, Some(5)),
            feed("c", 600, None),
        ])
        .await;

        let missing = store.find_missing_slot_offset(10).await.unwrap();
        assert_eq!(missing.len(), 2);

        let limited = store.find_missing_slot_offset(1).await.unwrap();
        assert_eq!(limited.len(), 1);

        store
            .set_slot_offsets(&[("a".to_string(), 42), ("c".to_string(), 99)])
            .await
            .unwrap();
        assert!(store.find_missing_slot_offset(10).await.unwrap().is_empty());
        assert_eq!(store.get("a").await.unwrap().slot_offset_ms, Some(42));
    }

    #[tokio::test]
    async fn test_seen_store_filter_and_record() {
        let store = MemorySeenStore::new();
        assert!(!store.has_any("f1").await.unwrap());

        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        assert_eq!(store.filter_new("f1", "guid", &ids).await.unwrap(), ids);

        store.record_seen("f1", "guid", &ids[..2]).await.unwrap();
        assert!(store.has_any("f1").await.unwrap());
        assert_eq!(
            store.filter_new("f1", "guid", &ids).await.unwrap(),
            vec!["3".to_string()]
        );

        // A different id type has its own namespace
        assert_eq!(store.filter_new("f1", "title", &ids).await.unwrap(), ids);
    }
}
