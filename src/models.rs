// Core data structures for the mulgyeol scheduling core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::filters::FilterExpression;

/// A single fetched feed item, flattened to string fields.
///
/// Upstream sources disagree wildly about which fields they populate, so an
/// article is a flat map of field name to value. Absent fields read as the
/// empty string wherever a comparison needs a value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Flattened field values keyed by placeholder name (guid, title, ...)
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
}

impl Article {
    /// Create an empty article
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Get a field value if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Get a field value, treating absent fields as empty
    pub fn value_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// Whether the field exists at all (even if empty)
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over all (field, value) pairs
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Why a feed is excluded from scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedDisabledCode {
    /// Too many consecutive fetch failures
    FailedRequests,
    /// Disabled by the feed owner
    Manual,
    /// Disabled because the owner exceeded their feed limit
    ExceededLimit,
}

impl FeedDisabledCode {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailedRequests => "failed_requests",
            Self::Manual => "manual",
            Self::ExceededLimit => "exceeded_limit",
        }
    }
}

/// A delivery destination attached to a feed
///
/// Destinations carry their own optional filter expression; an article is
/// filtered per destination, not per feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryDestination {
    /// Destination ID
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Endpoint URL the delivery sink posts to
    pub url: String,

    /// Set when the destination is disabled and must not receive articles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_code: Option<String>,

    /// Optional filter expression gating articles for this destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterExpression>,
}

impl DeliveryDestination {
    /// Create an enabled destination with no filters
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            disabled_code: None,
            filters: None,
        }
    }

    /// Builder-style filter setter
    pub fn with_filters(mut self, filters: FilterExpression) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Whether this destination may receive deliveries
    pub fn is_active(&self) -> bool {
        self.disabled_code.is_none()
    }
}

/// A scheduled feed as persisted in the document store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRecord {
    /// Feed ID
    pub id: String,

    /// Display title
    pub title: String,

    /// Feed URL
    pub url: String,

    /// Owning account ID (used for the tier-benefits lookup)
    pub owner_id: String,

    /// Set when the feed is excluded from scheduling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_code: Option<FeedDisabledCode>,

    /// Effective refresh interval in seconds (tier-derived or overridden)
    pub refresh_rate_seconds: u64,

    /// Per-feed user override, if the owner chose a custom interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_refresh_rate_seconds: Option<u64>,

    /// Stable position inside the refresh interval; absent on legacy
    /// records until backfilled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_offset_ms: Option<u64>,

    /// Content hash of the last processed fetch response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response_hash: Option<String>,

    /// Delivery destinations
    #[serde(default)]
    pub destinations: Vec<DeliveryDestination>,

    /// When the record was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl FeedRecord {
    /// Create a minimal enabled feed
    pub fn new(id: impl Into<String>, url: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            title: url.clone(),
            url,
            owner_id: owner_id.into(),
            disabled_code: None,
            refresh_rate_seconds: 600,
            user_refresh_rate_seconds: None,
            slot_offset_ms: None,
            last_response_hash: None,
            destinations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether the feed participates in scheduling at all
    pub fn is_enabled(&self) -> bool {
        self.disabled_code.is_none()
    }

    /// Whether at least one destination can receive deliveries
    pub fn has_active_destination(&self) -> bool {
        self.destinations.iter().any(DeliveryDestination::is_active)
    }

    /// Active destinations in declaration order
    pub fn active_destinations(&self) -> impl Iterator<Item = &DeliveryDestination> {
        self.destinations.iter().filter(|d| d.is_active())
    }
}

/// Administrator-defined refresh override
///
/// A schedule matches a feed when the feed's id is listed in `feed_ids` or
/// its URL contains any of `keywords` as a case-sensitive substring. With
/// several matching schedules, the first one in declaration order wins;
/// there is no specificity ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSchedule {
    /// Schedule name (for logs)
    pub name: String,

    /// Case-sensitive substrings matched against the feed URL
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Explicit feed IDs this schedule applies to
    #[serde(default)]
    pub feed_ids: Vec<String>,

    /// Refresh interval this schedule enforces
    pub refresh_rate_minutes: u64,
}

impl RefreshSchedule {
    /// Whether this schedule applies to the given feed
    pub fn matches(&self, feed_id: &str, feed_url: &str) -> bool {
        if self.feed_ids.iter().any(|id| id == feed_id) {
            return true;
        }
        self.keywords.iter().any(|word| feed_url.contains(word))
    }
}

/// Subscriber-tier benefits for a feed owner
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SubscriberBenefits {
    /// Elevated (paid) tier
    pub is_vip: bool,
}

/// Outcome counters for one scheduler tick
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickStats {
    /// Feeds selected as due this tick
    pub feeds_due: u32,
    /// Feeds skipped because another worker holds their lock
    pub feeds_locked: u32,
    /// Feeds skipped because the response body was unchanged
    pub feeds_unchanged: u32,
    /// Feeds whose pipeline returned an error
    pub feeds_failed: u32,
    /// Articles handed to the delivery sink
    pub articles_delivered: u32,
    /// Articles withheld by destination filters
    pub articles_blocked: u32,
}

impl TickStats {
    /// Merge per-feed results into the tick totals
    pub fn absorb(&mut self, other: TickStats) {
        self.feeds_due += other.feeds_due;
        self.feeds_locked += other.feeds_locked;
        self.feeds_unchanged += other.feeds_unchanged;
        self.feeds_failed += other.feeds_failed;
        self.articles_delivered += other.articles_delivered;
        self.articles_blocked += other.articles_blocked;
    }
}
