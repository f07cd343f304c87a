//! Effective refresh-rate resolution
//!
//! The effective interval for a feed comes from three layers:
//!
//! 1. the subscriber tier of the owning account (vip rate for elevated
//!    accounts, default rate otherwise; a failed benefits lookup falls
//!    open to the default rate and never blocks scheduling),
//! 2. an optional per-feed user override,
//! 3. administrator-defined [`RefreshSchedule`] overrides matched by feed
//!    id or URL keyword; these win over everything, including forcing a
//!    slower rate than the tier default.
//!
//! Several matching schedules resolve by first match in declaration order.
//! There is deliberately no specificity ranking; reordering the schedule
//! list is the only way to change precedence.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::models::{FeedRecord, RefreshSchedule, SubscriberBenefits};

/// Tier/benefits lookup contract. Implementations must report failure
/// rather than panic into the scheduler.
#[async_trait]
pub trait BenefitsProvider: Send + Sync {
    /// Benefits for the owning account
    async fn benefits_for(&self, owner_id: &str) -> anyhow::Result<SubscriberBenefits>;
}

/// Benefits provider backed by a fixed owner map; absent owners resolve to
/// default benefits. Used in single-node mode and tests.
#[derive(Debug, Default)]
pub struct StaticBenefitsProvider {
    owners: HashMap<String, SubscriberBenefits>,
}

impl StaticBenefitsProvider {
    /// Create an empty provider (every owner gets default benefits)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style vip registration
    pub fn with_vip(mut self, owner_id: impl Into<String>) -> Self {
        self.owners
            .insert(owner_id.into(), SubscriberBenefits { is_vip: true });
        self
    }
}

#[async_trait]
impl BenefitsProvider for StaticBenefitsProvider {
    async fn benefits_for(&self, owner_id: &str) -> anyhow::Result<SubscriberBenefits> {
        Ok(self.owners.get(owner_id).copied().unwrap_or_default())
    }
}

/// Tier-derived refresh intervals
#[derive(Debug, Clone, Copy)]
pub struct TierRates {
    /// Default interval in seconds
    pub default_seconds: u64,

    /// Interval for elevated (paid) accounts
    pub vip_seconds: u64,
}

impl Default for TierRates {
    fn default() -> Self {
        Self {
            default_seconds: 600,
            vip_seconds: 120,
        }
    }
}

/// Resolves the effective refresh interval for a feed
pub struct RefreshRateResolver {
    rates: TierRates,
    schedules: Vec<RefreshSchedule>,
}

impl RefreshRateResolver {
    /// Create a resolver with administrator schedules in precedence order
    pub fn new(rates: TierRates, schedules: Vec<RefreshSchedule>) -> Self {
        Self { rates, schedules }
    }

    /// Resolve the effective interval in seconds for a feed
    pub async fn resolve(&self, feed: &FeedRecord, benefits: &dyn BenefitsProvider) -> u64 {
        // Administrator overrides beat every other source, in both
        // directions (slower included)
        if let Some(schedule) = self
            .schedules
            .iter()
            .find(|s| s.matches(&feed.id, &feed.url))
        {
            tracing::debug!(
                feed_id = %feed.id,
                schedule = %schedule.name,
                rate_minutes = schedule.refresh_rate_minutes,
                "Feed matched an administrator refresh schedule"
            );
            return schedule.refresh_rate_minutes * 60;
        }

        if let Some(user_rate) = feed.user_refresh_rate_seconds {
            return user_rate;
        }

        match benefits.benefits_for(&feed.owner_id).await {
            Ok(benefits) if benefits.is_vip => self.rates.vip_seconds,
            Ok(_) => self.rates.default_seconds,
            Err(e) => {
                tracing::warn!(
                    feed_id = %feed.id,
                    owner_id = %feed.owner_id,
                    error = %e,
                    "Benefits lookup failed, falling back to the default refresh rate"
                );
                self.rates.default_seconds
            }
        }
    }

    /// Tier rates in effect
    pub fn rates(&self) -> TierRates {
        self.rates
    }

    /// Administrator schedules in precedence order
    pub fn schedules(&self) -> &[RefreshSchedule] {
        &self.schedules
    }
}
