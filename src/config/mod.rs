//! Configuration management
//!
//! This module handles loading and validating configuration from
//! environment variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::RefreshSchedule;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Refresh rate configuration
    #[serde(default)]
    pub rates: RatesConfig,

    /// Redis lock store configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Feed fetching configuration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Delivery configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick period in seconds; also the slot window width
    pub tick_seconds: u64,

    /// Maximum feeds processed concurrently per tick
    pub max_concurrency: usize,

    /// Processing lock TTL in seconds
    pub lock_ttl_seconds: u64,

    /// Wall-clock budget for one filter regex evaluation, in seconds
    pub regex_timeout_seconds: u64,

    /// Backfill batch size
    pub backfill_batch_size: usize,

    /// Path to a TOML feeds file seeding the in-memory store
    /// (single-node mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeds_file: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 60,
            max_concurrency: 16,
            lock_ttl_seconds: 300,
            regex_timeout_seconds: 5,
            backfill_batch_size: 500,
            feeds_file: None,
        }
    }
}

/// Refresh rate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// Default refresh interval in minutes
    pub default_refresh_minutes: u64,

    /// Refresh interval for elevated (paid) accounts, in minutes
    pub vip_refresh_minutes: u64,

    /// Administrator override schedules, in precedence order
    #[serde(default)]
    pub schedules: Vec<RefreshSchedule>,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            default_refresh_minutes: 10,
            vip_refresh_minutes: 2,
            schedules: Vec::new(),
        }
    }
}

/// Redis lock store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL; absent means the in-memory lock store is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Connection pool size
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

/// Feed fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum fetch requests per second
    pub requests_per_second: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum retry attempts per fetch
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5,
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Webhook request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum webhook retry attempts
    pub max_retries: u32,

    /// Optional bearer token sent with every delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 3,
            auth_token: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<u64>("MULGYEOL_TICK_SECONDS") {
            config.scheduler.tick_seconds = v;
        }
        if let Some(v) = env_parse::<usize>("MULGYEOL_MAX_CONCURRENCY") {
            config.scheduler.max_concurrency = v;
        }
        if let Some(v) = env_parse::<u64>("MULGYEOL_LOCK_TTL_SECONDS") {
            config.scheduler.lock_ttl_seconds = v;
        }
        if let Some(v) = env_parse::<u64>("MULGYEOL_REGEX_TIMEOUT_SECONDS") {
            config.scheduler.regex_timeout_seconds = v;
        }
        if let Ok(path) = std::env::var("MULGYEOL_FEEDS_FILE") {
            config.scheduler.feeds_file = Some(path.into());
        }

        if let Some(v) = env_parse::<u64>("MULGYEOL_DEFAULT_REFRESH_MINUTES") {
            config.rates.default_refresh_minutes = v;
        }
        if let Some(v) = env_parse::<u64>("MULGYEOL_VIP_REFRESH_MINUTES") {
            config.rates.vip_refresh_minutes = v;
        }

        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis.url = Some(url);
        }
        if let Some(v) = env_parse::<usize>("REDIS_POOL_SIZE") {
            config.redis.pool_size = v;
        }

        if let Some(v) = env_parse::<u32>("MULGYEOL_FETCH_RPS") {
            config.fetch.requests_per_second = v;
        }
        if let Some(v) = env_parse::<u64>("MULGYEOL_FETCH_TIMEOUT") {
            config.fetch.request_timeout_secs = v;
        }

        if let Ok(level) = std::env::var("MULGYEOL_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("MULGYEOL_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_seconds == 0 {
            anyhow::bail!("tick_seconds must be greater than 0");
        }

        if self.scheduler.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be greater than 0");
        }

        if self.scheduler.lock_ttl_seconds == 0 {
            anyhow::bail!("lock_ttl_seconds must be greater than 0");
        }

        if self.rates.default_refresh_minutes == 0 || self.rates.vip_refresh_minutes == 0 {
            anyhow::bail!("refresh minutes must be greater than 0");
        }

        for schedule in &self.rates.schedules {
            if schedule.refresh_rate_minutes == 0 {
                anyhow::bail!("schedule '{}' has a zero refresh rate", schedule.name);
            }
            if schedule.keywords.is_empty() && schedule.feed_ids.is_empty() {
                anyhow::bail!(
                    "schedule '{}' matches nothing (no keywords or feed ids)",
                    schedule.name
                );
            }
        }

        if let Some(url) = &self.redis.url {
            url::Url::parse(url).with_context(|| format!("Invalid Redis URL: {url}"))?;
        }

        if self.fetch.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        Ok(())
    }

    /// Get tick period as Duration
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_seconds)
    }

    /// Get lock TTL as Duration
    #[must_use]
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.scheduler.lock_ttl_seconds)
    }

    /// Get regex budget as Duration
    #[must_use]
    pub fn regex_timeout(&self) -> Duration {
        Duration::from_secs(self.scheduler.regex_timeout_seconds)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
