//! Processing locks for mutual exclusion across workers
//!
//! Every feed is processed by at most one worker at a time. The guard is a
//! `processing-{feedId}` entry in a shared key-value store, created with a
//! single atomic set-if-absent carrying a fixed TTL. The TTL guarantees
//! progress when a worker crashes mid-processing: there is no fatal missing
//! release path, the entry just expires.
//!
//! Failure semantics are asymmetric. An unreachable store makes `acquire`
//! return `false` (treat as already locked rather than risk processing the
//! same feed twice); `release` errors are logged and swallowed since the
//! entry self-expires.

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::RedisError;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Key prefix for processing lock entries
const LOCK_KEY_PREFIX: &str = "processing-";

/// Default lock TTL
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Errors from the backing key-value store
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Pool creation failed: {0}")]
    PoolCreation(String),
}

/// Key-value store contract consumed by the processing lock: atomic
/// set-if-absent-with-expiry plus delete.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically create `key` with `value` and `ttl` only if absent.
    /// Returns whether this call created the entry.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, LockError>;

    /// Delete `key`. Idempotent; deleting an absent or expired key is fine.
    async fn delete(&self, key: &str) -> Result<(), LockError>;
}

/// Redis-backed lock store using `SET NX EX`
pub struct RedisLockStore {
    pool: Pool,
}

impl RedisLockStore {
    /// Create a store from a Redis URL
    pub fn new(url: &str, pool_size: usize) -> Result<Self, LockError> {
        let pool = PoolConfig::from_url(url)
            .builder()
            .map_err(|e| LockError::PoolCreation(e.to_string()))?
            .max_size(pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| LockError::PoolCreation(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut conn = self.pool.get().await?;

        // SET NX EX is the single atomic primitive; a separate
        // check-then-set would race between workers.
        let created: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut *conn)
            .await?;

        Ok(created.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), LockError> {
        let mut conn = self.pool.get().await?;
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }
}

/// In-memory lock store for single-node and test mode
#[derive(Default)]
pub struct MemoryLockStore {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryLockStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let now = Instant::now();
        // The entry API holds the shard lock, making check-and-set atomic
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().1 <= now {
                    occupied.insert((value.to_string(), now + ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert((value.to_string(), now + ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), LockError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Mutual-exclusion guard over feed processing
#[derive(Clone)]
pub struct ProcessingLock {
    store: std::sync::Arc<dyn LockStore>,
    ttl: Duration,
}

impl ProcessingLock {
    /// Create a lock with the default 5-minute TTL
    pub fn new(store: std::sync::Arc<dyn LockStore>) -> Self {
        Self::with_ttl(store, DEFAULT_LOCK_TTL)
    }

    /// Create a lock with a custom TTL
    pub fn with_ttl(store: std::sync::Arc<dyn LockStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Try to acquire the lock for a feed. Non-blocking; returns whether
    /// this call took ownership. Store failures read as "already locked".
    pub async fn acquire(&self, feed_id: &str) -> bool {
        let key = lock_key(feed_id);
        let sentinel = Uuid::new_v4().to_string();

        match self.store.set_if_absent(&key, &sentinel, self.ttl).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(feed_id = %feed_id, error = %e, "Lock store unreachable, treating feed as locked");
                false
            }
        }
    }

    /// Release the lock for a feed. Idempotent; failures are logged and
    /// swallowed because the entry self-expires.
    pub async fn release(&self, feed_id: &str) {
        let key = lock_key(feed_id);
        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(feed_id = %feed_id, error = %e, "Failed to release processing lock");
        }
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn lock_key(feed_id: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{feed_id}")
}

/// Lock store that always fails, for exercising fail-closed behavior
#[cfg(test)]
pub(crate) struct UnreachableLockStore;

#[cfg(test)]
#[async_trait]
impl LockStore for UnreachableLockStore {
    async fn set_if_absent(&self, _: &str, _: &str, _: Duration) -> Result<bool, LockError> {
        Err(LockError::PoolCreation("store down".to_string()))
    }

    async fn delete(&self, _: &str) -> Result<(), LockError> {
        Err(LockError::PoolCreation("store down".to_string()))
    }
}
