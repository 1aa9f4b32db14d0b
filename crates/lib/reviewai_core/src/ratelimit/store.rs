//! Key-value stores backing the rate limiter.
//!
//! Values are opaque strings with a per-write TTL. Reads and writes are
//! independent operations; there is no compare-and-set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Errors from a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store codec error: {0}")]
    Codec(String),
}

/// Shared, TTL-expiring string store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value; expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value that expires after `ttl`.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;
}

struct Entry {
    value: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Process-local store. Shared by every request on one gateway instance.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, Entry>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.is_live(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                store.cleanup();
            }
        })
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now().checked_add(ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisKvStore;

#[cfg(feature = "redis")]
mod redis_store {
    use std::time::Duration;

    use async_trait::async_trait;
    use redis::AsyncCommands;
    use redis::aio::ConnectionManager;

    use super::{KvStore, StoreError};

    /// Redis-backed store shared by every gateway instance pointing at it.
    #[derive(Clone)]
    pub struct RedisKvStore {
        conn: ConnectionManager,
    }

    impl RedisKvStore {
        pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
            let client =
                redis::Client::open(redis_url).map_err(|e| StoreError::Backend(e.to_string()))?;
            let conn = ConnectionManager::new(client)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            Ok(Self { conn })
        }
    }

    #[async_trait]
    impl KvStore for RedisKvStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            let mut conn = self.conn.clone();
            conn.get::<_, Option<String>>(key)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))
        }

        async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
            let mut conn = self.conn.clone();
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))
        }
    }
}
