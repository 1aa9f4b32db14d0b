//! Per-client fixed-window request counter.
//!
//! The read-modify-write against the store is not atomic: concurrent
//! requests from one client in one window can read the same count and
//! undercount by the number of racers. A fixed window also admits a burst of
//! up to `2 * max_requests` across a window boundary. Both are accepted for a
//! throttle.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use store::{KvStore, MemoryKvStore, StoreError};

/// Extra lifetime given to stored records beyond the window so stale records
/// still expire on their own.
pub const EXPIRY_SLACK: Duration = Duration::from_secs(60);

/// Throttle parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitPolicy {
    /// 100 requests per 15 minutes.
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_requests: 100,
        }
    }
}

/// Stored counter for one client.
///
/// `count` is only meaningful within `[window_reset_at - window, window_reset_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub count: u32,
    /// Window end (epoch milliseconds).
    #[serde(rename = "resetTime")]
    pub window_reset_at: i64,
}

/// Fixed-window limiter over a shared [`KvStore`].
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Store key for a client.
    pub fn store_key(client_id: &str) -> String {
        format!("rate_limit:{client_id}")
    }

    /// Count one request from `client_id` and decide whether to admit it.
    pub async fn allow(&self, client_id: &str) -> Result<bool, StoreError> {
        self.allow_at(client_id, Utc::now().timestamp_millis()).await
    }

    /// Same as [`allow`](Self::allow) with an explicit clock (epoch ms).
    pub async fn allow_at(&self, client_id: &str, now_ms: i64) -> Result<bool, StoreError> {
        let key = Self::store_key(client_id);

        let current = match self.store.get(&key).await? {
            Some(raw) => match serde_json::from_str::<RateLimitRecord>(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(client_id, error = %e, "discarding unreadable rate limit record");
                    None
                }
            },
            None => None,
        };

        match current {
            Some(record) if now_ms <= record.window_reset_at => {
                if record.count >= self.policy.max_requests {
                    debug!(client_id, count = record.count, "rate limit exceeded");
                    return Ok(false);
                }
                let updated = RateLimitRecord {
                    count: record.count + 1,
                    ..record
                };
                let remaining = u64::try_from(record.window_reset_at - now_ms).unwrap_or(0);
                self.write(&key, &updated, Duration::from_millis(remaining))
                    .await?;
                Ok(true)
            }
            _ => {
                let window_ms = i64::try_from(self.policy.window.as_millis()).unwrap_or(i64::MAX);
                let fresh = RateLimitRecord {
                    count: 1,
                    window_reset_at: now_ms.saturating_add(window_ms),
                };
                self.write(&key, &fresh, self.policy.window).await?;
                Ok(true)
            }
        }
    }

    async fn write(
        &self,
        key: &str,
        record: &RateLimitRecord,
        remaining: Duration,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_string(record).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.store
            .put(key, value, remaining.saturating_add(EXPIRY_SLACK))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn limiter(max_requests: u32) -> (RateLimiter, Arc<MemoryKvStore>) {
        let store = Arc::new(MemoryKvStore::new());
        let policy = RateLimitPolicy {
            window: Duration::from_secs(900),
            max_requests,
        };
        (RateLimiter::new(store.clone(), policy), store)
    }

    async fn record(store: &MemoryKvStore, client: &str) -> RateLimitRecord {
        let raw = store
            .get(&RateLimiter::store_key(client))
            .await
            .unwrap()
            .expect("record present");
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn hundredth_allowed_hundred_first_denied() {
        let (limiter, _) = limiter(100);
        for i in 1..=100 {
            assert!(limiter.allow_at("c1", T0 + i).await.unwrap(), "call {i}");
        }
        assert!(!limiter.allow_at("c1", T0 + 101).await.unwrap());
    }

    #[tokio::test]
    async fn window_rollover_resets_counter() {
        let (limiter, store) = limiter(2);
        assert!(limiter.allow_at("c1", T0).await.unwrap());
        assert!(limiter.allow_at("c1", T0 + 1).await.unwrap());
        assert!(!limiter.allow_at("c1", T0 + 2).await.unwrap());

        let after = T0 + 900_000 + 1;
        assert!(limiter.allow_at("c1", after).await.unwrap());
        let rec = record(&store, "c1").await;
        assert_eq!(rec.count, 1);
        assert_eq!(rec.window_reset_at, after + 900_000);
    }

    #[tokio::test]
    async fn window_end_is_still_inside_window() {
        let (limiter, _) = limiter(1);
        assert!(limiter.allow_at("c1", T0).await.unwrap());
        assert!(!limiter.allow_at("c1", T0 + 900_000).await.unwrap());
    }

    #[tokio::test]
    async fn denial_does_not_mutate_record() {
        let (limiter, store) = limiter(1);
        assert!(limiter.allow_at("c1", T0).await.unwrap());
        let before = record(&store, "c1").await;
        assert!(!limiter.allow_at("c1", T0 + 5).await.unwrap());
        assert_eq!(record(&store, "c1").await, before);
    }

    #[tokio::test]
    async fn clients_are_counted_independently() {
        let (limiter, _) = limiter(1);
        assert!(limiter.allow_at("c1", T0).await.unwrap());
        assert!(limiter.allow_at("c2", T0).await.unwrap());
        assert!(!limiter.allow_at("c1", T0 + 1).await.unwrap());
    }

    #[tokio::test]
    async fn increment_keeps_window_end() {
        let (limiter, store) = limiter(10);
        limiter.allow_at("c1", T0).await.unwrap();
        limiter.allow_at("c1", T0 + 500).await.unwrap();
        let rec = record(&store, "c1").await;
        assert_eq!(rec.count, 2);
        assert_eq!(rec.window_reset_at, T0 + 900_000);
    }

    #[tokio::test]
    async fn unreadable_record_starts_fresh_window() {
        let (limiter, store) = limiter(5);
        store
            .put(
                &RateLimiter::store_key("c1"),
                "not json".into(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert!(limiter.allow_at("c1", T0).await.unwrap());
        assert_eq!(record(&store, "c1").await.count, 1);
    }

    #[tokio::test]
    async fn huge_window_does_not_overflow() {
        let store = Arc::new(MemoryKvStore::new());
        let policy = RateLimitPolicy {
            window: Duration::MAX,
            max_requests: 1,
        };
        let limiter = RateLimiter::new(store.clone(), policy);
        assert!(limiter.allow_at("c1", T0).await.unwrap());
        assert!(!limiter.allow_at("c1", T0 + 1).await.unwrap());
        assert_eq!(record(&store, "c1").await.window_reset_at, i64::MAX);
    }

    #[test]
    fn record_uses_reset_time_on_the_wire() {
        let json = serde_json::to_value(RateLimitRecord {
            count: 3,
            window_reset_at: 42,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"count": 3, "resetTime": 42}));
    }
}
