use crate::{with_timeout, SharedConnectionManager};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("session cache backend error: {0}")]
    Backend(String),

    #[error("session cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Key-value store with per-key TTL holding live token ids.
///
/// Values carry only the owning user id. Absence of a key means the token
/// has been revoked or has expired.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Returns the number of keys removed (0 when the key was already gone).
    async fn delete(&self, key: &str) -> Result<u64, CacheError>;

    /// Remaining lifetime of `key`, `None` when it does not exist.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Add `member` to the set at `key` and reset the set's lifetime to `ttl`.
    async fn add_member(&self, key: &str, member: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Members of the set at `key`; empty when the set does not exist.
    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError>;

    /// Returns the number of members removed.
    async fn remove_member(&self, key: &str, member: &str) -> Result<u64, CacheError>;
}

/// Redis implementation; every command is bounded by `op_timeout`.
#[derive(Clone)]
pub struct RedisSessionCache {
    redis: SharedConnectionManager,
    op_timeout: Duration,
}

impl RedisSessionCache {
    pub fn new(redis: SharedConnectionManager, op_timeout: Duration) -> Self {
        Self { redis, op_timeout }
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        // SET EX rejects 0
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.redis.lock().await.clone();

        with_timeout(self.op_timeout, async {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.lock().await.clone();

        with_timeout(self.op_timeout, async {
            redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        let mut conn = self.redis.lock().await.clone();

        with_timeout(self.op_timeout, async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<_, u64>(&mut conn)
                .await
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.redis.lock().await.clone();

        let secs: i64 = with_timeout(self.op_timeout, async {
            redis::cmd("TTL").arg(key).query_async(&mut conn).await
        })
        .await?;

        // -2: missing key, -1: key without expiry
        Ok(match secs {
            -2 => None,
            -1 => Some(Duration::MAX),
            s => Some(Duration::from_secs(s.max(0) as u64)),
        })
    }

    async fn add_member(&self, key: &str, member: &str, ttl: Duration) -> Result<(), CacheError> {
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.redis.lock().await.clone();

        with_timeout(self.op_timeout, async {
            redis::pipe()
                .atomic()
                .cmd("SADD")
                .arg(key)
                .arg(member)
                .ignore()
                .cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs)
                .ignore()
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.redis.lock().await.clone();

        with_timeout(self.op_timeout, async {
            redis::cmd("SMEMBERS")
                .arg(key)
                .query_async::<_, Vec<String>>(&mut conn)
                .await
        })
        .await
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<u64, CacheError> {
        let mut conn = self.redis.lock().await.clone();

        with_timeout(self.op_timeout, async {
            redis::cmd("SREM")
                .arg(key)
                .arg(member)
                .query_async::<_, u64>(&mut conn)
                .await
        })
        .await
    }
}

/// Process-local cache with lazy expiry, used by tests and single-node development.
#[derive(Default)]
pub struct InMemorySessionCache {
    entries: DashMap<String, (String, Instant)>,
    sets: DashMap<String, (HashSet<String>, Instant)>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys, sets included.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let values = self.entries.iter().filter(|e| e.value().1 > now).count();
        let sets = self.sets.iter().filter(|e| e.value().1 > now).count();
        values + sets
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_entry(&self, key: &str) -> Option<(String, Instant)> {
        let now = Instant::now();
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if entry.1 <= now {
            self.entries.remove(key);
            return None;
        }
        Some(entry)
    }

    fn live_set(&self, key: &str) -> Option<HashSet<String>> {
        let entry = self.sets.get(key).map(|e| e.value().clone())?;
        if entry.1 <= Instant::now() {
            self.sets.remove(key);
            return None;
        }
        Some(entry.0)
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.live_entry(key).map(|(value, _)| value))
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        let removed = self.live_entry(key).is_some() || self.live_set(key).is_some();
        self.entries.remove(key);
        self.sets.remove(key);
        Ok(u64::from(removed))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        Ok(self
            .live_entry(key)
            .map(|(_, expires_at)| expires_at.saturating_duration_since(Instant::now())))
    }

    async fn add_member(&self, key: &str, member: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        let mut members = self.live_set(key).unwrap_or_default();
        members.insert(member.to_string());
        self.sets.insert(key.to_string(), (members, expires_at));
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .live_set(key)
            .map(|members| members.into_iter().collect())
            .unwrap_or_default())
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<u64, CacheError> {
        if self.live_set(key).is_none() {
            return Ok(0);
        }
        let mut removed = false;
        let mut now_empty = false;
        if let Some(mut entry) = self.sets.get_mut(key) {
            removed = entry.0.remove(member);
            now_empty = entry.0.is_empty();
        }
        // Redis drops a set once its last member is gone
        if now_empty {
            self.sets.remove(key);
        }
        Ok(u64::from(removed))
    }
}
