use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

/// Pluggable cache behind the aggregation core.
///
/// Payloads are JSON values so a backing store can be swapped for an external
/// shared cache without touching callers; the in-process [`MemoryCache`] is
/// the single-instance default. A `None` from `get` is never an error, it is
/// the signal to recompute.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Store `value` under `key`. The entry expires `absolute` after the
    /// write, or earlier if `sliding` elapses without a read.
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        absolute: Duration,
        sliding: Option<Duration>,
    );

    async fn invalidate(&self, key: &str);
}

pub async fn get_typed<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let value = store.get(key).await?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            // A payload that no longer decodes is stale by definition.
            warn!(key = %key, error = %err, "dropping undecodable cache entry");
            store.invalidate(key).await;
            None
        }
    }
}

pub async fn set_typed<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    absolute: Duration,
    sliding: Option<Duration>,
) {
    match serde_json::to_value(value) {
        Ok(encoded) => store.set(key, encoded, absolute, sliding).await,
        Err(err) => warn!(key = %key, error = %err, "failed to encode cache entry"),
    }
}

struct CacheEntry {
    value: serde_json::Value,
    stored_at: Instant,
    last_access: Instant,
    absolute: Duration,
    sliding: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        if now.duration_since(self.stored_at) >= self.absolute {
            return true;
        }
        match self.sliding {
            Some(idle) => now.duration_since(self.last_access) >= idle,
            None => false,
        }
    }
}

/// Thread-safe in-process store. Entries are replaced wholesale on `set`;
/// reads touch the sliding window.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.last_access = now;
                return Some(entry.value.clone());
            }
        }
        // Expired entries are removed lazily on the read path.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        absolute: Duration,
        sliding: Option<Duration>,
    ) {
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            CacheEntry { value, stored_at: now, last_access: now, absolute, sliding },
        );
    }

    async fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}
