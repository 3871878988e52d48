//! TTL-based key→value cache shared by the client layers.
//!
//! Expiry is computed from the insertion timestamp on read; stale entries
//! are dropped lazily when a lookup finds them, never by a sweeper.

use chrono::Utc;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

struct CacheEntry<V> {
    payload: V,
    inserted_at_ms: i64,
}

#[derive(Clone)]
pub struct TimedCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    ttl_ms: i64,
    inner: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as i64,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Utc::now().timestamp_millis()).await
    }

    /// Lookup against an explicit clock. Expired entries are removed here.
    pub(crate) async fn get_at(&self, key: &K, now_ms: i64) -> Option<V> {
        let mut cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if now_ms - entry.inserted_at_ms <= self.ttl_ms => {
                debug!("Cache HIT");
                Some(entry.payload.clone())
            }
            Some(_) => {
                debug!("Cache entry expired");
                cache.remove(key);
                None
            }
            None => {
                debug!("Cache MISS");
                None
            }
        }
    }

    pub async fn put(&self, key: K, value: V) {
        self.put_at(key, value, Utc::now().timestamp_millis()).await
    }

    pub(crate) async fn put_at(&self, key: K, value: V, now_ms: i64) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT");
        cache.insert(
            key,
            CacheEntry {
                payload: value,
                inserted_at_ms: now_ms,
            },
        );
    }
}
