//! In-memory store with TTL expiry and LRU eviction

use super::CacheStore;
use crate::cache::config::CacheDriver;
use crate::cache::entry::CacheEntry;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Counters kept by the memory store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    /// Evictions due to the entry limit
    pub evictions_size: u64,
    /// Entries dropped because their TTL ran out
    pub evictions_ttl: u64,
}

/// Thread-safe in-memory store
///
/// Expired entries are dropped when read or by `cleanup_expired`. When the
/// entry limit is reached the least recently used key is evicted.
pub struct MemoryStore {
    max_entries: usize,
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Access order, least recent first
    lru_queue: VecDeque<String>,
    stats: StoreStats,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            inner: Arc::new(RwLock::new(Inner {
                entries: HashMap::new(),
                lru_queue: VecDeque::new(),
                stats: StoreStats::default(),
            })),
        }
    }

    /// Remove all expired entries, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        inner.stats.evictions_ttl += expired.len() as u64;

        if !expired.is_empty() {
            debug!(count = expired.len(), "Cleaned up expired entries");
        }
        expired.len()
    }

    /// Remove every entry
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.lru_queue.clear();
        inner.stats.entries = 0;
    }

    /// Remaining lifetime of a key, if it exists and expires
    pub async fn ttl_of(&self, key: &str) -> Option<Duration> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(key)
            .and_then(|entry| entry.time_until_expiration())
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    pub async fn stats(&self) -> StoreStats {
        self.inner.read().await.stats.clone()
    }
}

impl Inner {
    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.lru_queue.retain(|k| k != key);
            self.stats.entries = self.entries.len();
            true
        } else {
            false
        }
    }

    fn touch(&mut self, key: &str) {
        self.lru_queue.retain(|k| k != key);
        self.lru_queue.push_back(key.to_string());
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut inner = self.inner.write().await;

        let expired = match inner.entries.get(key).map(CacheEntry::is_expired) {
            Some(expired) => expired,
            None => {
                inner.stats.misses += 1;
                return Ok(None);
            }
        };

        if expired {
            debug!(key, "Entry expired");
            inner.remove(key);
            inner.stats.misses += 1;
            inner.stats.evictions_ttl += 1;
            return Ok(None);
        }

        let value = match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.mark_accessed();
                entry.value.clone()
            }
            None => return Ok(None),
        };
        inner.touch(key);
        inner.stats.hits += 1;

        Ok(Some(value))
    }

    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = CacheEntry::new(key, value, ttl);

        if !inner.entries.contains_key(key) {
            while inner.entries.len() >= self.max_entries {
                let Some(oldest) = inner.lru_queue.pop_front() else {
                    break;
                };
                debug!(key = %oldest, "Evicting entry due to max_entries limit");
                inner.remove(&oldest);
                inner.stats.evictions_size += 1;
            }
        }

        inner.entries.insert(key.to_string(), entry);
        inner.touch(key);
        inner.stats.entries = inner.entries.len();

        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.remove(key))
    }

    fn driver(&self) -> CacheDriver {
        CacheDriver::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_basic_put_and_get() {
        let store = MemoryStore::new(100);

        store
            .put("key1", json!({"v": 1}), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let value = store.get("key1").await.unwrap();
        assert_eq!(value, Some(json!({"v": 1})));

        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_miss() {
        let store = MemoryStore::new(100);
        assert_eq!(store.get("nonexistent").await.unwrap(), None);
        assert_eq!(store.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = MemoryStore::new(100);

        store
            .put("key1", json!("v"), Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(store.get("key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(store.get("key1").await.unwrap().is_none());
        assert_eq!(store.stats().await.evictions_ttl, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_no_ttl_keeps_entry() {
        let store = MemoryStore::new(100);
        store.put("stale:profile:a", json!(1), None).await.unwrap();
        assert!(store.ttl_of("stale:profile:a").await.is_none());
        assert!(store.contains_key("stale:profile:a").await);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let store = MemoryStore::new(3);
        let ttl = Some(Duration::from_secs(60));

        store.put("key1", json!(1), ttl).await.unwrap();
        store.put("key2", json!(2), ttl).await.unwrap();
        store.put("key3", json!(3), ttl).await.unwrap();

        // key1 becomes most recently used, so key2 is evicted next
        store.get("key1").await.unwrap();
        store.put("key4", json!(4), ttl).await.unwrap();

        assert!(store.get("key2").await.unwrap().is_none());
        assert!(store.get("key1").await.unwrap().is_some());
        assert!(store.get("key3").await.unwrap().is_some());
        assert!(store.get("key4").await.unwrap().is_some());
        assert_eq!(store.stats().await.evictions_size, 1);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let store = MemoryStore::new(2);
        store.put("a", json!(1), None).await.unwrap();
        store.put("b", json!(2), None).await.unwrap();
        store.put("a", json!(3), None).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("a").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_forget() {
        let store = MemoryStore::new(10);
        store.put("key1", json!(1), None).await.unwrap();

        assert!(store.forget("key1").await.unwrap());
        assert!(!store.forget("key1").await.unwrap());
        assert!(store.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_and_clear() {
        let store = MemoryStore::new(10);
        store
            .put("short", json!(1), Some(Duration::from_millis(50)))
            .await
            .unwrap();
        store.put("long", json!(2), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);

        store.clear().await;
        assert!(store.is_empty().await);
    }
}
