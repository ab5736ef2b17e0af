//! Cache entry management with TTL support

use crate::cache::types::Payload;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Field holding the time a payload was fetched from upstream
pub const CACHED_AT_FIELD: &str = "cached_at";

/// Field telling the caller whether a payload came from a shadow key
pub const IS_STALE_FIELD: &str = "is_stale";

/// A stored value with its expiry, as kept by the stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cache key
    pub key: String,

    /// The cached value
    pub value: Value,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Create a new entry; `ttl` of `None` never expires
    pub fn new(key: impl Into<String>, value: Value, ttl: Option<Duration>) -> Self {
        let now = Utc::now();
        // A TTL too large for chrono is treated as no expiry
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));

        Self {
            key: key.into(),
            value,
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                expires_at,
                access_count: 0,
            },
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.metadata
            .expires_at
            .map(|expires_at| Utc::now() >= expires_at)
            .unwrap_or(false)
    }

    /// Get time until expiration; `None` if expired or never expiring
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let expires_at = self.metadata.expires_at?;
        (expires_at - Utc::now()).to_std().ok()
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last access time (for LRU tracking)
    pub accessed_at: DateTime<Utc>,

    /// When the entry expires; `None` means never
    pub expires_at: Option<DateTime<Utc>>,

    /// Number of times this entry has been read
    pub access_count: u64,
}

/// Current time in the ISO-8601 form written to `cached_at`
pub fn iso8601_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Stamp a freshly fetched payload with `cached_at` and `is_stale = false`
pub fn stamp_fresh(mut payload: Payload) -> Payload {
    payload.insert(CACHED_AT_FIELD.to_string(), Value::String(iso8601_now()));
    payload.insert(IS_STALE_FIELD.to_string(), Value::Bool(false));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    #[test]
    fn test_cache_entry_creation() {
        let entry = CacheEntry::new("test_key", json!({"a": 1}), Some(Duration::from_secs(3600)));

        assert_eq!(entry.key, "test_key");
        assert_eq!(entry.value["a"], 1);
        assert!(!entry.is_expired());
        assert!(entry.time_until_expiration().unwrap() <= Duration::from_secs(3600));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new("test", json!(1), Some(Duration::from_millis(100)));

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(150));
        assert!(entry.is_expired());
        assert!(entry.time_until_expiration().is_none());
    }

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = CacheEntry::new("forever", json!(true), None);
        assert!(!entry.is_expired());
        assert!(entry.metadata.expires_at.is_none());
        assert!(entry.time_until_expiration().is_none());
    }

    #[test]
    fn test_mark_accessed() {
        let mut entry = CacheEntry::new("test", json!(1), None);
        let initial_time = entry.metadata.accessed_at;

        sleep(Duration::from_millis(10));
        entry.mark_accessed();

        assert_eq!(entry.metadata.access_count, 1);
        assert!(entry.metadata.accessed_at > initial_time);
    }

    #[test]
    fn test_stamp_fresh() {
        let mut payload = Payload::new();
        payload.insert("nickname".to_string(), json!("Alice"));
        payload.insert(IS_STALE_FIELD.to_string(), json!(true));

        let stamped = stamp_fresh(payload);
        assert_eq!(stamped["nickname"], "Alice");
        assert_eq!(stamped[IS_STALE_FIELD], false);

        let cached_at = stamped[CACHED_AT_FIELD].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(cached_at).is_ok());
    }
}
