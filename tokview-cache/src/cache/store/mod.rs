//! Key-value stores backing the cache service
//!
//! The service only needs `get`, `put` with an optional expiry, and
//! `forget`. Stores own expiry: an expired entry is reported as absent.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, StoreStats};

use crate::cache::config::{CacheConfig, CacheDriver};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Pluggable key-value store
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a value; expired or missing keys yield `None`
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any existing one. `ttl` of `None` never expires.
    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key, returning whether it existed
    async fn forget(&self, key: &str) -> Result<bool>;

    /// Create whatever the store needs on disk before use
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Driver name reported by diagnostics
    fn driver(&self) -> CacheDriver;

    /// On-disk location, for stores that have one
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Build the store a configuration names
pub fn store_from_config(config: &CacheConfig) -> Arc<dyn CacheStore> {
    match config.driver {
        CacheDriver::Memory => Arc::new(MemoryStore::new(config.max_entries)),
        CacheDriver::File => Arc::new(FileStore::new(config.path.clone())),
    }
}
