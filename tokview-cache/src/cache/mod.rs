//! # Stale-While-Revalidate Cache
//!
//! Caches upstream TikTok API responses per resource kind and keeps a
//! shadow copy of every successful fetch so a failing upstream can still be
//! answered with the last known good data.
//!
//! ## Features
//!
//! - **Fixed TTL per resource kind**: profiles 6h, video pages 3h, trending 30m, videos 24h
//! - **Stale fallback**: `stale:{key}` shadow entries served with `is_stale = true`
//! - **Store-error bypass**: a failing store never blocks a direct upstream fetch
//! - **Single-flight refresh**: concurrent misses on one key fetch once
//! - **Pluggable stores**: in-memory (TTL + LRU) and file-backed
//!
//! ## Example
//!
//! ```rust
//! use tokview_cache::cache::{CacheConfig, CacheService};
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = CacheService::from_config(CacheConfig::memory())?;
//!
//! let result = service
//!     .get_profile("alice", || async { Ok(json!({"code": 0, "nickname": "Alice"})) }, false)
//!     .await;
//!
//! assert!(!result.is_stale());
//! assert_eq!(result.to_value()["nickname"], "Alice");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod entry;
pub mod keys;
pub mod result;
pub mod service;
pub mod single_flight;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder, CacheDriver};
pub use diagnostics::{ConnectionReport, RefreshRequest, WarmReport};
pub use entry::{CacheEntry, CacheMetadata};
pub use keys::ResourceKey;
pub use result::{CachedResource, FailureEnvelope, ResourceResult, ResultSource};
pub use service::{CacheService, FetchResult};
pub use store::{CacheStore, FileStore, MemoryStore, StoreStats};
pub use types::{CacheStats, Payload, ResourceKind};
