//! # tokview-cache
//!
//! Caching core for the tokview front end. Request handlers hand the
//! [`CacheService`] a resource identity and a fetch closure; the service
//! answers from the store, refreshes from upstream, or falls back to the last
//! known good copy, and always returns a [`ResourceResult`] rather than an
//! error.
//!
//! ## Read-through lookup
//!
//! ```no_run
//! use tokview_cache::{CacheConfig, CacheService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = CacheService::from_config(CacheConfig::from_env()?)?;
//!
//!     let videos = service
//!         .get_videos("bob", Some("10"), || async {
//!             Ok(json!({"code": 0, "videos": [], "cursor": "20"}))
//!         }, false)
//!         .await;
//!
//!     if videos.is_failure() {
//!         println!("render error view: {}", videos.to_value());
//!     } else if videos.is_stale() {
//!         println!("render with a 'possibly outdated' notice");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Diagnostics
//!
//! ```no_run
//! use tokview_cache::{CacheConfig, CacheService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = CacheService::from_config(CacheConfig::default())?;
//!     let report = service.test_cache_connection().await;
//!     println!("cache healthy: {}", report.success);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheDriver, CacheService, CacheStats, CacheStore,
    CachedResource, ConnectionReport, FailureEnvelope, FetchResult, FileStore, MemoryStore,
    Payload, RefreshRequest, ResourceKey, ResourceKind, ResourceResult, ResultSource, WarmReport,
};
pub use error::{CacheError, Result};
