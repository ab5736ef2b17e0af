//! Read-through cache service with stale-data fallback
//!
//! A lookup moves through three stages:
//!
//! - **check primary**: a hit is returned as-is with `is_stale = false`;
//!   a miss (or `force_refresh`) goes to refresh; a store error skips the
//!   store entirely and fetches directly.
//! - **refresh**: the caller's fetch closure runs. A good payload is stamped
//!   with `cached_at`, written under the primary key with the kind's TTL and
//!   under the `stale:` shadow key, then returned.
//! - **fallback**: after an upstream failure the shadow key is served with
//!   `is_stale = true`; without one the caller gets `{code: -1, msg}`.
//!
//! No error leaves the public operations.

use crate::cache::config::{CacheConfig, CacheDriver};
use crate::cache::diagnostics::{ConnectionReport, RefreshRequest, WarmReport};
use crate::cache::entry::{stamp_fresh, CACHED_AT_FIELD};
use crate::cache::keys::ResourceKey;
use crate::cache::result::{FailureEnvelope, ResourceResult, ResultSource};
use crate::cache::single_flight::SingleFlight;
use crate::cache::store::{store_from_config, CacheStore};
use crate::cache::types::{CacheStats, Payload, ResourceKind};
use crate::error::Result;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// What a fetch closure yields: the upstream response body, or a transport error
pub type FetchResult = anyhow::Result<Value>;

/// Lifetime of the connection self-test key
const CONNECTION_TEST_TTL: Duration = Duration::from_secs(60);

/// Why an upstream fetch was rejected
enum FetchFailure {
    /// The closure itself failed
    Error(anyhow::Error),

    /// The closure returned an empty value or an error code
    Rejected { msg: Option<String> },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Error(e) => write!(f, "{:#}", e),
            FetchFailure::Rejected { msg: Some(msg) } => write!(f, "upstream error: {}", msg),
            FetchFailure::Rejected { msg: None } => write!(f, "empty or invalid upstream response"),
        }
    }
}

/// Cache orchestration between callers, the store and upstream fetchers
pub struct CacheService {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    flights: SingleFlight<ResourceResult>,
    stats: RwLock<CacheStats>,
}

impl CacheService {
    /// Create a service over an explicit store
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        info!(
            driver = %store.driver(),
            write_stale_shadow = config.write_stale_shadow,
            single_flight = config.single_flight,
            "Initializing cache service"
        );

        Self {
            config,
            store,
            flights: SingleFlight::new(),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Validate the configuration and build the store it names
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let store = store_from_config(&config);
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Fetch a user profile from cache or upstream
    pub async fn get_profile<F, Fut>(
        &self,
        username: &str,
        fetch: F,
        force_refresh: bool,
    ) -> ResourceResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FetchResult> + Send,
    {
        self.get_resource(ResourceKey::profile(username), fetch, force_refresh)
            .await
    }

    /// Fetch one page of a user's videos; each cursor is cached separately
    pub async fn get_videos<F, Fut>(
        &self,
        username: &str,
        cursor: Option<&str>,
        fetch: F,
        force_refresh: bool,
    ) -> ResourceResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FetchResult> + Send,
    {
        self.get_resource(ResourceKey::videos(username, cursor), fetch, force_refresh)
            .await
    }

    /// Fetch a single video
    pub async fn get_video<F, Fut>(
        &self,
        username: &str,
        video_id: &str,
        fetch: F,
        force_refresh: bool,
    ) -> ResourceResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FetchResult> + Send,
    {
        self.get_resource(ResourceKey::video(username, video_id), fetch, force_refresh)
            .await
    }

    /// Fetch one page of the trending feed
    pub async fn get_trending<F, Fut>(
        &self,
        cursor: Option<&str>,
        fetch: F,
        force_refresh: bool,
    ) -> ResourceResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FetchResult> + Send,
    {
        self.get_resource(ResourceKey::trending(cursor), fetch, force_refresh)
            .await
    }

    /// Read-through lookup for any resource key
    pub async fn get_resource<F, Fut>(
        &self,
        key: ResourceKey,
        fetch: F,
        force_refresh: bool,
    ) -> ResourceResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FetchResult> + Send,
    {
        if force_refresh {
            info!(key = %key, "Forced refresh");
            return self.refresh(&key, fetch, true).await;
        }

        match self.store.get(key.as_str()).await {
            Ok(Some(value)) => match cached_payload(value) {
                Some(payload) => {
                    info!(key = %key, "Cache hit");
                    self.stats.write().await.hits += 1;
                    ResourceResult::served(payload, ResultSource::Cache)
                }
                None => {
                    warn!(key = %key, "Ignoring empty cached value");
                    self.stats.write().await.misses += 1;
                    self.refresh(&key, fetch, false).await
                }
            },
            Ok(None) => {
                info!(key = %key, "Cache miss - fetching fresh data");
                self.stats.write().await.misses += 1;
                self.refresh(&key, fetch, false).await
            }
            Err(e) => {
                error!(key = %key, error = %e, "Cache error");
                self.stats.write().await.store_errors += 1;
                self.fetch_direct(&key, fetch).await
            }
        }
    }

    /// Run the fetch closure and store its result, falling back to stale data on failure
    async fn refresh<F, Fut>(&self, key: &ResourceKey, fetch: F, forced: bool) -> ResourceResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FetchResult> + Send,
    {
        let mut flight = if self.config.single_flight {
            Some(self.flights.acquire(key.as_str()).await)
        } else {
            None
        };

        // Another request refreshed this key while we waited
        if let Some(flight) = flight.as_ref().filter(|flight| flight.waited() && !forced) {
            if let Some(outcome) = flight.shared() {
                debug!(key = %key, "Served by concurrent refresh");
                return self.reuse_outcome(outcome).await;
            }

            if let Ok(Some(value)) = self.store.get(key.as_str()).await {
                if let Some(payload) = cached_payload(value) {
                    debug!(key = %key, "Served by cache after abandoned refresh");
                    self.stats.write().await.hits += 1;
                    return ResourceResult::served(payload, ResultSource::Cache);
                }
            }
        }

        let result = match classify(fetch().await) {
            Ok(payload) => {
                let payload = stamp_fresh(payload);
                self.write_through(key, &payload).await;
                self.stats.write().await.refreshes += 1;
                info!(key = %key, kind = %key.kind(), "Refreshed cache entry");
                ResourceResult::served(payload, ResultSource::Upstream)
            }
            Err(failure) => {
                error!(key = %key, kind = %key.kind(), error = %failure, "Error refreshing cache");
                self.handle_fetch_failure(key).await
            }
        };

        if let Some(flight) = flight.as_mut() {
            flight.complete(&result);
        }
        result
    }

    /// Hand a waiter the outcome of the refresh it queued behind
    async fn reuse_outcome(&self, outcome: ResourceResult) -> ResourceResult {
        let mut stats = self.stats.write().await;

        match outcome {
            ResourceResult::Resource(mut resource) => {
                if resource.source == ResultSource::Stale {
                    stats.stale_served += 1;
                } else {
                    resource.source = ResultSource::Cache;
                    stats.hits += 1;
                }
                ResourceResult::Resource(resource)
            }
            failure => {
                stats.failures += 1;
                failure
            }
        }
    }

    /// Store-error path: fetch without touching the store
    async fn fetch_direct<F, Fut>(&self, key: &ResourceKey, fetch: F) -> ResourceResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FetchResult> + Send,
    {
        let kind = key.kind();

        match classify(fetch().await) {
            Ok(payload) => ResourceResult::served(stamp_fresh(payload), ResultSource::Direct),
            Err(FetchFailure::Rejected { msg }) => {
                self.stats.write().await.failures += 1;
                ResourceResult::failure(format!(
                    "Failed to fetch {} data from the API: {}",
                    kind,
                    msg.as_deref().unwrap_or("Unknown error")
                ))
            }
            Err(FetchFailure::Error(e)) => {
                error!(key = %key, error = %e, "Complete failure");
                self.stats.write().await.failures += 1;
                ResourceResult::failure(format!("Exception when fetching {}: {}", kind, e))
            }
        }
    }

    /// Write a fresh payload under its primary key and, if enabled, its shadow key
    async fn write_through(&self, key: &ResourceKey, payload: &Payload) {
        let value = Value::Object(payload.clone());

        if let Err(e) = self
            .store
            .put(key.as_str(), value.clone(), Some(key.kind().ttl()))
            .await
        {
            error!(key = %key, error = %e, "Failed to store cache entry");
            self.stats.write().await.store_errors += 1;
        }

        if self.config.write_stale_shadow {
            if let Err(e) = self
                .store
                .put(&key.stale_key(), value, self.config.stale_ttl)
                .await
            {
                error!(key = %key, error = %e, "Failed to store stale copy");
                self.stats.write().await.store_errors += 1;
            }
        }
    }

    /// Serve the shadow entry for `key`, or the no-stale-data envelope
    async fn handle_fetch_failure(&self, key: &ResourceKey) -> ResourceResult {
        let stale_key = key.stale_key();

        match self.store.get(&stale_key).await {
            Ok(Some(value)) => {
                if let Some(payload) = cached_payload(value) {
                    info!(key = %key, kind = %key.kind(), "Serving stale data");
                    let cached_at = payload
                        .get(CACHED_AT_FIELD)
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    let cache_path = self
                        .store
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "not_file_store".to_string());
                    debug!(
                        key = %key,
                        kind = %key.kind(),
                        cached_at,
                        cache_store = %self.store.driver(),
                        cache_path = %cache_path,
                        "Stale cache details"
                    );
                    self.stats.write().await.stale_served += 1;
                    return ResourceResult::served(payload, ResultSource::Stale);
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %stale_key, error = %e, "Failed to read stale data");
                self.stats.write().await.store_errors += 1;
            }
        }

        if self.store.driver() == CacheDriver::File {
            if let Err(e) = self.store.prepare().await {
                error!(
                    path = ?self.store.path(),
                    error = %e,
                    "Failed to create cache directory"
                );
            }
        }

        error!(key = %key, "No stale data available");
        self.stats.write().await.failures += 1;
        ResourceResult::Failure(FailureEnvelope::no_stale_data())
    }

    /// Drop the cached profile of a user, returning how many keys were removed
    ///
    /// Paginated video listings are not touched: each cursor is its own key
    /// and the store cannot enumerate them.
    pub async fn invalidate_user_cache(&self, username: &str) -> usize {
        let removed = self.forget_with_shadow(&ResourceKey::profile(username)).await;
        info!(username, removed, "Invalidated cache for user");
        removed
    }

    /// Drop the cached copy of a single video
    pub async fn invalidate_video_cache(&self, username: &str, video_id: &str) -> usize {
        let removed = self
            .forget_with_shadow(&ResourceKey::video(username, video_id))
            .await;
        info!(username, video_id, removed, "Invalidated cache for video");
        removed
    }

    async fn forget_with_shadow(&self, key: &ResourceKey) -> usize {
        let mut removed = 0;

        for k in [key.as_str().to_string(), key.stale_key()] {
            match self.store.forget(&k).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(key = %k, error = %e, "Failed to forget cache key");
                    self.stats.write().await.store_errors += 1;
                }
            }
        }

        self.stats.write().await.invalidations += removed as u64;
        removed
    }

    /// Write, read back and delete a probe key to check the store works
    pub async fn test_cache_connection(&self) -> ConnectionReport {
        let mut report = ConnectionReport::new(
            self.store.driver(),
            self.store.path().map(Path::to_path_buf),
        );

        if let Some(path) = self.store.path() {
            report.path_exists = tokio::fs::metadata(path).await.is_ok();
            report.path_writable = is_writable(path).await;

            if !report.path_exists {
                match self.store.prepare().await {
                    Ok(()) => {
                        report.path_exists = true;
                        report.path_writable = is_writable(path).await;
                    }
                    Err(e) => {
                        report.error = Some(format!("Failed to create cache directory: {}", e));
                    }
                }
            }
        }

        let timestamp = Utc::now().timestamp();
        let test_key = format!("test_cache_connection_{}", timestamp);
        let test_value = json!({ "test": true, "timestamp": timestamp });

        if let Err(e) = self
            .store
            .put(&test_key, test_value, Some(CONNECTION_TEST_TTL))
            .await
        {
            report.error = Some(e.to_string());
            return report;
        }
        report.write_test = true;

        match self.store.get(&test_key).await {
            Ok(value) => {
                report.read_test = value
                    .as_ref()
                    .and_then(|v| v.get("test"))
                    .and_then(Value::as_bool)
                    == Some(true);
            }
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        }

        if let Err(e) = self.store.forget(&test_key).await {
            report.error = Some(e.to_string());
            return report;
        }

        report.success = report.write_test && report.read_test;
        info!(success = report.success, driver = %report.cache_driver, "Cache connection test");
        report
    }

    /// Prefetch profiles so the first visitor gets a cache hit
    ///
    /// Profiles already cached are left alone; `fetch_for` builds the fetch
    /// closure for one username.
    pub async fn warm_trending_profiles_cache<I, S, F, Fut>(
        &self,
        usernames: I,
        fetch_for: F,
    ) -> WarmReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Fut + Send + Sync,
        Fut: Future<Output = FetchResult> + Send,
    {
        let usernames: Vec<String> = usernames
            .into_iter()
            .map(|u| u.as_ref().to_string())
            .collect();
        info!(usernames = ?usernames, "Warming cache for trending profiles");

        let mut report = WarmReport::default();
        for username in usernames {
            let result = self
                .get_profile(&username, || fetch_for(&username), false)
                .await;

            match result.source() {
                Some(ResultSource::Cache) => report.already_cached.push(username),
                Some(ResultSource::Upstream) => report.warmed.push(username),
                Some(ResultSource::Direct) => report.uncached.push(username),
                Some(ResultSource::Stale) | None => report.failed.push(username),
            }
        }

        info!(
            warmed = report.warmed.len(),
            already_cached = report.already_cached.len(),
            uncached = report.uncached.len(),
            failed = report.failed.len(),
            "Finished warming trending profiles"
        );
        report
    }

    /// Record that a resource should be refreshed out of band
    ///
    /// No worker consumes these yet; the request is only logged.
    pub fn schedule_background_refresh(
        &self,
        kind: ResourceKind,
        params: Map<String, Value>,
    ) -> RefreshRequest {
        let request = RefreshRequest {
            kind,
            params,
            requested_at: Utc::now(),
        };
        let params = Value::Object(request.params.clone()).to_string();
        info!(
            kind = %request.kind,
            params = %params,
            "Background refresh scheduled"
        );
        request
    }
}

/// Accept a fetched value only if it is a non-empty object with no error code
fn classify(result: FetchResult) -> std::result::Result<Payload, FetchFailure> {
    let value = result.map_err(FetchFailure::Error)?;

    let payload = match value {
        Value::Object(map) if !map.is_empty() => map,
        _ => return Err(FetchFailure::Rejected { msg: None }),
    };

    match payload.get("code") {
        None | Some(Value::Null) => Ok(payload),
        Some(code) if code.as_i64() == Some(0) => Ok(payload),
        Some(_) => Err(FetchFailure::Rejected {
            msg: payload
                .get("msg")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
    }
}

/// A stored value counts as a hit only if it is a non-empty object
fn cached_payload(value: Value) -> Option<Payload> {
    match value {
        Value::Object(map) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// Whether this process can create files in `path`
async fn is_writable(path: &Path) -> bool {
    let probe = path.join(format!(
        ".write-test-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    match tokio::fs::write(&probe, b"").await {
        Ok(()) => {
            let _ = tokio::fs::remove_file(&probe).await;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;

    fn service() -> CacheService {
        CacheService::new(
            CacheConfig::memory(),
            Arc::new(MemoryStore::new(100)),
        )
    }

    #[test]
    fn test_classify_accepts_success_payloads() {
        assert!(classify(Ok(json!({"nickname": "a"}))).is_ok());
        assert!(classify(Ok(json!({"code": 0, "nickname": "a"}))).is_ok());
        assert!(classify(Ok(json!({"code": null, "nickname": "a"}))).is_ok());
    }

    #[test]
    fn test_classify_rejects_failures() {
        for value in [
            json!(null),
            json!(false),
            json!({}),
            json!([]),
            json!(""),
            json!([1, 2]),
            json!({"code": 10201, "msg": "private account"}),
            json!({"code": "0"}),
        ] {
            assert!(classify(Ok(value)).is_err());
        }

        assert!(matches!(
            classify(Err(anyhow::anyhow!("timeout"))),
            Err(FetchFailure::Error(_))
        ));
    }

    #[test]
    fn test_classify_keeps_upstream_message() {
        match classify(Ok(json!({"code": -1, "msg": "rate limited"}))) {
            Err(FetchFailure::Rejected { msg }) => assert_eq!(msg.as_deref(), Some("rate limited")),
            _ => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let service = service();

        service
            .get_profile("alice", || async { Ok(json!({"nickname": "Alice"})) }, false)
            .await;
        service
            .get_profile("alice", || async { Ok(json!({"nickname": "Alice"})) }, false)
            .await;

        let stats = service.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.refreshes, 1);
    }

    #[tokio::test]
    async fn test_schedule_background_refresh_records_intent() {
        let service = service();
        let mut params = Map::new();
        params.insert("username".to_string(), json!("alice"));

        let request = service.schedule_background_refresh(ResourceKind::Profile, params);
        assert_eq!(request.kind, ResourceKind::Profile);
        assert_eq!(request.params["username"], "alice");
    }

    #[tokio::test]
    async fn test_is_writable_creates_and_removes_test_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(is_writable(dir.path()).await);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        assert!(!is_writable(&dir.path().join("missing")).await);

        // A regular file cannot hold new entries
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(!is_writable(&file).await);
    }
}
