//! Reports produced by the cache service's maintenance operations

use crate::cache::config::CacheDriver;
use crate::cache::types::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Outcome of a synthetic write/read/delete cycle against the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionReport {
    /// `write_test && read_test`
    pub success: bool,
    pub cache_driver: CacheDriver,
    /// Cache directory, for the file driver only
    pub cache_path: Option<PathBuf>,
    pub path_exists: bool,
    pub path_writable: bool,
    pub write_test: bool,
    pub read_test: bool,
    pub error: Option<String>,
}

impl ConnectionReport {
    pub(crate) fn new(cache_driver: CacheDriver, cache_path: Option<PathBuf>) -> Self {
        Self {
            success: false,
            cache_driver,
            cache_path,
            path_exists: false,
            path_writable: false,
            write_test: false,
            read_test: false,
            error: None,
        }
    }
}

/// A recorded request to refresh a resource out of band
///
/// Nothing consumes these yet; the service only logs them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshRequest {
    pub kind: ResourceKind,
    pub params: Map<String, Value>,
    pub requested_at: DateTime<Utc>,
}

/// Summary of a profile warm-up pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WarmReport {
    /// Profiles fetched from upstream and stored
    pub warmed: Vec<String>,
    /// Profiles that were already cached
    pub already_cached: Vec<String>,
    /// Profiles fetched while the store was failing; served but not stored
    pub uncached: Vec<String>,
    /// Profiles whose fetch failed, whether or not stale data was served
    pub failed: Vec<String>,
}

impl WarmReport {
    pub fn total(&self) -> usize {
        self.warmed.len() + self.already_cached.len() + self.uncached.len() + self.failed.len()
    }
}
