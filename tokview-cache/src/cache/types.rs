//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Resource fields as returned by the upstream API
pub type Payload = Map<String, Value>;

/// Profile info: 6 hours
pub const PROFILE_TTL: Duration = Duration::from_secs(21_600);

/// A user's paginated video listing: 3 hours
pub const VIDEOS_TTL: Duration = Duration::from_secs(10_800);

/// Trending feed: 30 minutes
pub const TRENDING_TTL: Duration = Duration::from_secs(1_800);

/// A single video: 24 hours
pub const VIDEO_TTL: Duration = Duration::from_secs(86_400);

/// Kind of upstream resource a cache entry holds
///
/// Each kind has a fixed time-to-live; callers cannot override it per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A user profile
    Profile,

    /// A paginated page of a user's videos
    Videos,

    /// A page of the trending feed
    Trending,

    /// A single video
    Video,
}

impl ResourceKind {
    /// Time-to-live for primary entries of this kind
    pub const fn ttl(self) -> Duration {
        match self {
            ResourceKind::Profile => PROFILE_TTL,
            ResourceKind::Videos => VIDEOS_TTL,
            ResourceKind::Trending => TRENDING_TTL,
            ResourceKind::Video => VIDEO_TTL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Profile => "profile",
            ResourceKind::Videos => "videos",
            ResourceKind::Trending => "trending",
            ResourceKind::Video => "video",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(ResourceKind::Profile),
            "videos" => Ok(ResourceKind::Videos),
            "trending" => Ok(ResourceKind::Trending),
            "video" => Ok(ResourceKind::Video),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}

/// Counters for cache service activity
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Primary-key lookups that found an entry
    pub hits: u64,

    /// Primary-key lookups that found nothing
    pub misses: u64,

    /// Successful upstream refreshes
    pub refreshes: u64,

    /// Responses served from a shadow key after an upstream failure
    pub stale_served: u64,

    /// Calls that ended in a failure envelope
    pub failures: u64,

    /// Errors raised by the backing store
    pub store_errors: u64,

    /// Keys removed by invalidation
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, refreshes: {}, stale_served: {}, failures: {}, store_errors: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.refreshes,
            self.stale_served,
            self.failures,
            self.store_errors
        )
    }
}
