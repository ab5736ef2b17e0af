//! Cache key derivation
//!
//! Keys are plain strings so any key-value backend can hold them:
//!
//! | Resource | Key |
//! |---|---|
//! | profile | `profile:{username}` |
//! | videos | `videos:{username}` or `videos:{username}:cursor:{cursor}` |
//! | video | `video:{video_id}:{username}` |
//! | trending | `trending` or `trending:cursor:{cursor}` |
//!
//! Every primary key has a shadow key, `stale:{primary}`, holding the last
//! successfully fetched value for fallback.

use crate::cache::types::ResourceKind;
use std::fmt;

/// Prefix of shadow keys
pub const STALE_PREFIX: &str = "stale:";

/// A derived cache key together with the kind of resource it addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    kind: ResourceKind,
    key: String,
}

impl ResourceKey {
    /// Key for a user profile
    pub fn profile(username: &str) -> Self {
        Self {
            kind: ResourceKind::Profile,
            key: format!("profile:{}", username),
        }
    }

    /// Key for one page of a user's videos
    pub fn videos(username: &str, cursor: Option<&str>) -> Self {
        let key = match first_page_or(cursor) {
            Some(cursor) => format!("videos:{}:cursor:{}", username, cursor),
            None => format!("videos:{}", username),
        };

        Self {
            kind: ResourceKind::Videos,
            key,
        }
    }

    /// Key for a single video
    pub fn video(username: &str, video_id: &str) -> Self {
        Self {
            kind: ResourceKind::Video,
            key: format!("video:{}:{}", video_id, username),
        }
    }

    /// Key for one page of the trending feed
    pub fn trending(cursor: Option<&str>) -> Self {
        let key = match first_page_or(cursor) {
            Some(cursor) => format!("trending:cursor:{}", cursor),
            None => "trending".to_string(),
        };

        Self {
            kind: ResourceKind::Trending,
            key,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The primary key string
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The shadow key holding the last known good value
    pub fn stale_key(&self) -> String {
        format!("{}{}", STALE_PREFIX, self.key)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// `None`, `""` and `"0"` all address the first page, which has no cursor segment.
fn first_page_or(cursor: Option<&str>) -> Option<&str> {
    cursor.filter(|c| !c.is_empty() && *c != "0")
}
