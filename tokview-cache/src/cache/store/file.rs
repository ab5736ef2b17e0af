//! File-backed store: one JSON document per key
//!
//! The file name is the hex SHA-256 of the key, placed under two levels of
//! two-character shard directories so no single directory grows unbounded.

use super::CacheStore;
use crate::cache::config::CacheDriver;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// On-disk record
#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    key: String,
    expires_at: Option<DateTime<Utc>>,
    value: Value,
}

impl FileRecord {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Utc::now() >= expires_at)
            .unwrap_or(false)
    }
}

/// Store that persists entries under a cache directory
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the file holding `key`
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        self.root.join(&hash[0..2]).join(&hash[2..4]).join(hash)
    }

    fn entry_error(action: &str, key: &str, e: std::io::Error) -> CacheError {
        CacheError::StoreError(format!("failed to {} {}: {}", action, key, e))
    }

    async fn remove_file(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.entry_path(key);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::entry_error("read", key, e)),
        };

        let record: FileRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "Discarding unreadable cache file");
                Self::remove_file(&path).await?;
                return Ok(None);
            }
        };

        if record.key != key || record.is_expired() {
            debug!(key, "Cache file expired");
            Self::remove_file(&path).await?;
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        let record = FileRecord {
            key: key.to_string(),
            expires_at,
            value,
        };
        let bytes = serde_json::to_vec(&record)?;

        // Write-then-rename so readers never see a partial document
        let tmp = path.with_extension(format!(
            "tmp-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Self::entry_error("write", key, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Self::entry_error("write", key, e));
        }

        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        Self::remove_file(&self.entry_path(key)).await
    }

    async fn prepare(&self) -> Result<()> {
        if tokio::fs::metadata(&self.root).await.is_err() {
            tokio::fs::create_dir_all(&self.root).await?;
            info!(path = %self.root.display(), "Created missing cache directory");
        }
        Ok(())
    }

    fn driver(&self) -> CacheDriver {
        CacheDriver::File
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
