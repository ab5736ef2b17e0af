//! Configuration for the cache system

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default directory for the file-backed store
pub const DEFAULT_CACHE_PATH: &str = "storage/framework/cache/data";

/// Which backing store the cache service uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    /// In-process map, lost on restart
    Memory,

    /// One JSON file per key under `CacheConfig::path`
    File,
}

impl fmt::Display for CacheDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheDriver::Memory => write!(f, "memory"),
            CacheDriver::File => write!(f, "file"),
        }
    }
}

impl FromStr for CacheDriver {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "array" => Ok(CacheDriver::Memory),
            "file" => Ok(CacheDriver::File),
            other => Err(CacheError::ConfigError(format!(
                "unsupported cache driver: {}",
                other
            ))),
        }
    }
}

/// Configuration for the cache service and its store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backing store
    pub driver: CacheDriver,

    /// Directory for the file driver
    pub path: PathBuf,

    /// Maximum number of entries for the memory driver
    pub max_entries: usize,

    /// Copy every successful refresh into the `stale:` shadow key.
    /// When false, shadow keys are only read, never written.
    pub write_stale_shadow: bool,

    /// Expiry of shadow entries; `None` keeps them until invalidated
    pub stale_ttl: Option<Duration>,

    /// Hold a per-key lock while refreshing so concurrent misses fetch once
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::File,
            path: PathBuf::from(DEFAULT_CACHE_PATH),
            max_entries: 10_000,
            write_stale_shadow: true,
            stale_ttl: None,
            single_flight: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Configuration for an in-memory store, used by tests and the CLI
    pub fn memory() -> Self {
        Self {
            driver: CacheDriver::Memory,
            ..Default::default()
        }
    }

    /// Load configuration from the environment (and `.env` if present)
    ///
    /// Recognised variables: `CACHE_DRIVER`, `CACHE_PATH`, `CACHE_MAX_ENTRIES`,
    /// `CACHE_WRITE_STALE`, `CACHE_STALE_TTL_SECS` (`0` = no expiry),
    /// `CACHE_SINGLE_FLIGHT`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = Self::builder();

        if let Ok(driver) = std::env::var("CACHE_DRIVER") {
            builder = builder.driver(driver.parse()?);
        }
        if let Ok(path) = std::env::var("CACHE_PATH") {
            builder = builder.path(path);
        }
        if let Ok(max) = std::env::var("CACHE_MAX_ENTRIES") {
            builder = builder.max_entries(parse_env("CACHE_MAX_ENTRIES", &max)?);
        }
        if let Ok(flag) = std::env::var("CACHE_WRITE_STALE") {
            builder = builder.write_stale_shadow(parse_flag("CACHE_WRITE_STALE", &flag)?);
        }
        if let Ok(secs) = std::env::var("CACHE_STALE_TTL_SECS") {
            let secs: u64 = parse_env("CACHE_STALE_TTL_SECS", &secs)?;
            builder = builder.stale_ttl((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if let Ok(flag) = std::env::var("CACHE_SINGLE_FLIGHT") {
            builder = builder.single_flight(parse_flag("CACHE_SINGLE_FLIGHT", &flag)?);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::ConfigError(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        if self.driver == CacheDriver::File && self.path.as_os_str().is_empty() {
            return Err(CacheError::ConfigError(
                "file driver requires a cache path".to_string(),
            ));
        }

        if self.stale_ttl == Some(Duration::ZERO) {
            return Err(CacheError::ConfigError(
                "stale_ttl must be positive; use None for no expiry".to_string(),
            ));
        }

        Ok(())
    }

    /// The on-disk cache directory, if the driver has one
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self.driver {
            CacheDriver::File => Some(&self.path),
            CacheDriver::Memory => None,
        }
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    driver: Option<CacheDriver>,
    path: Option<PathBuf>,
    max_entries: Option<usize>,
    write_stale_shadow: Option<bool>,
    stale_ttl: Option<Option<Duration>>,
    single_flight: Option<bool>,
}

impl CacheConfigBuilder {
    pub fn driver(mut self, driver: CacheDriver) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn write_stale_shadow(mut self, enable: bool) -> Self {
        self.write_stale_shadow = Some(enable);
        self
    }

    pub fn stale_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.stale_ttl = Some(ttl);
        self
    }

    pub fn single_flight(mut self, enable: bool) -> Self {
        self.single_flight = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            driver: self.driver.unwrap_or(defaults.driver),
            path: self.path.unwrap_or(defaults.path),
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            write_stale_shadow: self
                .write_stale_shadow
                .unwrap_or(defaults.write_stale_shadow),
            stale_ttl: self.stale_ttl.unwrap_or(defaults.stale_ttl),
            single_flight: self.single_flight.unwrap_or(defaults.single_flight),
        }
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CacheError::ConfigError(format!("invalid value for {}: {}", name, value)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CacheError::ConfigError(format!(
            "invalid value for {}: {}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.driver, CacheDriver::File);
        assert_eq!(config.path, PathBuf::from(DEFAULT_CACHE_PATH));
        assert!(config.write_stale_shadow);
        assert!(config.stale_ttl.is_none());
        assert!(config.single_flight);
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().validate().is_ok());

        let mut invalid = CacheConfig::default();
        invalid.max_entries = 0;
        assert!(invalid.validate().is_err());

        let invalid = CacheConfig::builder()
            .driver(CacheDriver::File)
            .path("")
            .build();
        assert!(invalid.validate().is_err());

        let invalid = CacheConfig::builder()
            .stale_ttl(Some(Duration::ZERO))
            .build();
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .driver(CacheDriver::Memory)
            .max_entries(50)
            .write_stale_shadow(false)
            .stale_ttl(Some(Duration::from_secs(600)))
            .single_flight(false)
            .build();

        assert_eq!(config.driver, CacheDriver::Memory);
        assert_eq!(config.max_entries, 50);
        assert!(!config.write_stale_shadow);
        assert_eq!(config.stale_ttl, Some(Duration::from_secs(600)));
        assert!(!config.single_flight);
        assert!(config.file_path().is_none());
    }

    #[test]
    fn test_driver_parse() {
        assert_eq!("file".parse::<CacheDriver>().unwrap(), CacheDriver::File);
        assert_eq!(" Memory ".parse::<CacheDriver>().unwrap(), CacheDriver::Memory);
        assert_eq!("array".parse::<CacheDriver>().unwrap(), CacheDriver::Memory);
        assert!("redis".parse::<CacheDriver>().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("X", "yes").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(parse_flag("X", "maybe").is_err());
    }
}
