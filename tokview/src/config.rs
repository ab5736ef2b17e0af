//! Server configuration loaded from the environment

use crate::error::{Result, ServerError};
use tokview_cache::CacheConfig;

/// Configuration for the tokview server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cache: CacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cache: CacheConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `TOKVIEW_HOST`, `TOKVIEW_PORT` and the `CACHE_*` variables
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let host = std::env::var("TOKVIEW_HOST").unwrap_or(defaults.host);
        let port = match std::env::var("TOKVIEW_PORT") {
            Ok(port) => port
                .trim()
                .parse()
                .map_err(|_| ServerError::Config(format!("invalid TOKVIEW_PORT: {}", port)))?,
            Err(_) => defaults.port,
        };

        Ok(Self {
            host,
            port,
            cache: CacheConfig::from_env()?,
        })
    }

    /// Address the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert!(config.cache.validate().is_ok());
    }
}
