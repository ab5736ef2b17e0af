//! Error types for the tokview server

use thiserror::Error;
use tokview_cache::CacheError;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid server configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache configuration or store failure
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
