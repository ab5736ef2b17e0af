pub mod api;
pub mod config;
pub mod error;

pub use api::{gzip_response, ApiServer, AppState};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
