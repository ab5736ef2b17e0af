//! API module for the tokview HTTP server

pub mod compression;
pub mod routes;
pub mod server;

pub use compression::gzip_response;
pub use routes::AppState;
pub use server::ApiServer;
