//! Integration tests for the tokview diagnostics server

use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

use tokview::api::server::ApiServer;
use tokview::ServerConfig;
use tokview_cache::{CacheConfig, CacheDriver};

/// Test helper to start the API server in the background
async fn start_test_server(cache: CacheConfig, port: u16) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            cache,
        };

        let server = ApiServer::new(config);
        let _ = server.start().await;
    })
}

fn file_cache(dir: PathBuf) -> CacheConfig {
    CacheConfig::builder()
        .driver(CacheDriver::File)
        .path(dir)
        .build()
}

#[tokio::test]
async fn test_health_check() {
    let port = 18091;
    let _server_handle = start_test_server(CacheConfig::memory(), port).await;
    sleep(Duration::from_secs(1)).await;

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cache_status_memory() {
    let port = 18092;
    let _server_handle = start_test_server(CacheConfig::memory(), port).await;
    sleep(Duration::from_secs(1)).await;

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/cache/status", port))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["cache_driver"], "memory");
    assert_eq!(body["write_test"], true);
    assert_eq!(body["read_test"], true);
    assert!(body["cache_path"].is_null());
}

#[tokio::test]
async fn test_cache_status_creates_file_directory() {
    let temp_dir = TempDir::new().unwrap();
    let cache_dir = temp_dir.path().join("cache").join("data");
    let port = 18093;

    let _server_handle = start_test_server(file_cache(cache_dir.clone()), port).await;
    sleep(Duration::from_secs(1)).await;

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/cache/status", port))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["cache_driver"], "file");
    assert_eq!(body["path_exists"], true);
    assert!(cache_dir.is_dir());
}

#[tokio::test]
async fn test_cache_stats() {
    let port = 18094;
    let _server_handle = start_test_server(CacheConfig::memory(), port).await;
    sleep(Duration::from_secs(1)).await;

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/cache/stats", port))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["hits"], 0);
    assert_eq!(body["misses"], 0);
}

#[tokio::test]
async fn test_small_responses_are_not_compressed() {
    let port = 18095;
    let _server_handle = start_test_server(CacheConfig::memory(), port).await;
    sleep(Duration::from_secs(1)).await;

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .header("Accept-Encoding", "gzip")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("content-encoding").is_none());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}
