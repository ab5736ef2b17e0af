use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokview::api::ApiServer;
use tokview::ServerConfig;
use serde_json::{Map, Value};
use tokview_cache::{CacheService, ResourceKind};

#[derive(Parser)]
#[command(name = "tokview")]
#[command(about = "Anonymous TikTok viewer: cache operations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the diagnostics server
    Serve {
        /// Host to bind to (overrides TOKVIEW_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides TOKVIEW_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write, read and delete a probe key against the configured store
    CacheTest,

    /// Drop a user's cached profile
    InvalidateUser {
        username: String,
    },

    /// Drop the cached copy of a single video
    InvalidateVideo {
        username: String,
        video_id: String,
    },

    /// Record an out-of-band refresh request for a resource
    ScheduleRefresh {
        /// profile, videos, video or trending
        kind: ResourceKind,

        /// Request parameters as key=value pairs
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tokview=info,tokview_cache=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env()?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            println!("Starting tokview on http://{}", config.bind_addr());
            println!("  GET /health        - Liveness check");
            println!("  GET /cache/status  - Cache connection test");
            println!("  GET /cache/stats   - Cache counters");

            ApiServer::new(config).start().await?;
        }

        Commands::CacheTest => {
            let service = CacheService::from_config(config.cache)?;
            let report = service.test_cache_connection().await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.success {
                std::process::exit(1);
            }
        }

        Commands::InvalidateUser { username } => {
            let service = CacheService::from_config(config.cache)?;
            let removed = service.invalidate_user_cache(&username).await;
            println!("Removed {} cache entries for user {}", removed, username);
        }

        Commands::InvalidateVideo { username, video_id } => {
            let service = CacheService::from_config(config.cache)?;
            let removed = service.invalidate_video_cache(&username, &video_id).await;
            println!(
                "Removed {} cache entries for video {} ({})",
                removed, video_id, username
            );
        }

        Commands::ScheduleRefresh { kind, params } => {
            let service = CacheService::from_config(config.cache)?;
            let params: Map<String, Value> = params
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            let request = service.schedule_background_refresh(kind, params);
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_refresh_arguments() {
        let cli = Cli::try_parse_from([
            "tokview",
            "schedule-refresh",
            "videos",
            "username=alice",
            "cursor=1700000000",
        ])
        .unwrap();

        match cli.command {
            Commands::ScheduleRefresh { kind, params } => {
                assert_eq!(kind, ResourceKind::Videos);
                assert_eq!(
                    params,
                    vec![
                        ("username".to_string(), "alice".to_string()),
                        ("cursor".to_string(), "1700000000".to_string()),
                    ]
                );
            }
            _ => panic!("expected schedule-refresh"),
        }
    }

    #[test]
    fn test_schedule_refresh_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["tokview", "schedule-refresh", "comments"]).is_err());
        assert!(Cli::try_parse_from(["tokview", "schedule-refresh", "profile", "alice"]).is_err());
    }
}
