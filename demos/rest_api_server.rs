//! REST API server example
//!
//! Runs media-dl with the REST API enabled, allowing control via HTTP.
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:6790/swagger-ui
//! - Start jobs via POST http://localhost:6790/jobs
//! - Follow a job via GET http://localhost:6790/jobs/{id}/events
//!
//! Logging is controlled with `RUST_LOG` (e.g. `RUST_LOG=media_dl=debug`).

use media_dl::config::{ApiConfig, Config};
use media_dl::{MediaDownloader, run_with_shutdown};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("media_dl=info,tower_http=info")),
        )
        .init();

    let config = Config {
        api: ApiConfig {
            bind_address: "127.0.0.1:6790".parse::<SocketAddr>()?,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
            swagger_ui: true,
        },
        ..Default::default()
    };

    // Fails with NotSupported if yt-dlp is not in PATH
    let downloader = MediaDownloader::new(config).await?;

    println!("Starting media-dl REST API server");
    println!("Swagger UI: http://localhost:6790/swagger-ui");
    println!();
    println!("Example commands:");
    println!("  # Start an audio job");
    println!("  curl -X POST http://localhost:6790/jobs \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"url\": \"https://www.youtube.com/watch?v=dQw4w9WgXcQ\", \"format\": \"audio\"}}'");
    println!();
    println!("  # Follow it (Server-Sent Events)");
    println!("  curl -N http://localhost:6790/jobs/<job_id>/events");
    println!();
    println!("  # Cancel it");
    println!("  curl -X DELETE http://localhost:6790/jobs/<job_id>");
    println!();
    println!("Press Ctrl+C to stop");

    let server = downloader.spawn_api_server();

    tokio::select! {
        result = server => {
            result??;
        }
        result = run_with_shutdown(downloader.clone()) => {
            result?;
        }
    }

    Ok(())
}
