//! # media-dl
//!
//! Job orchestration for an external media downloader (yt-dlp compatible).
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - The HTTP API is optional; everything it does is a method call
//! - **Event-driven** - Observers subscribe to a job and receive progress, retry
//!   notices and exactly one terminal event
//! - **Self-healing** - Each job walks an ordered chain of credential contexts
//!   (browser cookie stores, then anonymous) and remembers the one that worked
//! - **Leak-free** - Cancelled jobs terminate their process; finished jobs are
//!   evicted after a grace window
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, JobEvent, MediaDownloader, TargetKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!
//!     let id = downloader
//!         .start_job(TargetKind::Audio, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
//!         .await?;
//!
//!     let mut events = downloader.attach_observer(id).await?;
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             JobEvent::Progress(p) => println!("{:.1}%", p.percentage),
//!             JobEvent::Retrying { failed, next, .. } => println!("{failed} failed, trying {next}"),
//!             JobEvent::Terminal(t) => println!("finished: {:?}", t.outcome),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Job controller (decomposed into focused submodules)
mod controller;
/// Credential discovery chain and the shared credential cache
pub mod credentials;
/// Error types
pub mod error;
/// Per-job event fan-out
pub mod hub;
/// Progress line parsing
pub mod progress;
/// In-memory job registry with timed eviction
pub mod registry;
/// Launching and supervising the external tool
pub mod runner;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, FetchConfig, ToolConfig};
pub use controller::MediaDownloader;
pub use credentials::{ChainState, CredentialCache, DiscoveryChain};
pub use error::{ApiError, Error, ErrorDetail, JobError, Result, ToHttpStatus};
pub use hub::{BroadcastHub, JobChannel, Subscription};
pub use progress::parse_progress_line;
pub use registry::JobRegistry;
pub use runner::{Attempt, CliProcessRunner, CommandSpec, ExitOutcome, ProcessRunner};
pub use types::{
    CANCELLED_EXIT_CODE, CredentialContext, JobEvent, JobId, JobInfo, JobStatus, MediaInfo,
    Outcome, ProgressEvent, TargetKind, TerminalEvent,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method,
/// which cancels every running job.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{MediaDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default()).await?;
///     let _api = downloader.spawn_api_server();
///
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for SIGINT only"
            );
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGINT handler, waiting for SIGTERM only"
            );
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
