//! Job controller: the public face of the library
//!
//! The `MediaDownloader` struct and its methods are organized by concern:
//! - [`control`] - Starting, observing, cancelling and inspecting jobs
//! - [`job_task`] - The per-job task that drives the credential discovery chain
//! - [`info`] - Metadata probes sharing the same credential cache
//! - [`companion`] - Best-effort thumbnail fetch next to audio jobs
//! - [`args`] - Command line construction for the external tool
//! - [`lifecycle`] - Shutdown coordination

mod args;
mod companion;
mod control;
mod info;
mod job_task;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::credentials::CredentialCache;
use crate::error::{Error, Result};
use crate::hub::BroadcastHub;
use crate::registry::JobRegistry;
use crate::runner::{CliProcessRunner, ProcessRunner};
use crate::types::{JobId, TargetKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_util::sync::CancellationToken;

/// Jobs whose task is still running, keyed by id
pub(crate) type ActiveJobs = Arc<tokio::sync::Mutex<HashMap<JobId, CancellationToken>>>;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Launches the external tool (trait object so tests can script attempts)
    pub(crate) runner: Arc<dyn ProcessRunner>,
    /// Observable job state
    pub(crate) registry: JobRegistry,
    /// Per-job event fan-out
    pub(crate) hub: BroadcastHub,
    /// Last credential context known to work, shared by all jobs
    pub(crate) credentials: CredentialCache,
    /// Cancellation tokens of running job tasks
    pub(crate) active_jobs: ActiveJobs,
    /// Set to false during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl MediaDownloader {
    /// Create a downloader that runs the real external tool
    ///
    /// The tool binary is resolved from [`ToolConfig`](crate::config::ToolConfig):
    /// an explicit path, or a PATH lookup. Output directories are created.
    pub async fn new(config: Config) -> Result<Self> {
        let runner = CliProcessRunner::from_config(&config.tool)?;
        tracing::info!(binary = %runner.binary_path().display(), "using external fetch tool");
        Self::with_runner(config, Arc::new(runner), CredentialCache::new()).await
    }

    /// Create a downloader from explicit parts
    ///
    /// `credentials` may be shared with other downloaders (or pre-seeded) by the
    /// caller; it is never created implicitly behind the caller's back.
    pub async fn with_runner(
        config: Config,
        runner: Arc<dyn ProcessRunner>,
        credentials: CredentialCache,
    ) -> Result<Self> {
        config.validate()?;

        let dirs = [
            config.fetch.target_dir(TargetKind::Audio),
            config.fetch.target_dir(TargetKind::Video),
            config.fetch.thumbnail_dir(),
        ];
        for dir in &dirs {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                ))
            })?;
        }

        let registry = JobRegistry::with_subscriber_buffer(config.fetch.subscriber_buffer);
        let hub = BroadcastHub::new(registry.clone());

        tracing::debug!(
            runner = runner.name(),
            credential_order = ?config
                .fetch
                .credential_order
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            "media downloader ready"
        );

        Ok(Self {
            config: Arc::new(config),
            runner,
            registry,
            hub,
            credentials,
            active_jobs: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the shared credential cache
    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    /// Handle to the job registry
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Spawn a REST API server for this downloader
    ///
    /// The server runs in a background task until it fails; the returned handle
    /// resolves with its result.
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = Arc::new(self.clone());
        let config = Arc::clone(&self.config);
        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
