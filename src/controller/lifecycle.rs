//! Shutdown coordination.

use crate::error::Result;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::MediaDownloader;

/// Extra time on top of the kill grace for job tasks to publish their terminal event
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(5);

impl MediaDownloader {
    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new jobs
    /// 2. Cancels every running job (each one terminates its tool process)
    /// 3. Waits, bounded by the kill grace plus a margin, for the job tasks to
    ///    publish their terminal events
    ///
    /// Finished jobs stay observable until their eviction timers fire.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.stop_accepting_and_cancel_all().await;

        let timeout = self.config.tool.kill_grace + SHUTDOWN_MARGIN;
        match tokio::time::timeout(timeout, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All active jobs finished"),
            Err(_) => tracing::warn!(
                remaining = self.active_job_count().await,
                "Timeout waiting for jobs to finish, proceeding with shutdown"
            ),
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether new jobs are still accepted
    pub fn is_accepting_jobs(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Clear the accepting flag and cancel every registered job under one lock
    ///
    /// `start_job` re-checks the flag under the same lock before registering a
    /// token, so no job can slip in after this returns.
    async fn stop_accepting_and_cancel_all(&self) {
        let active = self.active_jobs.lock().await;
        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        tracing::debug!(active_count = active.len(), "Cancelling all active jobs");

        for (id, token) in active.iter() {
            tracing::debug!(job_id = %id, "Signaling cancellation");
            token.cancel();
        }
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.active_job_count().await;
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active jobs to finish");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
