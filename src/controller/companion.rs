//! Companion thumbnail fetch for audio jobs
//!
//! Runs once, after the main fetch succeeded, with the credential context that
//! worked. It is detached from the job: its result never changes the job status,
//! never touches the credential cache and is only logged.

use crate::runner::ProcessRunner;
use crate::types::{CredentialContext, JobId, JobInfo};
use std::sync::Arc;
use std::time::Duration;

use super::MediaDownloader;
use super::args::thumbnail_command;

/// Launch the thumbnail fetch in the background if the job calls for one
pub(crate) fn spawn_thumbnail_fetch(
    downloader: &MediaDownloader,
    job: &JobInfo,
    context: CredentialContext,
) {
    if !downloader.config.fetch.companion_thumbnails || !job.target_kind.wants_companion() {
        return;
    }

    let spec = thumbnail_command(&downloader.config, job.id, &job.source, &context);
    let runner = Arc::clone(&downloader.runner);
    let timeout = downloader.config.fetch.companion_timeout;
    let id = job.id;

    tokio::spawn(async move {
        fetch_thumbnail(runner, spec, id, timeout).await;
    });
}

async fn fetch_thumbnail(
    runner: Arc<dyn ProcessRunner>,
    spec: crate::runner::CommandSpec,
    id: JobId,
    timeout: Duration,
) {
    let mut attempt = match runner.spawn(spec).await {
        Ok(attempt) => attempt,
        Err(e) => {
            tracing::warn!(job_id = %id, error = %e, "thumbnail fetch could not start");
            return;
        }
    };

    let run = async {
        while let Some(line) = attempt.next_line().await {
            tracing::trace!(job_id = %id, line, "thumbnail output");
        }
        attempt.wait().await
    };

    let result = tokio::time::timeout(timeout, run).await;
    match result {
        Ok(Ok(outcome)) if outcome.success() => {
            tracing::debug!(job_id = %id, "thumbnail fetched");
        }
        Ok(Ok(outcome)) => {
            tracing::warn!(job_id = %id, exit_code = ?outcome.code, "thumbnail fetch failed");
        }
        Ok(Err(e)) => {
            tracing::warn!(job_id = %id, error = %e, "thumbnail fetch failed");
        }
        Err(_) => {
            tracing::warn!(
                job_id = %id,
                timeout_secs = timeout.as_secs(),
                "thumbnail fetch timed out"
            );
            if let Err(e) = attempt.terminate().await {
                tracing::debug!(job_id = %id, error = %e, "could not stop thumbnail fetch");
            }
        }
    }
}
