//! Job control: start, observe, cancel, inspect.

use crate::error::{Error, Result};
use crate::hub::Subscription;
use crate::types::{JobEvent, JobId, JobInfo, TargetKind};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::MediaDownloader;

/// Slack on top of the kill grace while `cancel_job` waits for the job to settle
const CANCEL_SETTLE_MARGIN: Duration = Duration::from_secs(5);

/// Check that `source` is something the tool can fetch
///
/// Only absolute `http`/`https` URLs are accepted.
pub(crate) fn validate_source(source: &str) -> Result<url::Url> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidSource("URL is required".to_string()));
    }

    let url = url::Url::parse(trimmed)
        .map_err(|e| Error::InvalidSource(format!("'{trimmed}' is not a valid URL: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidSource(format!(
            "unsupported URL scheme '{}' (expected http or https)",
            url.scheme()
        )));
    }
    if url.host().is_none() {
        return Err(Error::InvalidSource(format!("'{trimmed}' has no host")));
    }
    Ok(url)
}

impl MediaDownloader {
    /// Start fetching `source`
    ///
    /// Registers a `Pending` job, launches its task and returns the job id
    /// immediately. The job runs in the background; use
    /// [`attach_observer`](Self::attach_observer) to follow it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSource`] if `source` is not an http(s) URL
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader) -> Result<()> {
    /// let id = downloader
    ///     .start_job(TargetKind::Audio, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
    ///     .await?;
    /// let mut events = downloader.attach_observer(id).await?;
    /// while let Some(event) = events.recv().await {
    ///     println!("{event:?}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start_job(&self, target_kind: TargetKind, source: &str) -> Result<JobId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let url = validate_source(source)?;
        let job = self.registry.create(target_kind, url.as_str()).await;
        let token = CancellationToken::new();

        {
            // shutdown clears the flag while holding this lock
            let mut active = self.active_jobs.lock().await;
            if !self.accepting_new.load(Ordering::SeqCst) {
                drop(active);
                self.registry.remove(job.id).await;
                tracing::debug!(job_id = %job.id, "shutdown began while starting job, discarded");
                return Err(Error::ShuttingDown);
            }
            active.insert(job.id, token.clone());
        }

        tracing::info!(
            job_id = %job.id,
            kind = %target_kind,
            source = %job.source,
            "starting job"
        );

        let id = job.id;
        tokio::spawn(super::job_task::run_job(self.clone(), job, token));
        Ok(id)
    }

    /// Subscribe to a job's events
    ///
    /// The subscription yields events published from now on and ends after the
    /// terminal event. A job that already finished (but is not yet evicted)
    /// yields just its terminal event.
    ///
    /// # Errors
    ///
    /// Returns a not-found job error for unknown or evicted ids.
    pub async fn attach_observer(&self, id: JobId) -> Result<Subscription> {
        self.hub
            .subscribe(id)
            .await
            .ok_or_else(|| Error::job_not_found(id))
    }

    /// Cancel a job
    ///
    /// Terminates the active attempt (if any), stops credential discovery and
    /// waits until the job has published its cancelled terminal event. Cancelling
    /// a job that already finished is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a not-found job error for unknown or evicted ids.
    pub async fn cancel_job(&self, id: JobId) -> Result<()> {
        let job = self.get_job(id).await?;
        if job.status.is_terminal() {
            tracing::debug!(
                job_id = %id,
                status = %job.status,
                "cancel ignored, job already finished"
            );
            return Ok(());
        }

        // subscribe before signalling so the terminal event cannot slip past
        let mut subscription = self.attach_observer(id).await?;

        let token = self.active_jobs.lock().await.get(&id).cloned();
        match token {
            Some(token) => {
                tracing::info!(job_id = %id, "cancelling job");
                token.cancel();
            }
            None => {
                tracing::debug!(job_id = %id, "no active task for job, waiting for it to settle");
            }
        }

        let settle = self.config.tool.kill_grace + CANCEL_SETTLE_MARGIN;
        let settled = tokio::time::timeout(settle, async {
            while let Some(event) = subscription.recv().await {
                if let JobEvent::Terminal(terminal) = event {
                    return Some(terminal);
                }
            }
            None
        })
        .await;

        match settled {
            Ok(Some(terminal)) => {
                tracing::debug!(
                    job_id = %id,
                    outcome = ?terminal.outcome,
                    "job settled after cancel"
                );
            }
            Ok(None) => {}
            Err(_) => {
                tracing::warn!(
                    job_id = %id,
                    waited_ms = settle.as_millis() as u64,
                    "job did not settle after cancel"
                );
            }
        }

        Ok(())
    }

    /// Snapshot of a job
    ///
    /// # Errors
    ///
    /// Returns a not-found job error for unknown or evicted ids.
    pub async fn get_job(&self, id: JobId) -> Result<JobInfo> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| Error::job_not_found(id))
    }

    /// Snapshots of all live jobs, oldest first
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.registry.list().await
    }

    /// Number of jobs whose task is still running
    pub async fn active_job_count(&self) -> usize {
        self.active_jobs.lock().await.len()
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_source("https://www.youtube.com/watch?v=abc").is_ok());
        assert!(validate_source("  http://example.com/v  ").is_ok());
    }

    #[test]
    fn rejects_empty_garbage_and_other_schemes() {
        let sources = [
            "",
            "   ",
            "not a url",
            "ftp://example.com/f",
            "file:///etc/passwd",
            "https://",
        ];
        for source in sources {
            assert!(
                matches!(validate_source(source), Err(Error::InvalidSource(_))),
                "{source:?} should be rejected"
            );
        }
    }
}
