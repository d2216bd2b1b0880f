//! The per-job task: drives credential discovery and streams progress.

use crate::credentials::{ChainState, DiscoveryChain};
use crate::progress::parse_progress_line;
use crate::runner::{Attempt, ExitOutcome};
use crate::types::{JobEvent, JobId, JobInfo, JobStatus, TerminalEvent};
use tokio_util::sync::CancellationToken;

use super::MediaDownloader;
use super::args::download_command;

/// How one attempt ended from the job's point of view
struct AttemptEnd {
    outcome: ExitOutcome,
    cancelled: bool,
}

/// Run a job to completion
///
/// Always publishes exactly one terminal event, records the final status and
/// schedules eviction, whatever happens along the way.
pub(crate) async fn run_job(downloader: MediaDownloader, job: JobInfo, token: CancellationToken) {
    let id = job.id;
    let terminal = drive_chain(&downloader, &job, &token).await;

    if terminal.cancelled
        && let Err(e) = downloader.registry.mark_cancelled(id).await
    {
        tracing::warn!(job_id = %id, error = %e, "failed to flag job as cancelled");
    }

    if let Err(e) = downloader.registry.set_status(id, terminal.status()).await {
        tracing::error!(job_id = %id, error = %e, "failed to record final job status");
    }

    match terminal.status() {
        JobStatus::Succeeded => tracing::info!(
            job_id = %id,
            context = ?terminal.context.as_ref().map(ToString::to_string),
            "job succeeded"
        ),
        _ => tracing::warn!(
            job_id = %id,
            exit_code = ?terminal.exit_code,
            cancelled = terminal.cancelled,
            "job failed"
        ),
    }

    if terminal.status() == JobStatus::Succeeded
        && let Some(context) = terminal.context.clone()
    {
        super::companion::spawn_thumbnail_fetch(&downloader, &job, context);
    }

    downloader.hub.finish(id, terminal).await;

    if let Err(e) = downloader
        .registry
        .schedule_eviction(id, downloader.config.fetch.eviction_grace)
        .await
    {
        tracing::warn!(job_id = %id, error = %e, "failed to schedule job eviction");
    }

    downloader.active_jobs.lock().await.remove(&id);
}

/// Walk the discovery chain until it reaches a terminal state
async fn drive_chain(
    downloader: &MediaDownloader,
    job: &JobInfo,
    token: &CancellationToken,
) -> TerminalEvent {
    let id = job.id;
    let cached = downloader.credentials.get().await;
    let mut chain = DiscoveryChain::new(downloader.config.fetch.credential_order.clone(), cached);

    while let ChainState::Trying {
        context,
        from_cache,
    } = chain.state().clone()
    {
        if token.is_cancelled() {
            chain.cancel();
            break;
        }

        let spec = download_command(&downloader.config, id, job.target_kind, &job.source, &context);
        let mut attempt = match downloader.runner.spawn(spec).await {
            Ok(attempt) => attempt,
            Err(e) => {
                tracing::error!(
                    job_id = %id,
                    context = %context,
                    error = %e,
                    "failed to launch tool"
                );
                return TerminalEvent::failed(None, Some(context));
            }
        };
        chain.mark_launched();

        tracing::info!(
            job_id = %id,
            context = %context,
            from_cache,
            pid = ?attempt.pid(),
            "attempt started"
        );
        if let Err(e) = downloader.registry.set_status(id, JobStatus::Running).await {
            tracing::warn!(job_id = %id, error = %e, "could not mark job running");
        }
        if let Err(e) = downloader.registry.set_attempt(id, context.clone()).await {
            tracing::warn!(job_id = %id, error = %e, "could not record attempt");
        }

        let end = supervise_attempt(downloader, id, attempt.as_mut(), token).await;
        drop(attempt);

        if end.cancelled {
            chain.cancel();
        }

        match chain.on_exit(end.outcome).clone() {
            ChainState::Succeeded { context } => {
                downloader.credentials.record_success(&context).await;
            }
            ChainState::Trying { context: next, .. } => {
                tracing::warn!(
                    job_id = %id,
                    failed = %context,
                    next = %next,
                    exit_code = ?end.outcome.code,
                    "attempt failed, trying next credential context"
                );
                downloader.credentials.invalidate(&context).await;
                downloader
                    .hub
                    .publish(
                        id,
                        JobEvent::Retrying {
                            failed: context,
                            next,
                            exit_code: end.outcome.code,
                        },
                    )
                    .await;
            }
            ChainState::Exhausted { .. } => {
                tracing::warn!(
                    job_id = %id,
                    context = %context,
                    exit_code = ?end.outcome.code,
                    "last credential context failed"
                );
                downloader.credentials.invalidate(&context).await;
            }
            ChainState::Cancelled { .. } => {}
        }
    }

    terminal_event(chain.state())
}

fn terminal_event(state: &ChainState) -> TerminalEvent {
    match state {
        ChainState::Succeeded { context } => TerminalEvent::succeeded(context.clone()),
        ChainState::Exhausted {
            last_exit_code,
            last_context,
        } => TerminalEvent::failed(*last_exit_code, last_context.clone()),
        ChainState::Cancelled { context, .. } => TerminalEvent::cancelled(context.clone()),
        // the driver loop only exits on a terminal state
        ChainState::Trying { context, .. } => TerminalEvent::failed(None, Some(context.clone())),
    }
}

/// Stream one attempt's output into the hub until it exits or is cancelled
async fn supervise_attempt(
    downloader: &MediaDownloader,
    id: JobId,
    attempt: &mut dyn Attempt,
    token: &CancellationToken,
) -> AttemptEnd {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                return AttemptEnd {
                    outcome: terminate(id, attempt).await,
                    cancelled: true,
                };
            }
            line = attempt.next_line() => match line {
                Some(line) => handle_line(downloader, id, &line).await,
                None => break,
            },
        }
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => AttemptEnd {
            outcome: terminate(id, attempt).await,
            cancelled: true,
        },
        result = attempt.wait() => AttemptEnd {
            outcome: result.unwrap_or_else(|e| {
                tracing::error!(job_id = %id, error = %e, "failed to wait for tool process");
                ExitOutcome::signalled()
            }),
            cancelled: false,
        },
    }
}

async fn terminate(id: JobId, attempt: &mut dyn Attempt) -> ExitOutcome {
    tracing::info!(job_id = %id, pid = ?attempt.pid(), "terminating attempt");
    attempt.terminate().await.unwrap_or_else(|e| {
        tracing::error!(job_id = %id, error = %e, "failed to terminate tool process");
        ExitOutcome::signalled()
    })
}

async fn handle_line(downloader: &MediaDownloader, id: JobId, line: &str) {
    match parse_progress_line(line) {
        Some(progress) => {
            if let Err(e) = downloader
                .registry
                .record_progress(id, progress.percentage)
                .await
            {
                tracing::debug!(job_id = %id, error = %e, "could not record progress");
            }
            downloader
                .hub
                .publish(id, JobEvent::Progress(progress))
                .await;
        }
        None => tracing::debug!(job_id = %id, line, "tool output"),
    }
}

