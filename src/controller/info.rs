//! Metadata probes (`--dump-json`)
//!
//! A probe walks the same credential discovery chain as a job and shares the
//! same cache: a context that works for a probe is remembered for later jobs,
//! and a cached context that fails a probe is invalidated.

use crate::credentials::{ChainState, DiscoveryChain};
use crate::error::{Error, Result};
use crate::runner::{Attempt, ExitOutcome};
use crate::types::{CredentialContext, MediaInfo};

use super::MediaDownloader;
use super::args::info_command;
use super::control::validate_source;

/// Result of a single probe attempt
enum ProbeResult {
    Found(MediaInfo),
    Failed { exit_code: Option<i32>, reason: String },
    TimedOut { reason: String },
}

impl MediaDownloader {
    /// Fetch title, thumbnail, duration and channel for `source`
    ///
    /// Each attempt is bounded by `info_timeout`; a timed out attempt counts as a
    /// failure and discovery moves on to the next credential context.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSource`] if `source` is not an http(s) URL
    /// - [`Error::ExternalTool`] if every credential context failed
    /// - [`Error::Timeout`] if every credential context failed and the last
    ///   attempt timed out
    pub async fn fetch_info(&self, source: &str) -> Result<MediaInfo> {
        let url = validate_source(source)?;
        let cached = self.credentials.get().await;
        let mut chain = DiscoveryChain::new(self.config.fetch.credential_order.clone(), cached);
        let mut last_reason = String::from("no credential context configured");
        let mut last_timed_out = false;

        while let ChainState::Trying {
            context,
            from_cache,
        } = chain.state().clone()
        {
            tracing::debug!(context = %context, from_cache, source = %url, "probing media info");

            let result = self.probe(url.as_str(), &context).await;
            let outcome = match result {
                ProbeResult::Found(info) => {
                    chain.on_exit(ExitOutcome::code(0));
                    self.credentials.record_success(&context).await;
                    return Ok(info);
                }
                ProbeResult::Failed { exit_code, reason } => {
                    tracing::warn!(
                        context = %context,
                        exit_code = ?exit_code,
                        reason = %reason,
                        "info probe failed"
                    );
                    last_reason = reason;
                    last_timed_out = false;
                    // a zero exit with unusable output is still a failure
                    ExitOutcome {
                        code: exit_code.filter(|c| *c != 0),
                    }
                }
                ProbeResult::TimedOut { reason } => {
                    tracing::warn!(context = %context, reason = %reason, "info probe timed out");
                    last_reason = reason;
                    last_timed_out = true;
                    ExitOutcome::signalled()
                }
            };

            self.credentials.invalidate(&context).await;
            chain.on_exit(outcome);
        }

        if last_timed_out {
            return Err(Error::Timeout(format!("media info probe: {last_reason}")));
        }
        Err(Error::ExternalTool(format!(
            "failed to fetch media info with any credential context: {last_reason}"
        )))
    }

    async fn probe(&self, source: &str, context: &CredentialContext) -> ProbeResult {
        let spec = info_command(&self.config, source, context);
        let mut attempt = match self.runner.spawn(spec).await {
            Ok(attempt) => attempt,
            Err(e) => {
                return ProbeResult::Failed {
                    exit_code: None,
                    reason: e.to_string(),
                };
            }
        };

        let timeout = self.config.fetch.info_timeout;
        let result = tokio::time::timeout(timeout, collect(attempt.as_mut())).await;
        match result {
            Ok(Ok((outcome, stdout))) if outcome.success() => parse_dump(&stdout),
            Ok(Ok((outcome, _))) => ProbeResult::Failed {
                exit_code: outcome.code,
                reason: format!("tool exited with {:?}", outcome.code),
            },
            Ok(Err(e)) => ProbeResult::Failed {
                exit_code: None,
                reason: e.to_string(),
            },
            Err(_) => {
                if let Err(e) = attempt.terminate().await {
                    tracing::debug!(error = %e, "could not stop timed out info probe");
                }
                ProbeResult::TimedOut {
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                }
            }
        }
    }
}

async fn collect(attempt: &mut dyn Attempt) -> Result<(ExitOutcome, Vec<String>)> {
    let mut lines = Vec::new();
    while let Some(line) = attempt.next_line().await {
        lines.push(line);
    }
    let outcome = attempt.wait().await?;
    Ok((outcome, lines))
}

/// The dump is one JSON object per line; the first parseable object wins
fn parse_dump(lines: &[String]) -> ProbeResult {
    let parsed = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<serde_json::Value>(line).ok());

    match parsed {
        Some(value) => ProbeResult::Found(MediaInfo::from_dump(&value)),
        None => ProbeResult::Failed {
            exit_code: Some(0),
            reason: "tool printed no JSON metadata".to_string(),
        },
    }
}
