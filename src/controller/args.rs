//! Command line construction for the external tool

use crate::config::Config;
use crate::runner::CommandSpec;
use crate::types::{CredentialContext, JobId, TargetKind};
use std::path::Path;

const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

fn output_arg(dir: &Path) -> String {
    dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned()
}

fn finish(
    mut args: Vec<String>,
    config: &Config,
    context: &CredentialContext,
    source: &str,
) -> Vec<String> {
    args.extend(context.cookie_args());
    args.extend(config.tool.extra_args.iter().cloned());
    args.push(source.to_string());
    args
}

/// Arguments for the main fetch of a job
pub(crate) fn download_command(
    config: &Config,
    job_id: JobId,
    kind: TargetKind,
    source: &str,
    context: &CredentialContext,
) -> CommandSpec {
    let mut args = vec![
        // one progress line per update instead of carriage-return redraws
        "--newline".to_string(),
        "-o".to_string(),
        output_arg(&config.fetch.target_dir(kind)),
    ];

    match kind {
        TargetKind::Video => {
            args.extend(["-f", "bestvideo+bestaudio/best"].map(String::from));
        }
        TargetKind::Audio => {
            args.extend(["-f", "bestaudio/best", "-x", "--audio-format", "mp3"].map(String::from));
        }
    }

    CommandSpec::new(
        finish(args, config, context, source),
        format!("job {job_id} via {context}"),
    )
}

/// Arguments for the companion thumbnail fetch
pub(crate) fn thumbnail_command(
    config: &Config,
    job_id: JobId,
    source: &str,
    context: &CredentialContext,
) -> CommandSpec {
    let args = vec![
        "--skip-download".to_string(),
        "--write-thumbnail".to_string(),
        "-o".to_string(),
        output_arg(&config.fetch.thumbnail_dir()),
    ];

    CommandSpec::new(
        finish(args, config, context, source),
        format!("thumbnail {job_id} via {context}"),
    )
}

/// Arguments for a metadata probe
pub(crate) fn info_command(
    config: &Config,
    source: &str,
    context: &CredentialContext,
) -> CommandSpec {
    let args = vec![
        "--dump-json".to_string(),
        "--no-playlist".to_string(),
        "--skip-download".to_string(),
    ];

    CommandSpec::new(
        finish(args, config, context, source),
        format!("info via {context}"),
    )
}
