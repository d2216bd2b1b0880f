//! Common test utilities for media-dl integration tests
//!
//! [`FakeTool`] writes a POSIX shell script that impersonates the external
//! downloader. Its behavior is chosen per credential context (the value after
//! `--cookies-from-browser`, or `none`), and every invocation is appended to a
//! log file so tests can see exactly which attempts were made.

#![allow(dead_code)]

use media_dl::{Config, CredentialCache, JobEvent, MediaDownloader, Subscription, TerminalEvent};
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// How the fake tool behaves for one credential context
#[derive(Clone, Debug)]
pub enum Behavior {
    /// Print the lines, then exit 0
    Succeed(Vec<String>),
    /// Exit with the given code
    Fail(i32),
    /// Print the lines, then run until terminated
    Hang(Vec<String>),
}

/// Builder for the fake tool script
#[derive(Debug, Default)]
pub struct FakeTool {
    behaviors: BTreeMap<String, Behavior>,
    line_delay: Option<Duration>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, context: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(context.to_string(), behavior);
        self
    }

    pub fn line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = Some(delay);
        self
    }

    /// Write the script into `dir` and return its path
    pub fn install(&self, dir: &Path) -> PathBuf {
        let log = dir.join("invocations.log");
        let path = dir.join("fake-yt-dlp");

        let sleep = self
            .line_delay
            .map(|d| format!("sleep {:.3}\n", d.as_secs_f64()))
            .unwrap_or_default();

        let mut cases = String::new();
        for (context, behavior) in &self.behaviors {
            let body = match behavior {
                Behavior::Succeed(lines) => format!("{}exit 0", print_lines(lines, &sleep)),
                Behavior::Fail(code) => format!("exit {code}"),
                Behavior::Hang(lines) => format!(
                    "trap 'echo \"term:$ctx\" >> \"$LOG\"; exit 143' TERM\n{}while true; do sleep 0.05; done",
                    print_lines(lines, &sleep)
                ),
            };
            cases.push_str(&format!("  {context})\n{body}\n    ;;\n"));
        }

        let script = format!(
            r#"#!/bin/sh
LOG="{log}"
ctx=none
mode=fetch
prev=""
for arg in "$@"; do
  if [ "$prev" = "--cookies-from-browser" ]; then ctx="$arg"; fi
  if [ "$arg" = "--write-thumbnail" ]; then mode=thumbnail; fi
  if [ "$arg" = "--dump-json" ]; then mode=info; fi
  prev="$arg"
done
echo "$mode:$ctx" >> "$LOG"
if [ "$mode" = "thumbnail" ]; then exit 0; fi
case "$ctx" in
{cases}  *)
    echo "ERROR: no behavior for $ctx" >&2
    exit 1
    ;;
esac
"#,
            log = log.display(),
        );

        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}

fn print_lines(lines: &[String], sleep: &str) -> String {
    lines
        .iter()
        .map(|line| format!("{sleep}printf '%s\\n' '{}'\n", line.replace('\'', "'\\''")))
        .collect()
}

/// A progress line in the tool's detailed format
pub fn progress_line(pct: f32) -> String {
    format!("[download] {pct:5.1}% of ~4.00MiB at  1.25MiB/s ETA 00:02")
}

/// Invocations recorded by the fake tool, as `mode:context`
pub fn invocations(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("invocations.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Test config that runs `tool` and writes below `dir`
pub fn test_config(dir: &Path, tool: PathBuf) -> Config {
    let mut config = Config::default();
    config.tool.binary_path = Some(tool);
    config.tool.search_path = false;
    config.tool.kill_grace = Duration::from_secs(2);
    config.fetch.download_dir = dir.join("downloads");
    config.fetch.eviction_grace = Duration::from_millis(400);
    config.fetch.companion_timeout = Duration::from_secs(5);
    config
}

/// Downloader running `tool` with a fresh cache
///
/// Returns the downloader, its cache and the tempdir (which must be kept alive).
pub async fn create_downloader(tool: FakeTool) -> (MediaDownloader, CredentialCache, TempDir) {
    create_downloader_with_cache(tool, CredentialCache::new()).await
}

pub async fn create_downloader_with_cache(
    tool: FakeTool,
    cache: CredentialCache,
) -> (MediaDownloader, CredentialCache, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = tool.install(temp_dir.path());
    let config = test_config(temp_dir.path(), path);

    let runner = media_dl::CliProcessRunner::from_config(&config.tool).unwrap();
    let runner = std::sync::Arc::new(runner);
    let downloader = MediaDownloader::with_runner(config, runner, cache.clone())
        .await
        .unwrap();
    (downloader, cache, temp_dir)
}

/// Drain a subscription until it ends
pub async fn collect_events(subscription: &mut Subscription) -> Vec<JobEvent> {
    tokio::time::timeout(Duration::from_secs(10), async {
        let mut events = Vec::new();
        while let Some(event) = subscription.recv().await {
            events.push(event);
        }
        events
    })
    .await
    .expect("subscription did not end")
}

/// The single terminal event of a finished stream
pub fn single_terminal(events: &[JobEvent]) -> TerminalEvent {
    let terminals: Vec<&TerminalEvent> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Terminal(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(terminals.len(), 1, "expected exactly one terminal event: {events:?}");
    assert!(
        matches!(events.last(), Some(JobEvent::Terminal(_))),
        "terminal event must be last"
    );
    terminals[0].clone()
}

/// Progress percentages in stream order
pub fn percentages(events: &[JobEvent]) -> Vec<f32> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress(p) => Some(p.percentage),
            _ => None,
        })
        .collect()
}

/// Poll `check` every 20ms for up to `limit`
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
