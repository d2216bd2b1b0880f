//! Shared test helpers: a scripted process runner and a downloader wired to it.

use crate::config::Config;
use crate::credentials::CredentialCache;
use crate::runner::{Attempt, CommandSpec, ExitOutcome, ProcessRunner};
use crate::types::CredentialContext;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

use super::MediaDownloader;

/// What a scripted attempt prints and how it ends
#[derive(Clone, Debug, Default)]
pub(crate) struct Script {
    lines: Vec<String>,
    exit_code: i32,
    line_delay: Duration,
    hang: bool,
}

impl Script {
    /// Print `lines`, then exit 0
    pub(crate) fn succeed<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Print nothing, exit with `code`
    pub(crate) fn fail(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Default::default()
        }
    }

    /// Exit with `code` once the lines are printed
    pub(crate) fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Never exit on its own once the lines are printed
    pub(crate) fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Sleep before every line
    pub(crate) fn with_line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }
}

/// Runner that replays scripts chosen by the credential context in the command line
///
/// Contexts without a script fail with exit code 1. Companion thumbnail
/// commands succeed silently unless scripted with [`with_companion`](Self::with_companion).
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    companion: Option<Script>,
    spawned: Mutex<Vec<CommandSpec>>,
    terminations: Arc<AtomicUsize>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Script the attempts made with `context` ("firefox", "chrome", "none", ...)
    pub(crate) fn with_script(mut self, context: &str, script: Script) -> Self {
        self.scripts.insert(context.to_string(), script);
        self
    }

    /// Script the attempts made with `context` for one source only
    pub(crate) fn with_script_for(mut self, source: &str, context: &str, script: Script) -> Self {
        self.scripts.insert(format!("{source} {context}"), script);
        self
    }

    /// Script every companion thumbnail fetch
    pub(crate) fn with_companion(mut self, script: Script) -> Self {
        self.companion = Some(script);
        self
    }

    /// Every command spawned so far
    pub(crate) fn spawned(&self) -> Vec<CommandSpec> {
        self.spawned.lock().unwrap().clone()
    }

    /// Contexts of the main fetch attempts, in spawn order
    pub(crate) fn fetch_contexts(&self) -> Vec<String> {
        self.spawned()
            .iter()
            .filter(|spec| !spec.has_flag("--write-thumbnail") && !spec.has_flag("--dump-json"))
            .map(context_of)
            .collect()
    }

    /// Contexts of the metadata probes, in spawn order
    pub(crate) fn probe_contexts(&self) -> Vec<String> {
        self.spawned()
            .iter()
            .filter(|spec| spec.has_flag("--dump-json"))
            .map(context_of)
            .collect()
    }

    /// Number of attempts stopped through `terminate`
    pub(crate) fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

fn context_of(spec: &CommandSpec) -> String {
    spec.flag_value("--cookies-from-browser")
        .map(str::to_string)
        .unwrap_or_else(|| CredentialContext::Anonymous.to_string())
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn spawn(&self, spec: CommandSpec) -> crate::Result<Box<dyn Attempt>> {
        let script = if spec.has_flag("--write-thumbnail") {
            self.companion.clone().unwrap_or_default()
        } else {
            let context = context_of(&spec);
            let source = spec.args.last().cloned().unwrap_or_default();
            self.scripts
                .get(&format!("{source} {context}"))
                .or_else(|| self.scripts.get(&context))
                .cloned()
                .unwrap_or_else(|| Script::fail(1))
        };
        self.spawned.lock().unwrap().push(spec);

        Ok(Box::new(ScriptedAttempt {
            lines: script.lines.into(),
            exit_code: script.exit_code,
            line_delay: script.line_delay,
            hang: script.hang,
            terminations: Arc::clone(&self.terminations),
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedAttempt {
    lines: VecDeque<String>,
    exit_code: i32,
    line_delay: Duration,
    hang: bool,
    terminations: Arc<AtomicUsize>,
}

#[async_trait]
impl Attempt for ScriptedAttempt {
    async fn next_line(&mut self) -> Option<String> {
        match self.lines.pop_front() {
            Some(line) => {
                if !self.line_delay.is_zero() {
                    tokio::time::sleep(self.line_delay).await;
                }
                Some(line)
            }
            None if self.hang => std::future::pending().await,
            None => None,
        }
    }

    async fn wait(&mut self) -> crate::Result<ExitOutcome> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(ExitOutcome::code(self.exit_code))
    }

    async fn terminate(&mut self) -> crate::Result<ExitOutcome> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        self.hang = false;
        self.lines.clear();
        Ok(ExitOutcome::signalled())
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}

/// Test config rooted in `dir` with short eviction and kill grace periods
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.fetch.download_dir = dir.join("downloads");
    config.fetch.eviction_grace = Duration::from_millis(300);
    config.fetch.info_timeout = Duration::from_secs(2);
    config.tool.kill_grace = Duration::from_millis(500);
    config
}

/// Helper to create a downloader driven by `runner`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    runner: Arc<ScriptedRunner>,
    credentials: CredentialCache,
) -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let downloader = MediaDownloader::with_runner(config, runner, credentials)
        .await
        .unwrap();
    (downloader, temp_dir)
}
