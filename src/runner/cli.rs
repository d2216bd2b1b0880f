//! CLI-based runner using the external fetch tool binary

use super::traits::{Attempt, CommandSpec, ExitOutcome, ProcessRunner};
use crate::config::ToolConfig;
use crate::error::Error;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Binary looked up in PATH when no explicit path is configured
pub const DEFAULT_BINARY: &str = "yt-dlp";

const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Runner that executes the external tool binary
///
/// # Examples
///
/// ```no_run
/// use media_dl::runner::CliProcessRunner;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// // Create with explicit path
/// let runner = CliProcessRunner::new(PathBuf::from("/usr/local/bin/yt-dlp"))
///     .with_kill_grace(Duration::from_secs(2));
///
/// // Or auto-discover from PATH
/// let runner = CliProcessRunner::from_path().expect("yt-dlp not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct CliProcessRunner {
    binary_path: PathBuf,
    kill_grace: Duration,
}

impl CliProcessRunner {
    /// Create a new runner with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Attempt to find the tool in PATH
    ///
    /// Returns `None` if the binary is not installed.
    pub fn from_path() -> Option<Self> {
        which::which(DEFAULT_BINARY).ok().map(Self::new)
    }

    /// Build a runner from the tool configuration
    ///
    /// An explicit `binary_path` wins; otherwise PATH is searched if allowed.
    pub fn from_config(config: &ToolConfig) -> crate::Result<Self> {
        let binary_path = match &config.binary_path {
            Some(path) => path.clone(),
            None if config.search_path => which::which(DEFAULT_BINARY).map_err(|e| {
                Error::NotSupported(format!("{DEFAULT_BINARY} not found in PATH: {e}"))
            })?,
            None => {
                return Err(Error::NotSupported(
                    "no tool binary configured and PATH search is disabled".to_string(),
                ));
            }
        };
        Ok(Self::new(binary_path).with_kill_grace(config.kill_grace))
    }

    /// Time allowed between the termination request and a forced kill
    pub fn with_kill_grace(mut self, kill_grace: Duration) -> Self {
        self.kill_grace = kill_grace;
        self
    }

    /// Path of the executed binary
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl ProcessRunner for CliProcessRunner {
    async fn spawn(&self, spec: CommandSpec) -> crate::Result<Box<dyn Attempt>> {
        let mut child = Command::new(&self.binary_path)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ExternalTool(format!(
                    "failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("tool stdout was not captured".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr, spec.tag.clone()));
        }

        tracing::debug!(
            attempt = %spec.tag,
            pid = ?child.id(),
            binary = %self.binary_path.display(),
            "spawned tool process"
        );

        Ok(Box::new(CliAttempt {
            child,
            stdout: BufReader::new(stdout),
            stdout_closed: false,
            kill_grace: self.kill_grace,
            tag: spec.tag,
        }))
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}

/// One running tool process
struct CliAttempt {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stdout_closed: bool,
    kill_grace: Duration,
    tag: String,
}

impl CliAttempt {
    /// Send SIGTERM (unix) so the tool can clean up partial files
    #[cfg(unix)]
    fn request_stop(&mut self) {
        let Some(pid) = self.child.id().and_then(|id| libc::pid_t::try_from(id).ok()) else {
            return;
        };

        // SAFETY: kill(2) takes plain integers and has no memory-safety
        // preconditions. The pid belongs to a child we have not reaped yet.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            tracing::debug!(
                attempt = %self.tag,
                error = %std::io::Error::last_os_error(),
                "SIGTERM failed, killing immediately"
            );
            self.force_kill();
        }
    }

    #[cfg(not(unix))]
    fn request_stop(&mut self) {
        self.force_kill();
    }

    fn force_kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(attempt = %self.tag, error = %e, "kill failed (process already gone?)");
        }
    }
}

#[async_trait]
impl Attempt for CliAttempt {
    async fn next_line(&mut self) -> Option<String> {
        if self.stdout_closed {
            return None;
        }

        let mut buf = Vec::new();
        match self.stdout.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                self.stdout_closed = true;
                None
            }
            Ok(_) if buf.last() != Some(&b'\n') => {
                tracing::debug!(
                    attempt = %self.tag,
                    bytes = buf.len(),
                    "discarding unterminated trailing output"
                );
                self.stdout_closed = true;
                None
            }
            Ok(_) => {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                Some(String::from_utf8_lossy(&buf).into_owned())
            }
            Err(e) => {
                tracing::warn!(attempt = %self.tag, error = %e, "failed reading tool stdout");
                self.stdout_closed = true;
                None
            }
        }
    }

    async fn wait(&mut self) -> crate::Result<ExitOutcome> {
        let status = self.child.wait().await?;
        let outcome = ExitOutcome::from(status);
        tracing::debug!(attempt = %self.tag, exit_code = ?outcome.code, "tool process exited");
        Ok(outcome)
    }

    async fn terminate(&mut self) -> crate::Result<ExitOutcome> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(status.into());
        }

        self.request_stop();

        match tokio::time::timeout(self.kill_grace, self.child.wait()).await {
            Ok(status) => Ok(status?.into()),
            Err(_) => {
                tracing::warn!(
                    attempt = %self.tag,
                    grace_ms = self.kill_grace.as_millis() as u64,
                    "tool ignored termination request, killing"
                );
                self.force_kill();
                Ok(self.child.wait().await?.into())
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

async fn log_stderr(stderr: ChildStderr, tag: String) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.starts_with("ERROR:") => {
                tracing::warn!(attempt = %tag, "{}", line);
            }
            Ok(Some(line)) => {
                tracing::debug!(attempt = %tag, "{}", line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(attempt = %tag, error = %e, "stopped reading tool stderr");
                break;
            }
        }
    }
}
