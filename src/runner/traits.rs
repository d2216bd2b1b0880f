//! Traits and types for running the external fetch tool

use async_trait::async_trait;

/// Everything needed to launch one attempt of the external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Arguments passed to the tool, in order
    pub args: Vec<String>,
    /// Short label used in log lines (e.g. "job 1234 via firefox")
    pub tag: String,
}

impl CommandSpec {
    /// Create a spec from an argument list
    pub fn new(args: Vec<String>, tag: impl Into<String>) -> Self {
        Self {
            args,
            tag: tag.into(),
        }
    }

    /// Value following `flag` in the argument list, if any
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Whether `flag` appears in the argument list
    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

/// How an attempt ended
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl ExitOutcome {
    /// Outcome with an explicit exit code
    pub fn code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Outcome for a process killed by a signal
    pub fn signalled() -> Self {
        Self { code: None }
    }

    /// Whether the attempt exited zero
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// A running invocation of the external tool
///
/// Dropping an attempt before it finished kills the process.
#[async_trait]
pub trait Attempt: Send {
    /// Next complete stdout line, or `None` once stdout is closed
    ///
    /// Line terminators (`\n`, `\r\n`) are stripped. A trailing fragment without
    /// a newline at end of stream is discarded.
    async fn next_line(&mut self) -> Option<String>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> crate::Result<ExitOutcome>;

    /// Ask the process to stop and wait until it has
    ///
    /// Sends a polite termination request first and forcibly kills the process
    /// if it is still alive after the runner's grace period.
    async fn terminate(&mut self) -> crate::Result<ExitOutcome>;

    /// OS process id, if still known
    fn pid(&self) -> Option<u32>;
}

/// Trait for launching the external fetch tool
///
/// The production implementation is [`CliProcessRunner`](super::CliProcessRunner);
/// tests substitute scripted runners.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Launch one attempt
    async fn spawn(&self, spec: CommandSpec) -> crate::Result<Box<dyn Attempt>>;

    /// Get the name of this runner implementation
    fn name(&self) -> &'static str;
}
