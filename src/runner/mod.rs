//! External fetch tool invocation
//!
//! The core abstraction is the [`ProcessRunner`] trait, which launches one
//! [`Attempt`] of the external tool per call. An attempt exposes the tool's stdout
//! one line at a time, its exit status, and a way to terminate it.
//!
//! - [`CliProcessRunner`]: Runs the real binary (`yt-dlp` by default) with
//!   `tokio::process`
//!
//! ## Usage
//!
//! ```no_run
//! use media_dl::runner::{CliProcessRunner, CommandSpec, ProcessRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = CliProcessRunner::from_path().expect("yt-dlp not found in PATH");
//!
//!     let spec = CommandSpec::new(vec!["--version".to_string()], "probe");
//!     let mut attempt = runner.spawn(spec).await?;
//!     while let Some(line) = attempt.next_line().await {
//!         println!("{line}");
//!     }
//!     let outcome = attempt.wait().await?;
//!     println!("exit code: {:?}", outcome.code);
//!     Ok(())
//! }
//! ```

mod cli;
mod traits;

pub use cli::{CliProcessRunner, DEFAULT_BINARY};
pub use traits::{Attempt, CommandSpec, ExitOutcome, ProcessRunner};
