//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Exit code reported in the terminal event of a cancelled job
///
/// Mirrors the shell convention for a process interrupted by a signal (128 + SIGINT).
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// Unique identifier for a job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a fresh random JobId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// What kind of artifact a job produces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Audio-only extraction (mp3)
    #[default]
    Audio,
    /// Best video + best audio
    Video,
}

impl TargetKind {
    /// Interpret a user supplied format string
    ///
    /// Only `"video"` selects video; everything else (including an empty or unknown
    /// value) falls back to audio.
    pub fn from_format(format: Option<&str>) -> Self {
        match format.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("video") => TargetKind::Video,
            _ => TargetKind::Audio,
        }
    }

    /// Name of the output subdirectory for this kind
    pub fn dir_name(&self) -> &'static str {
        match self {
            TargetKind::Audio => "audio",
            TargetKind::Video => "video",
        }
    }

    /// Whether jobs of this kind also fetch a companion thumbnail
    pub fn wants_companion(&self) -> bool {
        matches!(self, TargetKind::Audio)
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, no process spawned yet
    Pending,
    /// An attempt is running (or the chain is between attempts)
    Running,
    /// An attempt exited zero
    Succeeded,
    /// All credential contexts were exhausted, the job was cancelled, or spawning failed
    Failed,
}

impl JobStatus {
    /// Whether this status is absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition
    ///
    /// `Pending → Running → {Running, Succeeded, Failed}`, plus `Pending → Failed`
    /// for jobs that never got a process spawned. Terminal states accept nothing.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A named strategy for authenticating the external tool
///
/// Serialized as a plain string: a browser name (`"firefox"`, `"chrome"`, ...) or
/// `"none"` for anonymous access.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CredentialContext {
    /// Reuse the session cookies stored by the named browser
    Browser(String),
    /// No cookies at all
    Anonymous,
}

impl CredentialContext {
    /// Shorthand for a browser context
    pub fn browser(name: impl Into<String>) -> Self {
        CredentialContext::Browser(name.into())
    }

    /// Arguments that select this context on the tool's command line
    pub fn cookie_args(&self) -> Vec<String> {
        match self {
            CredentialContext::Browser(name) => {
                vec!["--cookies-from-browser".to_string(), name.clone()]
            }
            CredentialContext::Anonymous => Vec::new(),
        }
    }

    /// The default discovery order: firefox, chrome, then anonymous
    pub fn default_order() -> Vec<CredentialContext> {
        vec![
            CredentialContext::browser("firefox"),
            CredentialContext::browser("chrome"),
            CredentialContext::Anonymous,
        ]
    }
}

impl From<String> for CredentialContext {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            CredentialContext::Anonymous
        } else {
            CredentialContext::Browser(trimmed.to_ascii_lowercase())
        }
    }
}

impl From<&str> for CredentialContext {
    fn from(value: &str) -> Self {
        CredentialContext::from(value.to_string())
    }
}

impl From<CredentialContext> for String {
    fn from(ctx: CredentialContext) -> Self {
        ctx.to_string()
    }
}

impl std::fmt::Display for CredentialContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialContext::Browser(name) => f.write_str(name),
            CredentialContext::Anonymous => f.write_str("none"),
        }
    }
}

/// Structured progress parsed from one line of tool output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressEvent {
    /// Progress percentage (0.0 to 100.0)
    pub percentage: f32,
    /// Transferred (or total) size magnitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_value: Option<f64>,
    /// Size unit exactly as printed by the tool (e.g. "MiB")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_unit: Option<String>,
    /// Speed magnitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_value: Option<f64>,
    /// Speed unit exactly as printed by the tool (e.g. "MiB/s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_unit: Option<String>,
    /// The trimmed source line
    pub raw_text: String,
}

impl ProgressEvent {
    /// Whether the detailed size/speed fields are present
    pub fn is_detailed(&self) -> bool {
        self.size_value.is_some() && self.speed_value.is_some()
    }
}

/// Final outcome of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The fetch completed
    Succeeded,
    /// The fetch failed or was cancelled
    Failed,
}

/// Emitted exactly once per job, after which the job's event channel closes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TerminalEvent {
    /// Final outcome
    pub outcome: Outcome,
    /// Exit code of the last attempt (None if it died from a signal or never spawned)
    pub exit_code: Option<i32>,
    /// Whether the failure was user-initiated
    #[serde(default)]
    pub cancelled: bool,
    /// Credential context of the last attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub context: Option<CredentialContext>,
}

impl TerminalEvent {
    /// Terminal event for a successful attempt
    pub fn succeeded(context: CredentialContext) -> Self {
        Self {
            outcome: Outcome::Succeeded,
            exit_code: Some(0),
            cancelled: false,
            context: Some(context),
        }
    }

    /// Terminal event for an exhausted chain (or a job that could not spawn)
    pub fn failed(exit_code: Option<i32>, context: Option<CredentialContext>) -> Self {
        Self {
            outcome: Outcome::Failed,
            exit_code,
            cancelled: false,
            context,
        }
    }

    /// Terminal event for a cancelled job
    pub fn cancelled(context: Option<CredentialContext>) -> Self {
        Self {
            outcome: Outcome::Failed,
            exit_code: Some(CANCELLED_EXIT_CODE),
            cancelled: true,
            context,
        }
    }

    /// Job status this event resolves to
    pub fn status(&self) -> JobStatus {
        match self.outcome {
            Outcome::Succeeded => JobStatus::Succeeded,
            Outcome::Failed => JobStatus::Failed,
        }
    }
}

/// Event delivered to job observers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Progress line parsed from the running attempt
    Progress(ProgressEvent),

    /// An attempt failed and the chain is moving on to another credential context
    Retrying {
        /// Context that just failed
        failed: CredentialContext,
        /// Context about to be tried
        next: CredentialContext,
        /// Exit code of the failed attempt
        exit_code: Option<i32>,
    },

    /// Job finished
    #[serde(rename = "complete")]
    Terminal(TerminalEvent),
}

impl JobEvent {
    /// Whether this is the terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Terminal(_))
    }

    /// SSE event name for this event
    pub fn event_name(&self) -> &'static str {
        match self {
            JobEvent::Progress(_) => "progress",
            JobEvent::Retrying { .. } => "retrying",
            JobEvent::Terminal(_) => "complete",
        }
    }
}

/// Snapshot of a job as held by the registry
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobInfo {
    /// Unique job identifier
    pub id: JobId,

    /// Audio or video
    pub target_kind: TargetKind,

    /// Source locator (URL) being fetched
    pub source: String,

    /// Current status
    pub status: JobStatus,

    /// Credential context of the active (or last) attempt
    #[schema(value_type = Option<String>)]
    pub current_attempt: Option<CredentialContext>,

    /// Number of attempts spawned so far
    pub attempts: u32,

    /// Whether the job was cancelled
    pub cancelled: bool,

    /// Latest reported progress percentage
    pub last_progress: Option<f32>,

    /// When the job was accepted
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

/// Metadata returned by a metadata probe (`--dump-json`)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    /// Media title
    pub title: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Human readable duration (falls back to seconds when the tool gives no string)
    pub duration: Option<String>,
    /// Uploader / channel name
    pub channel: Option<String>,
}

impl MediaInfo {
    /// Extract the fields we surface from the tool's JSON dump
    pub fn from_dump(value: &serde_json::Value) -> Self {
        let text = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let duration = text("duration_string").or_else(|| {
            value.get("duration").and_then(|d| match d {
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::String(s) => Some(s.clone()),
                _ => None,
            })
        });

        Self {
            title: text("title"),
            thumbnail: text("thumbnail"),
            duration,
            channel: text("uploader").or_else(|| text("channel")),
        }
    }
}
