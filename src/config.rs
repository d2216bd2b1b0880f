//! Configuration types for media-dl

use crate::error::{Error, Result};
use crate::types::CredentialContext;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// External tool configuration (binary location, extra arguments, termination)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolConfig {
    /// Path to the fetch tool executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Whether to search PATH for the tool if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Extra arguments appended to every invocation, before the source URL
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Time between SIGTERM and SIGKILL when cancelling an attempt (default: 5s)
    #[serde(default = "default_kill_grace", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub kill_grace: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
            extra_args: Vec::new(),
            kill_grace: default_kill_grace(),
        }
    }
}

/// Fetch behavior configuration (directories, credential discovery, job lifetime)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Base output directory (default: "./downloads")
    ///
    /// Artifacts land in `audio/` or `video/` below it, thumbnails in `thumbnails/`.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Credential contexts tried in order when nothing is cached
    /// (default: firefox, chrome, none)
    #[serde(default = "CredentialContext::default_order")]
    #[schema(value_type = Vec<String>)]
    pub credential_order: Vec<CredentialContext>,

    /// How long a finished job stays visible before it is evicted (default: 10s)
    #[serde(default = "default_eviction_grace", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub eviction_grace: Duration,

    /// Events buffered per subscriber before the oldest are dropped (default: 256)
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Upper bound for a single metadata probe attempt (default: 30s)
    #[serde(default = "default_info_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub info_timeout: Duration,

    /// Fetch a thumbnail next to successful audio jobs (default: true)
    #[serde(default = "default_true")]
    pub companion_thumbnails: bool,

    /// Upper bound for the companion thumbnail fetch (default: 60s)
    #[serde(default = "default_companion_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub companion_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            credential_order: CredentialContext::default_order(),
            eviction_grace: default_eviction_grace(),
            subscriber_buffer: default_subscriber_buffer(),
            info_timeout: default_info_timeout(),
            companion_thumbnails: true,
            companion_timeout: default_companion_timeout(),
        }
    }
}

impl FetchConfig {
    /// Directory a job of the given kind writes into
    pub fn target_dir(&self, kind: crate::types::TargetKind) -> PathBuf {
        self.download_dir.join(kind.dir_name())
    }

    /// Directory for companion thumbnails
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.download_dir.join("thumbnails")
    }
}

/// REST API server configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Fields are organized into sub-configs:
/// - [`tool`](ToolConfig) - external binary location and termination
/// - [`fetch`](FetchConfig) - directories, credential discovery, job lifetime
/// - [`api`](ApiConfig) - REST API server
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// External tool settings
    #[serde(default)]
    pub tool: ToolConfig,

    /// Fetch behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Base output directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.fetch.download_dir
    }

    /// Check the configuration for values the downloader cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.credential_order.is_empty() {
            return Err(Error::Config {
                message: "credential order must name at least one context".to_string(),
                key: Some("credential_order".to_string()),
            });
        }

        let mut seen = HashSet::new();
        for ctx in &self.fetch.credential_order {
            if !seen.insert(ctx) {
                return Err(Error::Config {
                    message: format!("credential context '{ctx}' is listed twice"),
                    key: Some("credential_order".to_string()),
                });
            }
        }

        if self.fetch.subscriber_buffer == 0 {
            return Err(Error::Config {
                message: "subscriber buffer must be greater than zero".to_string(),
                key: Some("subscriber_buffer".to_string()),
            });
        }

        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_true() -> bool {
    true
}

fn default_kill_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_eviction_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_subscriber_buffer() -> usize {
    256
}

fn default_info_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_companion_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
