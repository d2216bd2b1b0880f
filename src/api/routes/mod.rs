//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Starting, listing, following and cancelling jobs
//! - [`info`] - Metadata probes
//! - [`system`] - Health and OpenAPI

use serde::{Deserialize, Serialize};

mod info;
mod jobs;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use info::*;
pub use jobs::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartJobRequest {
    /// Source URL to fetch
    pub url: String,
    /// `"video"` for video, anything else (or nothing) for audio
    #[serde(default)]
    pub format: Option<String>,
}

/// Response body for POST /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartJobResponse {
    /// Identifier of the new job
    pub job_id: crate::types::JobId,
}

/// Request body for POST /info
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct InfoRequest {
    /// Source URL to probe
    pub url: String,
}
