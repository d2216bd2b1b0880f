//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the media-dl REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "Start, follow and cancel media fetch jobs driven by an external downloader tool",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::start_job,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::cancel_job,
        crate::api::routes::job_events,

        // Metadata
        crate::api::routes::fetch_info,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::JobId,
        crate::types::JobInfo,
        crate::types::JobStatus,
        crate::types::TargetKind,
        crate::types::ProgressEvent,
        crate::types::TerminalEvent,
        crate::types::Outcome,
        crate::types::MediaInfo,

        // Config types from config.rs
        crate::config::Config,
        crate::config::ToolConfig,
        crate::config::FetchConfig,
        crate::config::ApiConfig,

        // API request/response types from routes
        crate::api::routes::StartJobRequest,
        crate::api::routes::StartJobResponse,
        crate::api::routes::InfoRequest,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Jobs - Start, list, follow and cancel fetch jobs"),
        (name = "info", description = "Metadata - Probe title, thumbnail, duration and channel"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
