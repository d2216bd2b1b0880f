//! Metadata probe handler.

use super::InfoRequest;
use crate::api::AppState;
use crate::error::Error;
use axum::{Json, extract::State};

/// POST /info - Probe media metadata
///
/// Walks the credential contexts like a job does and shares the same cache.
#[utoipa::path(
    post,
    path = "/info",
    tag = "info",
    request_body = InfoRequest,
    responses(
        (status = 200, description = "Media metadata", body = crate::types::MediaInfo),
        (status = 400, description = "Invalid source URL", body = crate::error::ApiError),
        (status = 502, description = "Every credential context failed", body = crate::error::ApiError)
    )
)]
pub async fn fetch_info(
    State(state): State<AppState>,
    Json(request): Json<InfoRequest>,
) -> Result<Json<crate::types::MediaInfo>, Error> {
    let info = state.downloader.fetch_info(&request.url).await?;
    Ok(Json(info))
}
