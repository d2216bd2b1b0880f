//! Job handlers.

use super::{StartJobRequest, StartJobResponse};
use crate::api::AppState;
use crate::error::Error;
use crate::types::{JobId, TargetKind};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;

/// POST /jobs - Start a job
#[utoipa::path(
    post,
    path = "/jobs",
    tag = "jobs",
    request_body = StartJobRequest,
    responses(
        (status = 202, description = "Job accepted", body = StartJobResponse),
        (status = 400, description = "Invalid source URL", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_job(
    State(state): State<AppState>,
    Json(request): Json<StartJobRequest>,
) -> Result<Response, Error> {
    let kind = TargetKind::from_format(request.format.as_deref());
    let job_id = state.downloader.start_job(kind, &request.url).await?;

    Ok((StatusCode::ACCEPTED, Json(StartJobResponse { job_id })).into_response())
}

/// GET /jobs - List live jobs
#[utoipa::path(
    get,
    path = "/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "All jobs that have not been evicted, oldest first", body = Vec<crate::types::JobInfo>)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.list_jobs().await)
}

/// GET /jobs/:id - Get a job snapshot
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = crate::types::JobInfo),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Response, Error> {
    let job = state.downloader.get_job(id).await?;
    Ok(Json(job).into_response())
}

/// DELETE /jobs/:id - Cancel a job
///
/// Returns once the job has settled. Cancelling a finished job is accepted and
/// changes nothing.
#[utoipa::path(
    delete,
    path = "/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 202, description = "Cancellation accepted"),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Response, Error> {
    state.downloader.cancel_job(id).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "job_id": id, "cancelled": true }))).into_response())
}

/// GET /jobs/:id/events - Server-sent events for one job
///
/// Opens with a `connected` event, then sends `progress`, `retrying` and finally
/// `complete`, after which the stream ends.
#[utoipa::path(
    get,
    path = "/jobs/{id}/events",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, Error> {
    let subscription = state.downloader.attach_observer(id).await?;
    tracing::debug!(job_id = %id, "SSE client attached");

    let connected = SseEvent::default()
        .event("connected")
        .data(json!({ "job_id": id }).to_string());

    let events = subscription.into_stream().filter_map(move |event| {
        futures::future::ready(match serde_json::to_string(&event) {
            Ok(data) => Some(SseEvent::default().event(event.event_name()).data(data)),
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Failed to serialize event to JSON");
                None
            }
        })
    });

    let stream = futures::stream::once(futures::future::ready(connected))
        .chain(events)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
