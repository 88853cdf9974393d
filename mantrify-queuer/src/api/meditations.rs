//! Meditation submission endpoint
//!
//! Submission validates the script, writes its snapshot, queues the job and
//! returns immediately. Progress is read back through `GET /jobs/:job_id`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::MeditationRequest;
use crate::services::element_normalizer::normalize_request;
use crate::AppState;

/// Response for an accepted submission
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: i64,
    pub status: String,
    pub job_filename: String,
}

/// POST /meditations/new
///
/// 202 with the queued job, 400 on validation failure, 404 when the named
/// request file does not exist.
pub async fn create_meditation(
    State(state): State<AppState>,
    payload: Result<Json<MeditationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let normalized = normalize_request(&request, &state.config.paths.user_request_dir())?;
    let job = state
        .orchestrator
        .enqueue(normalized.user_id, &normalized.elements)
        .await?;

    state.worker_notify.notify_one();

    tracing::info!(
        job_id = job.id,
        user_id = job.user_id,
        elements = normalized.elements.len(),
        "Meditation job queued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: job.id,
            status: job.status.as_str().to_string(),
            job_filename: job.job_filename,
        }),
    ))
}

/// Build submission routes
pub fn meditation_routes() -> Router<AppState> {
    Router::new().route("/meditations/new", post(create_meditation))
}
