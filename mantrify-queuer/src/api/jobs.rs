//! Job status endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{JobStage, JobStatus, StatusCounts};
use crate::AppState;

/// Job status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: i64,
    pub user_id: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_reached: Option<JobStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub job_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_file_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// GET /jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<JobResponse>> {
    let job = db::jobs::get_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", job_id)))?;

    let (stage_reached, error) = match &job.status {
        JobStatus::Failed {
            stage_reached,
            cause,
        } => (Some(*stage_reached), Some(cause.clone())),
        _ => (None, None),
    };

    let final_file_path = if job.status == JobStatus::Done {
        db::meditations::find_by_job(&state.db, job.id)
            .await?
            .map(|meditation| meditation.full_path().to_string_lossy().into_owned())
    } else {
        None
    };

    Ok(Json(JobResponse {
        job_id: job.id,
        user_id: job.user_id,
        status: job.status.as_str().to_string(),
        stage_reached,
        error,
        job_filename: job.job_filename,
        final_file_path,
        created_at: job.created_at.to_rfc3339(),
        updated_at: job.updated_at.to_rfc3339(),
    }))
}

/// GET /jobs/counts
pub async fn get_counts(State(state): State<AppState>) -> ApiResult<Json<StatusCounts>> {
    let counts = db::jobs::counts_by_status(&state.db).await?;
    Ok(Json(counts))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/counts", get(get_counts))
        .route("/jobs/:job_id", get(get_job))
}
