//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" or "degraded")
    pub status: String,
    /// Module name ("mantrify-queuer")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Whether a pipeline run is in progress
    pub job_in_flight: bool,
}

/// GET /health
///
/// Reports "degraded" when the job store cannot be read.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let mut last_error = state.last_error.read().await.clone();

    let (status, job_in_flight) = match crate::db::jobs::has_job_in_flight(&state.db).await {
        Ok(in_flight) => ("ok", in_flight),
        Err(e) => {
            last_error = Some(format!("Job store unavailable: {}", e));
            ("degraded", false)
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "mantrify-queuer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        last_error,
        job_in_flight,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
