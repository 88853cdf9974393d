//! mantrify-queuer library interface
//!
//! Exposes the pipeline, job store and HTTP router for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tower_http::trace::TraceLayer;

use crate::config::QueuerConfig;
use crate::services::{JobWorker, WorkflowOrchestrator};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<QueuerConfig>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
    /// Wakes the job worker after a submission
    pub worker_notify: Arc<Notify>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Arc<QueuerConfig>) -> Self {
        let orchestrator = Arc::new(WorkflowOrchestrator::new(db.clone(), config.clone()));
        Self {
            db,
            config,
            orchestrator,
            worker_notify: Arc::new(Notify::new()),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Worker sharing this state's orchestrator, wake-up signal and error slot
    pub fn job_worker(&self) -> JobWorker {
        JobWorker::new(
            self.db.clone(),
            self.orchestrator.clone(),
            self.worker_notify.clone(),
            self.last_error.clone(),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::meditation_routes())
        .merge(api::job_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
