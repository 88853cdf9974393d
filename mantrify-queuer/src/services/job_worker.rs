//! Single-flight job worker
//!
//! The only task that runs pipelines. It takes the oldest queued job, runs
//! it to a terminal status, and repeats. When the queue is empty it sleeps
//! until a submission wakes it or the poll interval elapses. Shutdown is
//! honoured between jobs, never during one.

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;

use crate::db;
use crate::models::{JobStatus, WorkflowOutcome};
use crate::services::WorkflowOrchestrator;

/// Background worker draining the job queue in FIFO order
pub struct JobWorker {
    db: SqlitePool,
    orchestrator: Arc<WorkflowOrchestrator>,
    notify: Arc<Notify>,
    poll_interval: Duration,
    last_error: Arc<RwLock<Option<String>>>,
}

impl JobWorker {
    pub fn new(
        db: SqlitePool,
        orchestrator: Arc<WorkflowOrchestrator>,
        notify: Arc<Notify>,
        last_error: Arc<RwLock<Option<String>>>,
    ) -> Self {
        let poll_interval =
            Duration::from_millis(orchestrator.config().pipeline.worker_poll_interval_ms);
        Self {
            db,
            orchestrator,
            notify,
            poll_interval,
            last_error,
        }
    }

    /// Run until `cancel_token` fires
    pub async fn run(self, cancel_token: CancellationToken) {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Job worker started"
        );

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            match self.run_next().await {
                Ok(Some(outcome)) => {
                    if !self.is_stuck(&outcome).await {
                        continue;
                    }
                    tracing::warn!(
                        job_id = outcome.job_id(),
                        "Job still queued after failure, backing off"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Failed to fetch next queued job");
                    self.remember_error(format!("Job queue unavailable: {}", e))
                        .await;
                }
            }

            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = self.notify.notified() => {
                    tracing::debug!("Job worker woken by submission");
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!("Job worker stopped");
    }

    /// Run the oldest queued job, if any
    pub async fn run_next(&self) -> mantrify_common::Result<Option<WorkflowOutcome>> {
        let Some(job) = db::jobs::next_queued(&self.db).await? else {
            return Ok(None);
        };

        let outcome = self.orchestrator.run_job(job).await;
        if let WorkflowOutcome::Failed {
            job_id,
            stage_reached,
            error,
        } = &outcome
        {
            self.remember_error(format!(
                "Job {} failed at {}: {}",
                job_id, stage_reached, error
            ))
            .await;
        }
        Ok(Some(outcome))
    }

    /// Run queued jobs until none remain, returning their outcomes in order
    ///
    /// Stops early when a failed job could not be moved out of the queue.
    pub async fn drain(&self) -> mantrify_common::Result<Vec<WorkflowOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.run_next().await? {
            let stuck = self.is_stuck(&outcome).await;
            outcomes.push(outcome);
            if stuck {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Whether a failed job is still at the head of the queue
    ///
    /// Happens when the failure itself could not be recorded. Running the
    /// job again straight away would spin on the same error.
    async fn is_stuck(&self, outcome: &WorkflowOutcome) -> bool {
        let WorkflowOutcome::Failed { job_id, .. } = outcome else {
            return false;
        };
        match db::jobs::get_job(&self.db, *job_id).await {
            Ok(Some(job)) => job.status == JobStatus::Queued,
            Ok(None) => false,
            Err(_) => true,
        }
    }

    async fn remember_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}
