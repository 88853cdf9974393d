//! Meditation pipeline orchestrator
//!
//! Drives one job through its lifecycle:
//! QUEUED → STARTED → ELEVENLABS → CONCATENATOR → DONE
//!
//! Each state is handled by a dedicated `phase_*` method:
//!
//! - **resolving**: reload the snapshot, resolve sound clips, enter STARTED
//! - **speech**: enter ELEVENLABS, synthesize the speech subsequence
//! - **concatenation**: enter CONCATENATOR, reassemble and concatenate
//! - **finalizing**: record the final artifact and links, enter DONE
//!
//! Any error moves the job to FAILED with the last state reached. Nothing is
//! retried and intermediate files are left in place.

use chrono::Utc;
use mantrify_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::QueuerConfig;
use crate::db;
use crate::models::{Element, Job, JobStage, JobStatus, MeditationRequest, WorkflowOutcome};
use crate::services::csv_files;
use crate::services::element_normalizer::normalize_request;
use crate::services::{ConcatEngine, TtsEngine};

mod phase_concatenation;
mod phase_finalizing;
mod phase_resolving;
mod phase_speech;

pub use phase_resolving::ResolvedClips;
pub use phase_speech::SpeechArtifacts;

/// Pipeline orchestrator service
pub struct WorkflowOrchestrator {
    db: SqlitePool,
    config: Arc<QueuerConfig>,
    tts: TtsEngine,
    concatenator: ConcatEngine,
    /// Held for the whole of a run so engine pairs never overlap
    run_lock: Mutex<()>,
}

impl WorkflowOrchestrator {
    pub fn new(db: SqlitePool, config: Arc<QueuerConfig>) -> Self {
        Self {
            tts: TtsEngine::new(config.tts.clone()),
            concatenator: ConcatEngine::new(config.concatenator.clone()),
            db,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &QueuerConfig {
        &self.config
    }

    /// Write the job snapshot, then create the job in status QUEUED
    ///
    /// The snapshot is written first so every job row points at an existing file.
    pub async fn enqueue(&self, user_id: i64, elements: &[Element]) -> Result<Job> {
        let snapshot = csv_files::write_job_snapshot(
            &self.config.paths.queuer_dir,
            user_id,
            &Utc::now(),
            elements,
        )?;
        let job_filename = snapshot
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Internal("Snapshot path has no file name".to_string()))?;

        db::jobs::create_job(&self.db, user_id, &job_filename).await
    }

    /// Validate, enqueue and run a request to completion
    ///
    /// For synchronous callers; the HTTP service enqueues and leaves the run
    /// to the job worker. Validation problems are returned as `Err` because
    /// no job exists yet.
    pub async fn process(&self, request: &MeditationRequest) -> Result<WorkflowOutcome> {
        let normalized = normalize_request(request, &self.config.paths.user_request_dir())?;
        let job = self.enqueue(normalized.user_id, &normalized.elements).await?;
        Ok(self.run_job(job).await)
    }

    /// Run a queued job through every stage
    ///
    /// The job is re-read once the run lock is held; a job that is no longer
    /// queued was taken by another run and is skipped.
    pub async fn run_job(&self, job: Job) -> WorkflowOutcome {
        let _guard = self.run_lock.lock().await;
        let start_time = std::time::Instant::now();

        let mut job = match db::jobs::get_job(&self.db, job.id).await {
            Ok(Some(current)) if current.status == JobStatus::Queued => current,
            Ok(Some(current)) => {
                tracing::info!(
                    job_id = current.id,
                    status = current.status.as_str(),
                    "Job is no longer queued, skipping"
                );
                return WorkflowOutcome::Skipped {
                    job_id: current.id,
                    status: current.status,
                };
            }
            Ok(None) => {
                return WorkflowOutcome::Failed {
                    job_id: job.id,
                    stage_reached: JobStage::Queued,
                    error: Error::NotFound(format!("Job {} not found", job.id)),
                };
            }
            Err(error) => {
                tracing::error!(job_id = job.id, error = %error, "Failed to reload job");
                return WorkflowOutcome::Failed {
                    job_id: job.id,
                    stage_reached: JobStage::Queued,
                    error,
                };
            }
        };

        tracing::info!(
            job_id = job.id,
            user_id = job.user_id,
            job_filename = %job.job_filename,
            "Starting pipeline run"
        );

        match self.execute(&mut job).await {
            Ok(final_file_path) => {
                tracing::info!(
                    job_id = job.id,
                    final_file = %final_file_path.display(),
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Pipeline run completed"
                );
                WorkflowOutcome::Completed {
                    job_id: job.id,
                    final_file_path,
                }
            }
            Err(error) => {
                let stage_reached = self.record_failure(&mut job, &error).await;
                WorkflowOutcome::Failed {
                    job_id: job.id,
                    stage_reached,
                    error,
                }
            }
        }
    }

    async fn execute(&self, job: &mut Job) -> Result<PathBuf> {
        let elements = self.load_elements(job)?;
        let clips = self.phase_resolving(job, &elements).await?;
        let speech = self.phase_speech(job, &elements).await?;
        let final_path = self
            .phase_concatenation(job, &elements, &speech, &clips)
            .await?;
        self.phase_finalizing(job, &final_path, &speech, &clips)
            .await?;
        Ok(final_path)
    }

    /// Apply a lifecycle transition, persisting it before updating `job`
    async fn advance(&self, job: &mut Job, next: JobStatus) -> Result<()> {
        let mut updated = job.clone();
        let transition = updated.transition_to(next)?;
        db::jobs::set_status(&self.db, job.id, &updated.status).await?;

        tracing::info!(
            job_id = job.id,
            from = transition.old_status.as_str(),
            to = transition.new_status.as_str(),
            "Job status changed"
        );
        *job = updated;
        Ok(())
    }

    /// Move the job to FAILED, returning the stage it had reached
    async fn record_failure(&self, job: &mut Job, error: &Error) -> JobStage {
        let stage_reached = job.status.stage().unwrap_or(JobStage::Queued);

        tracing::error!(
            job_id = job.id,
            stage_reached = %stage_reached,
            error = %error,
            "Pipeline run failed"
        );

        let failed = JobStatus::Failed {
            stage_reached,
            cause: error.to_string(),
        };
        if let Err(e) = self.advance(job, failed).await {
            tracing::error!(
                job_id = job.id,
                error = %e,
                "Failed to record job failure"
            );
        }

        stage_reached
    }
}
