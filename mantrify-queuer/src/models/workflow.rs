//! Orchestrator boundary types

use super::{JobStage, JobStatus};
use mantrify_common::Error;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

/// Body of `POST /meditations/new`
///
/// Fields are kept loosely typed so that every shape problem is reported
/// through the validation error rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationRequest {
    #[serde(default)]
    pub user_id: Option<Value>,
    /// Name of an uploaded file in `<queuer_dir>/user_request_csv_files/`
    #[serde(default)]
    pub filename_csv: Option<Value>,
    /// Inline element list
    #[serde(default)]
    pub meditation_array: Option<Value>,
}

impl MeditationRequest {
    pub fn from_csv(user_id: i64, filename_csv: impl Into<String>) -> Self {
        Self {
            user_id: Some(Value::from(user_id)),
            filename_csv: Some(Value::String(filename_csv.into())),
            meditation_array: None,
        }
    }

    pub fn from_array(user_id: i64, meditation_array: Value) -> Self {
        Self {
            user_id: Some(Value::from(user_id)),
            filename_csv: None,
            meditation_array: Some(meditation_array),
        }
    }
}

/// Result of running one job through the pipeline
#[derive(Debug)]
pub enum WorkflowOutcome {
    Completed {
        job_id: i64,
        final_file_path: PathBuf,
    },
    Failed {
        job_id: i64,
        stage_reached: JobStage,
        error: Error,
    },
    /// Another run already took the job; `status` is what it found
    Skipped { job_id: i64, status: JobStatus },
}

impl WorkflowOutcome {
    pub fn job_id(&self) -> i64 {
        match self {
            WorkflowOutcome::Completed { job_id, .. }
            | WorkflowOutcome::Failed { job_id, .. }
            | WorkflowOutcome::Skipped { job_id, .. } => *job_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed { .. })
    }
}
