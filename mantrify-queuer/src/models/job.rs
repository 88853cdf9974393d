//! Job lifecycle state machine
//!
//! A job progresses through five ordered lifecycle states:
//! QUEUED → STARTED → ELEVENLABS → CONCATENATOR → DONE
//!
//! Any non-terminal state may instead move to FAILED, which remembers the
//! last lifecycle state reached and the cause.

use chrono::{DateTime, Utc};
use mantrify_common::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Ordered lifecycle state (everything except failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    /// Snapshot written, waiting for the worker
    Queued,
    /// Picked up by the worker, sound clips resolved
    Started,
    /// Text-to-speech engine running
    Elevenlabs,
    /// Concatenation engine running
    Concatenator,
    /// Final artifact recorded
    Done,
}

impl JobStage {
    pub const ALL: [JobStage; 5] = [
        JobStage::Queued,
        JobStage::Started,
        JobStage::Elevenlabs,
        JobStage::Concatenator,
        JobStage::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Queued => "queued",
            JobStage::Started => "started",
            JobStage::Elevenlabs => "elevenlabs",
            JobStage::Concatenator => "concatenator",
            JobStage::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == value)
    }

    /// Next lifecycle state, `None` after DONE
    pub fn next(&self) -> Option<Self> {
        match self {
            JobStage::Queued => Some(JobStage::Started),
            JobStage::Started => Some(JobStage::Elevenlabs),
            JobStage::Elevenlabs => Some(JobStage::Concatenator),
            JobStage::Concatenator => Some(JobStage::Done),
            JobStage::Done => None,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current job status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Started,
    Elevenlabs,
    Concatenator,
    Done,
    /// Terminal failure, remembering where the pipeline stopped
    Failed {
        stage_reached: JobStage,
        cause: String,
    },
}

impl JobStatus {
    /// Status name as stored in `jobs.status`
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Failed { .. } => "failed",
            other => other.stage().map(|s| s.as_str()).unwrap_or("failed"),
        }
    }

    /// Lifecycle stage, `None` for FAILED
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            JobStatus::Queued => Some(JobStage::Queued),
            JobStatus::Started => Some(JobStage::Started),
            JobStatus::Elevenlabs => Some(JobStage::Elevenlabs),
            JobStatus::Concatenator => Some(JobStage::Concatenator),
            JobStatus::Done => Some(JobStage::Done),
            JobStatus::Failed { .. } => None,
        }
    }

    pub fn from_stage(stage: JobStage) -> Self {
        match stage {
            JobStage::Queued => JobStatus::Queued,
            JobStage::Started => JobStatus::Started,
            JobStage::Elevenlabs => JobStatus::Elevenlabs,
            JobStage::Concatenator => JobStatus::Concatenator,
            JobStage::Done => JobStatus::Done,
        }
    }

    /// Rebuild a status from its stored columns
    pub fn from_columns(
        status: &str,
        failed_stage: Option<&str>,
        failure_cause: Option<&str>,
    ) -> Result<Self> {
        if status == "failed" {
            let stage_reached = failed_stage
                .and_then(JobStage::parse)
                .unwrap_or(JobStage::Queued);
            return Ok(JobStatus::Failed {
                stage_reached,
                cause: failure_cause.unwrap_or_default().to_string(),
            });
        }

        JobStage::parse(status)
            .map(JobStatus::from_stage)
            .ok_or_else(|| Error::Internal(format!("Unknown job status in database: {}", status)))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed { .. })
    }

    /// Whether `next` is a legal successor of this status
    ///
    /// Lifecycle states only advance one step at a time. FAILED is reachable
    /// from any non-terminal state, and must record that state as reached.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        let Some(current) = self.stage() else {
            return false;
        };
        if current == JobStage::Done {
            return false;
        }

        match next {
            JobStatus::Failed { stage_reached, .. } => *stage_reached == current,
            other => other.stage() == current.next(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Failed {
                stage_reached,
                cause,
            } => write!(f, "failed at {}: {}", stage_reached, cause),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Record of one status change
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub job_id: i64,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Persisted pipeline job
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Store-assigned identifier
    pub id: i64,
    pub user_id: i64,
    pub status: JobStatus,
    /// Snapshot file name under `<queuer_dir>/<YYYYMMDD>/`
    pub job_filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Transition to new status, rejecting moves the lifecycle does not allow
    pub fn transition_to(&mut self, new_status: JobStatus) -> Result<StateTransition> {
        if !self.status.can_transition_to(&new_status) {
            return Err(Error::Internal(format!(
                "Illegal job status transition for job {}: {} -> {}",
                self.id,
                self.status.as_str(),
                new_status.as_str()
            )));
        }

        let now = Utc::now();
        let transition = StateTransition {
            job_id: self.id,
            old_status: self.status.clone(),
            new_status: new_status.clone(),
            transitioned_at: now,
        };
        self.status = new_status;
        self.updated_at = now;

        Ok(transition)
    }
}

/// Number of jobs per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: i64,
    pub started: i64,
    pub elevenlabs: i64,
    pub concatenator: i64,
    pub done: i64,
    pub failed: i64,
    pub total: i64,
}

impl StatusCounts {
    /// Add `count` jobs under the stored status name
    pub fn record(&mut self, status: &str, count: i64) {
        match status {
            "queued" => self.queued += count,
            "started" => self.started += count,
            "elevenlabs" => self.elevenlabs += count,
            "concatenator" => self.concatenator += count,
            "done" => self.done += count,
            "failed" => self.failed += count,
            _ => {}
        }
        self.total += count;
    }
}
