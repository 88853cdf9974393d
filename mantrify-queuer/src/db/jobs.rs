//! Job state store
//!
//! Persists jobs and their status. The store records whatever status it is
//! given; lifecycle ordering is enforced by the orchestrator.

use chrono::{DateTime, SecondsFormat, Utc};
use mantrify_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Job, JobStage, JobStatus, StatusCounts};
use crate::utils::retry_on_lock;

/// Longest time a status write waits out a locked database
pub const LOCK_WAIT_MS: u64 = 5000;

/// Cause recorded for jobs abandoned by a previous process
pub const INTERRUPTED_CAUSE: &str = "interrupted by restart";

const JOB_COLUMNS: &str =
    "id, user_id, status, failed_stage, failure_cause, job_filename, created_at, updated_at";

/// Fixed-width UTC timestamp so stored values sort chronologically as text
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let status: String = row.get("status");
    let failed_stage: Option<String> = row.get("failed_stage");
    let failure_cause: Option<String> = row.get("failure_cause");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Job {
        id: row.get("id"),
        user_id: row.get("user_id"),
        status: JobStatus::from_columns(
            &status,
            failed_stage.as_deref(),
            failure_cause.as_deref(),
        )?,
        job_filename: row.get("job_filename"),
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

/// Insert a new job in status `queued`
pub async fn create_job(pool: &SqlitePool, user_id: i64, job_filename: &str) -> Result<Job> {
    let now = Utc::now();
    let stamp = timestamp(&now);

    let id = retry_on_lock("create_job", LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (user_id, status, job_filename, created_at, updated_at)
            VALUES (?, 'queued', ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(job_filename)
        .bind(&stamp)
        .bind(&stamp)
        .execute(pool)
        .await?;
        Ok::<_, Error>(result.last_insert_rowid())
    })
    .await?;

    tracing::info!(job_id = id, user_id, job_filename, "Job created");

    // Reload so the timestamps match their stored (millisecond) precision
    get_job(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Job {} vanished after insert", id)))
}

/// Load a job by id
pub async fn get_job(pool: &SqlitePool, job_id: i64) -> Result<Option<Job>> {
    let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Persist a job's status
///
/// Returns `NotFound` when no job has this id.
pub async fn set_status(pool: &SqlitePool, job_id: i64, status: &JobStatus) -> Result<()> {
    let (failed_stage, failure_cause) = match status {
        JobStatus::Failed {
            stage_reached,
            cause,
        } => (Some(stage_reached.as_str()), Some(cause.as_str())),
        _ => (None, None),
    };
    let status_name = status.as_str();
    let updated_at = timestamp(&Utc::now());

    let rows_affected = retry_on_lock("set_status", LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, failed_stage = ?, failure_cause = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status_name)
        .bind(failed_stage)
        .bind(failure_cause)
        .bind(&updated_at)
        .bind(job_id)
        .execute(pool)
        .await?;
        Ok::<_, Error>(result.rows_affected())
    })
    .await?;

    if rows_affected == 0 {
        return Err(Error::NotFound(format!("Job {} not found", job_id)));
    }

    tracing::debug!(job_id, status = status_name, "Job status updated");
    Ok(())
}

/// Oldest queued job (creation time, then id)
pub async fn next_queued(pool: &SqlitePool) -> Result<Option<Job>> {
    let sql = format!(
        "SELECT {} FROM jobs WHERE status = 'queued' ORDER BY created_at ASC, id ASC LIMIT 1",
        JOB_COLUMNS
    );
    let row = sqlx::query(&sql).fetch_optional(pool).await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Job count for every status, plus the total
pub async fn counts_by_status(pool: &SqlitePool) -> Result<StatusCounts> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM jobs GROUP BY status")
        .fetch_all(pool)
        .await?;

    let mut counts = StatusCounts::default();
    for row in rows {
        let status: String = row.get("status");
        let count: i64 = row.get("count");
        counts.record(&status, count);
    }
    Ok(counts)
}

/// Whether any job is currently between pickup and a terminal status
pub async fn has_job_in_flight(pool: &SqlitePool) -> Result<bool> {
    let in_flight: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM jobs WHERE status IN ('started', 'elevenlabs', 'concatenator')",
    )
    .fetch_one(pool)
    .await?;

    Ok(in_flight > 0)
}

/// Fail jobs a previous process left mid-pipeline
///
/// Called once at startup, before the worker runs, so any in-flight status
/// found here belongs to a dead process. Returns the number of jobs failed.
pub async fn fail_interrupted_jobs(pool: &SqlitePool) -> Result<usize> {
    let sql = format!(
        "SELECT {} FROM jobs WHERE status IN ('started', 'elevenlabs', 'concatenator') ORDER BY id",
        JOB_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let mut failed = 0;
    for row in &rows {
        let job = job_from_row(row)?;
        let stage_reached = job.status.stage().unwrap_or(JobStage::Queued);
        set_status(
            pool,
            job.id,
            &JobStatus::Failed {
                stage_reached,
                cause: INTERRUPTED_CAUSE.to_string(),
            },
        )
        .await?;
        tracing::warn!(
            job_id = job.id,
            stage_reached = %stage_reached,
            "Failed job interrupted by restart"
        );
        failed += 1;
    }

    Ok(failed)
}
