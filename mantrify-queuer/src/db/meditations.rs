//! Final concatenated artifacts and their link rows

use mantrify_common::Result;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

/// Stored final artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meditation {
    pub id: i64,
    pub job_id: i64,
    pub user_id: i64,
    /// File stem of the final audio
    pub title: String,
    pub filename: String,
    pub file_path: String,
}

impl Meditation {
    pub fn full_path(&self) -> PathBuf {
        PathBuf::from(&self.file_path).join(&self.filename)
    }
}

/// Record the final artifact of a job
pub async fn insert_meditation(
    pool: &SqlitePool,
    user_id: i64,
    job_id: i64,
    final_path: &Path,
) -> Result<Meditation> {
    let filename = final_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = final_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.clone());
    let file_path = final_path
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = sqlx::query(
        r#"
        INSERT INTO meditations (job_id, user_id, title, filename, file_path)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(job_id)
    .bind(user_id)
    .bind(&title)
    .bind(&filename)
    .bind(&file_path)
    .execute(pool)
    .await?;

    Ok(Meditation {
        id: result.last_insert_rowid(),
        job_id,
        user_id,
        title,
        filename,
        file_path,
    })
}

/// Final artifact of a job, if it completed
pub async fn find_by_job(pool: &SqlitePool, job_id: i64) -> Result<Option<Meditation>> {
    let row = sqlx::query(
        r#"
        SELECT id, job_id, user_id, title, filename, file_path
        FROM meditations
        WHERE job_id = ?
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Meditation {
        id: row.get("id"),
        job_id: row.get("job_id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
    }))
}

/// Number of generated audio links for a meditation
pub async fn count_generated_links(pool: &SqlitePool, meditation_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM meditation_generated_audio WHERE meditation_id = ?",
    )
    .bind(meditation_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Number of sound clip links for a meditation
pub async fn count_sound_file_links(pool: &SqlitePool, meditation_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM meditation_sound_files WHERE meditation_id = ?",
    )
    .bind(meditation_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
