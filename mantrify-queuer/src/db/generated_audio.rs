//! Generated audio records (one per TTS output file)

use mantrify_common::Result;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

/// Stored TTS output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAudio {
    pub id: i64,
    pub job_id: i64,
    /// Id of the speech element it was synthesized from
    pub element_id: String,
    pub filename: String,
    pub file_path: String,
    pub text: String,
}

impl GeneratedAudio {
    pub fn full_path(&self) -> PathBuf {
        PathBuf::from(&self.file_path).join(&self.filename)
    }
}

/// Split a reported path into (directory, file name)
fn split_path(path: &Path) -> (String, String) {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, filename)
}

/// Record one generated file
pub async fn insert_generated_audio(
    pool: &SqlitePool,
    job_id: i64,
    element_id: &str,
    path: &Path,
    text: &str,
) -> Result<GeneratedAudio> {
    let (file_path, filename) = split_path(path);

    let result = sqlx::query(
        r#"
        INSERT INTO generated_audio (job_id, element_id, filename, file_path, text)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(job_id)
    .bind(element_id)
    .bind(&filename)
    .bind(&file_path)
    .bind(text)
    .execute(pool)
    .await?;

    Ok(GeneratedAudio {
        id: result.last_insert_rowid(),
        job_id,
        element_id: element_id.to_string(),
        filename,
        file_path,
        text: text.to_string(),
    })
}

/// All files generated for a job, in insertion order
pub async fn list_for_job(pool: &SqlitePool, job_id: i64) -> Result<Vec<GeneratedAudio>> {
    let rows = sqlx::query(
        r#"
        SELECT id, job_id, element_id, filename, file_path, text
        FROM generated_audio
        WHERE job_id = ?
        ORDER BY id
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| GeneratedAudio {
            id: row.get("id"),
            job_id: row.get("job_id"),
            element_id: row.get("element_id"),
            filename: row.get("filename"),
            file_path: row.get("file_path"),
            text: row.get("text"),
        })
        .collect())
}
