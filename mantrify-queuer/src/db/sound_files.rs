//! Reference sound clip catalog

use mantrify_common::Result;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;

/// Catalogued sound clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundFile {
    pub id: i64,
    /// Unique name elements refer to
    pub filename: String,
    /// Directory holding the file
    pub file_path: String,
    pub description: Option<String>,
}

impl SoundFile {
    /// Full path handed to the concatenation engine
    pub fn full_path(&self) -> PathBuf {
        PathBuf::from(&self.file_path).join(&self.filename)
    }
}

/// Add a clip to the catalog, returning its id
pub async fn register_sound_file(
    pool: &SqlitePool,
    filename: &str,
    file_path: &str,
    description: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO sound_files (filename, file_path, description) VALUES (?, ?, ?)",
    )
    .bind(filename)
    .bind(file_path)
    .bind(description)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Exact-match lookup by filename
pub async fn find_by_filename(pool: &SqlitePool, filename: &str) -> Result<Option<SoundFile>> {
    let row = sqlx::query(
        "SELECT id, filename, file_path, description FROM sound_files WHERE filename = ?",
    )
    .bind(filename)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| SoundFile {
        id: row.get("id"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
        description: row.get("description"),
    }))
}
