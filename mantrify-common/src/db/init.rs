//! Database initialization
//!
//! Opens (creating if needed) the shared SQLite database and idempotently
//! creates every table the queuer reads or writes.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// SQLite busy timeout applied to every pooled connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_jobs_table(pool).await?;
    create_sound_files_table(pool).await?;
    create_generated_audio_table(pool).await?;
    create_meditations_table(pool).await?;

    // Linking tables
    create_meditation_generated_audio_table(pool).await?;
    create_meditation_sound_files_table(pool).await?;

    info!("Database schema verified");
    Ok(())
}

/// Create the jobs table
///
/// One row per submitted script. `status` holds the lifecycle state name;
/// `failed_stage` and `failure_cause` are only set when `status = 'failed'`.
pub async fn create_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL CHECK (user_id > 0),
            status TEXT NOT NULL CHECK (status IN ('queued', 'started', 'elevenlabs', 'concatenator', 'done', 'failed')),
            job_filename TEXT NOT NULL,
            failed_stage TEXT CHECK (failed_stage IS NULL OR failed_stage IN ('queued', 'started', 'elevenlabs', 'concatenator')),
            failure_cause TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at, id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the sound_files table (reference sound clip catalog)
pub async fn create_sound_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sound_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL UNIQUE,
            file_path TEXT NOT NULL,
            description TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the generated_audio table (one row per TTS output file)
pub async fn create_generated_audio_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS generated_audio (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            element_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            file_path TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_generated_audio_job ON generated_audio(job_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the meditations table (final concatenated artifact per job)
pub async fn create_meditations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meditations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            filename TEXT NOT NULL,
            file_path TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_meditations_job ON meditations(job_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_meditations_user ON meditations(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

// Link rows carry their own id: the same pair may be linked twice.
async fn create_meditation_generated_audio_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meditation_generated_audio (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meditation_id INTEGER NOT NULL REFERENCES meditations(id) ON DELETE CASCADE,
            generated_audio_id INTEGER NOT NULL REFERENCES generated_audio(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_meditation_generated_audio_meditation ON meditation_generated_audio(meditation_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_meditation_sound_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meditation_sound_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meditation_id INTEGER NOT NULL REFERENCES meditations(id) ON DELETE CASCADE,
            sound_file_id INTEGER NOT NULL REFERENCES sound_files(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_meditation_sound_files_meditation ON meditation_sound_files(meditation_id)")
        .execute(pool)
        .await?;

    Ok(())
}
