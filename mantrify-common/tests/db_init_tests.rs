//! Integration tests for database initialization
//!
//! Covers first-run creation, reopening an existing file, and idempotent
//! schema creation for every table the queuer uses.

use mantrify_common::db::{create_schema, init_database};
use tempfile::TempDir;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("mantrify.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("mantrify.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO sound_files (filename, file_path) VALUES ('bell.mp3', '/clips')",
    )
    .execute(&pool1)
    .await
    .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sound_files")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows must survive reopening");
}

#[tokio::test]
async fn test_all_tables_created() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mantrify.db"))
        .await
        .unwrap();

    let tables = table_names(&pool).await;
    for expected in [
        "generated_audio",
        "jobs",
        "meditation_generated_audio",
        "meditation_sound_files",
        "meditations",
        "sound_files",
    ] {
        assert!(
            tables.iter().any(|t| t == expected),
            "Missing table {} in {:?}",
            expected,
            tables
        );
    }
}

#[tokio::test]
async fn test_create_schema_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mantrify.db"))
        .await
        .unwrap();

    let before = table_names(&pool).await;
    create_schema(&pool).await.unwrap();
    create_schema(&pool).await.unwrap();
    let after = table_names(&pool).await;

    assert_eq!(before, after);
}

#[tokio::test]
async fn test_jobs_status_constraint_rejects_unknown_status() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mantrify.db"))
        .await
        .unwrap();

    let result = sqlx::query(
        "INSERT INTO jobs (user_id, status, job_filename, created_at, updated_at)
         VALUES (1, 'paused', 'job.csv', '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Unknown status must violate the CHECK constraint");
}

#[tokio::test]
async fn test_sound_file_filename_is_unique() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mantrify.db"))
        .await
        .unwrap();

    sqlx::query("INSERT INTO sound_files (filename, file_path) VALUES ('rain.mp3', '/a')")
        .execute(&pool)
        .await
        .unwrap();
    let duplicate =
        sqlx::query("INSERT INTO sound_files (filename, file_path) VALUES ('rain.mp3', '/b')")
            .execute(&pool)
            .await;

    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mantrify.db"))
        .await
        .unwrap();

    // No job 999 exists
    let result = sqlx::query(
        "INSERT INTO generated_audio (job_id, element_id, filename, file_path, text)
         VALUES (999, '1', 'a.mp3', '/out', 'hello')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
