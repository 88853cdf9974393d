//! Artifact linker
//!
//! Ties a final meditation to every generated audio file and sound clip it
//! was assembled from. Each call inserts fresh rows: linking the same
//! artifacts twice produces duplicate links.

use mantrify_common::Result;
use sqlx::SqlitePool;

/// Number of link rows written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    pub generated_audio: usize,
    pub sound_files: usize,
}

/// Insert one link row per artifact, all in a single transaction
pub async fn link_artifacts(
    pool: &SqlitePool,
    meditation_id: i64,
    generated_audio_ids: &[i64],
    sound_file_ids: &[i64],
) -> Result<LinkSummary> {
    let mut tx = pool.begin().await?;

    for generated_audio_id in generated_audio_ids {
        sqlx::query(
            "INSERT INTO meditation_generated_audio (meditation_id, generated_audio_id) VALUES (?, ?)",
        )
        .bind(meditation_id)
        .bind(generated_audio_id)
        .execute(&mut *tx)
        .await?;
    }

    for sound_file_id in sound_file_ids {
        sqlx::query(
            "INSERT INTO meditation_sound_files (meditation_id, sound_file_id) VALUES (?, ?)",
        )
        .bind(meditation_id)
        .bind(sound_file_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let summary = LinkSummary {
        generated_audio: generated_audio_ids.len(),
        sound_files: sound_file_ids.len(),
    };
    tracing::info!(
        meditation_id,
        generated_audio = summary.generated_audio,
        sound_files = summary.sound_files,
        "Artifacts linked"
    );
    Ok(summary)
}
