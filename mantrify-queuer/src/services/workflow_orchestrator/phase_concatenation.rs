//! Phase 3: CONCATENATOR
//!
//! Rebuilds the full ordered sequence from generated speech, resolved clips
//! and pauses, and hands it to the concatenation engine.

use super::{ResolvedClips, SpeechArtifacts, WorkflowOrchestrator};
use crate::models::{Element, ElementKind, Job, JobStatus};
use crate::services::concat_engine;
use crate::services::csv_files::{self, ConcatRow};
use chrono::Utc;
use mantrify_common::{Error, Result};
use std::path::PathBuf;

/// Concatenation rows for the whole script, in order
///
/// Speech without a generated file and unresolved clips are omitted. A
/// speech element's own pause is kept even when its audio is missing.
pub fn build_concat_rows(
    elements: &[Element],
    speech: &SpeechArtifacts,
    clips: &ResolvedClips,
) -> Vec<ConcatRow> {
    let mut rows = Vec::with_capacity(elements.len());

    for (index, element) in elements.iter().enumerate() {
        let pause = element
            .pause_duration
            .as_ref()
            .map(|p| p.raw.clone())
            .unwrap_or_default();

        let audio = match element.kind() {
            ElementKind::Speech => speech
                .by_index
                .get(&index)
                .map(|generated| generated.full_path().to_string_lossy().into_owned()),
            ElementKind::SoundClip => clips
                .by_index
                .get(&index)
                .map(|clip| clip.full_path().to_string_lossy().into_owned()),
            ElementKind::Pause => None,
        };

        if audio.is_none() && pause.is_empty() {
            continue;
        }

        rows.push(ConcatRow {
            id: element.id.clone(),
            audio_file_name_and_path: audio.unwrap_or_default(),
            pause_duration: pause,
        });
    }

    rows
}

impl WorkflowOrchestrator {
    /// Phase 3: enter CONCATENATOR and produce the final file
    pub(super) async fn phase_concatenation(
        &self,
        job: &mut Job,
        elements: &[Element],
        speech: &SpeechArtifacts,
        clips: &ResolvedClips,
    ) -> Result<PathBuf> {
        self.advance(job, JobStatus::Concatenator).await?;

        let rows = build_concat_rows(elements, speech, clips);
        let omitted = elements.len() - rows.len();
        if omitted > 0 {
            tracing::warn!(
                job_id = job.id,
                omitted,
                "Elements without audio omitted from concatenation"
            );
        }
        if rows.is_empty() {
            return Err(Error::process_failure(
                concat_engine::STAGE_NAME,
                "no audio or pauses left to concatenate",
            ));
        }

        let input_csv = csv_files::write_concat_csv(
            &self.config.paths.concat_csv_dir,
            job.id,
            &Utc::now(),
            &rows,
        )?;
        let final_path = self.concatenator.concatenate(&input_csv).await?;

        tracing::info!(
            job_id = job.id,
            rows = rows.len(),
            final_file = %final_path.display(),
            "Phase 3: CONCATENATOR complete"
        );
        Ok(final_path)
    }
}
