//! Phase 2: ELEVENLABS
//!
//! Sends the ordered speech subsequence to the TTS engine and pairs the
//! reported files with speech elements by position: the Nth reported path
//! belongs to the Nth speech element.

use super::WorkflowOrchestrator;
use crate::config::MismatchPolicy;
use crate::db::generated_audio::{self, GeneratedAudio};
use crate::models::element::speech_elements;
use crate::models::{Element, Job, JobStatus};
use crate::services::csv_files::{self, TtsRow};
use crate::services::tts_engine;
use chrono::Utc;
use mantrify_common::{Error, Result};
use std::collections::HashMap;

/// Generated audio per speech element
#[derive(Debug, Clone, Default)]
pub struct SpeechArtifacts {
    /// Element position → stored artifact
    pub by_index: HashMap<usize, GeneratedAudio>,
    /// Stored artifact ids in script order
    pub ids: Vec<i64>,
}

impl WorkflowOrchestrator {
    /// Phase 2: enter ELEVENLABS and synthesize speech
    pub(super) async fn phase_speech(
        &self,
        job: &mut Job,
        elements: &[Element],
    ) -> Result<SpeechArtifacts> {
        self.advance(job, JobStatus::Elevenlabs).await?;

        let speech = speech_elements(elements);
        if speech.is_empty() {
            tracing::info!(job_id = job.id, "No speech elements, skipping TTS engine");
            return Ok(SpeechArtifacts::default());
        }

        let pipeline = &self.config.pipeline;
        let rows: Vec<TtsRow> = speech
            .iter()
            .map(|(_, element)| TtsRow {
                id: element.id.clone(),
                text: element.text.clone().unwrap_or_default(),
                voice_id: element
                    .voice_id
                    .clone()
                    .unwrap_or_else(|| pipeline.default_voice_id.clone()),
                speed: element
                    .speed
                    .as_ref()
                    .map(|speed| speed.raw.clone())
                    .unwrap_or_else(|| pipeline.default_speed.clone()),
            })
            .collect();

        let input_csv =
            csv_files::write_tts_csv(&self.config.paths.tts_csv_dir, job.id, &Utc::now(), &rows)?;
        let paths = self.tts.synthesize(&input_csv).await?;

        if paths.len() != speech.len() {
            let message = format!(
                "TTS engine reported {} files for {} speech elements",
                paths.len(),
                speech.len()
            );
            match pipeline.mismatch_policy {
                MismatchPolicy::Strict => {
                    return Err(Error::process_failure(tts_engine::STAGE_NAME, message));
                }
                MismatchPolicy::Lenient => {
                    tracing::warn!(
                        job_id = job.id,
                        "{}; pairing by position and dropping the remainder",
                        message
                    );
                }
            }
        }

        let mut artifacts = SpeechArtifacts::default();
        for ((index, element), path) in speech.iter().zip(paths.iter()) {
            let stored = generated_audio::insert_generated_audio(
                &self.db,
                job.id,
                &element.id,
                path,
                element.text.as_deref().unwrap_or_default(),
            )
            .await?;
            artifacts.ids.push(stored.id);
            artifacts.by_index.insert(*index, stored);
        }

        tracing::info!(
            job_id = job.id,
            speech_elements = speech.len(),
            generated = artifacts.ids.len(),
            "Phase 2: ELEVENLABS complete"
        );
        Ok(artifacts)
    }
}
