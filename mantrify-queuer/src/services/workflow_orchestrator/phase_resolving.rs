//! Phase 1: RESOLVING
//!
//! Reloads the job's elements from its snapshot and resolves sound clip
//! references against the catalog, then enters STARTED.

use super::WorkflowOrchestrator;
use crate::db::sound_files::{self, SoundFile};
use crate::models::{Element, Job, JobStatus};
use crate::services::csv_files;
use crate::services::element_normalizer::normalize_values;
use mantrify_common::Result;
use std::collections::HashMap;

/// Sound clips found in the catalog
#[derive(Debug, Clone, Default)]
pub struct ResolvedClips {
    /// Element position → catalog entry
    pub by_index: HashMap<usize, SoundFile>,
    /// Distinct catalog ids, in first-use order
    pub ids: Vec<i64>,
}

impl WorkflowOrchestrator {
    /// Elements as recorded in the job snapshot
    pub(super) fn load_elements(&self, job: &Job) -> Result<Vec<Element>> {
        let path = csv_files::snapshot_path(&self.config.paths.queuer_dir, &job.job_filename)?;
        let rows = csv_files::read_element_rows(&path)?;
        normalize_values(&rows, "job snapshot")
    }

    /// Phase 1: resolve clips and enter STARTED
    ///
    /// Unknown clip names are logged and dropped from the final audio; they
    /// do not fail the job.
    pub(super) async fn phase_resolving(
        &self,
        job: &mut Job,
        elements: &[Element],
    ) -> Result<ResolvedClips> {
        let mut clips = ResolvedClips::default();

        for (index, element) in elements.iter().enumerate() {
            let Some(name) = element.sound_file.as_deref() else {
                continue;
            };

            match sound_files::find_by_filename(&self.db, name).await? {
                Some(sound_file) => {
                    if !clips.ids.contains(&sound_file.id) {
                        clips.ids.push(sound_file.id);
                    }
                    clips.by_index.insert(index, sound_file);
                }
                None => {
                    tracing::warn!(
                        job_id = job.id,
                        element_id = %element.id,
                        sound_file = name,
                        "Sound file not found in catalog, element will be skipped"
                    );
                }
            }
        }

        tracing::info!(
            job_id = job.id,
            elements = elements.len(),
            sound_clips = clips.by_index.len(),
            "Phase 1: RESOLVING complete"
        );

        self.advance(job, JobStatus::Started).await?;
        Ok(clips)
    }
}
