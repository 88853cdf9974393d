//! Phase 4: FINALIZING
//!
//! Records the final artifact, links everything it was built from and
//! enters DONE.

use super::{ResolvedClips, SpeechArtifacts, WorkflowOrchestrator};
use crate::db::meditations;
use crate::models::{Job, JobStatus};
use crate::services::artifact_linker::link_artifacts;
use mantrify_common::Result;
use std::path::Path;

impl WorkflowOrchestrator {
    pub(super) async fn phase_finalizing(
        &self,
        job: &mut Job,
        final_path: &Path,
        speech: &SpeechArtifacts,
        clips: &ResolvedClips,
    ) -> Result<()> {
        let meditation =
            meditations::insert_meditation(&self.db, job.user_id, job.id, final_path).await?;

        link_artifacts(&self.db, meditation.id, &speech.ids, &clips.ids).await?;

        self.advance(job, JobStatus::Done).await?;

        tracing::info!(
            job_id = job.id,
            meditation_id = meditation.id,
            title = %meditation.title,
            "Phase 4: FINALIZING complete"
        );
        Ok(())
    }
}
