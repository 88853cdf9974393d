//! Text-to-speech engine client
//!
//! Drives the external TTS engine over one input file and collects the
//! audio paths it reports, in emission order.

use mantrify_common::{Error, Result};
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::services::stage_driver::{parse_marker_paths, StageDriver};

pub const STAGE_NAME: &str = "elevenlabs";

pub struct TtsEngine {
    engine: EngineConfig,
    driver: StageDriver,
}

impl TtsEngine {
    pub fn new(engine: EngineConfig) -> Self {
        Self {
            engine,
            driver: StageDriver::new(STAGE_NAME),
        }
    }

    /// Synthesize every row of `input_csv`
    ///
    /// The engine receives only the file's base name and locates it in its own
    /// input directory. A non-zero exit is a `ProcessFailure`.
    pub async fn synthesize(&self, input_csv: &Path) -> Result<Vec<PathBuf>> {
        let file_name = base_name(input_csv)?;
        let output = self.driver.run(&self.engine.command_for(&file_name)).await;

        if !output.success() {
            return Err(Error::process_failure(STAGE_NAME, output.failure_summary()));
        }

        let paths = parse_marker_paths(&output.stdout, &self.engine.output_marker);
        tracing::info!(files = paths.len(), "TTS engine reported generated files");
        Ok(paths)
    }
}

pub(crate) fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Internal(format!("Not a file path: {}", path.display())))
}
