//! Audio concatenation engine client

use mantrify_common::{Error, Result};
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::services::stage_driver::{parse_marker_paths, StageDriver};
use crate::services::tts_engine::base_name;

pub const STAGE_NAME: &str = "concatenator";

pub struct ConcatEngine {
    engine: EngineConfig,
    driver: StageDriver,
}

impl ConcatEngine {
    pub fn new(engine: EngineConfig) -> Self {
        Self {
            engine,
            driver: StageDriver::new(STAGE_NAME),
        }
    }

    /// Concatenate the sequence described by `input_csv`, returning the final file
    ///
    /// The engine must report its output on a marker line. If it reports
    /// several, the last one is taken.
    pub async fn concatenate(&self, input_csv: &Path) -> Result<PathBuf> {
        let file_name = base_name(input_csv)?;
        let output = self.driver.run(&self.engine.command_for(&file_name)).await;

        if !output.success() {
            return Err(Error::process_failure(STAGE_NAME, output.failure_summary()));
        }

        let mut paths = parse_marker_paths(&output.stdout, &self.engine.output_marker);
        if paths.len() > 1 {
            tracing::warn!(
                reported = paths.len(),
                "Concatenation engine reported several output files, using the last"
            );
        }

        paths.pop().ok_or_else(|| {
            Error::process_failure(STAGE_NAME, "engine exited successfully but reported no output file")
        })
    }
}
