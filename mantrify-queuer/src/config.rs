//! Configuration for mantrify-queuer
//!
//! Loaded once at startup from TOML (every section optional) and shared by
//! `Arc`. Nothing below `main` reads the process environment.

use mantrify_common::config::{load_toml_file, resolve_relative};
use mantrify_common::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::services::stage_driver::StageCommand;

/// Marker line through which both engines report a produced file
pub const DEFAULT_OUTPUT_MARKER: &str = "Audio file created successfully:";

/// Complete queuer configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueuerConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub tts: EngineConfig,
    pub concatenator: EngineConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// `[server]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// `[paths]`: relative entries resolve against `root_folder`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root_folder: Option<PathBuf>,
    pub database: PathBuf,
    /// Snapshots (`<YYYYMMDD>/job_user...csv`) and `user_request_csv_files/`
    pub queuer_dir: PathBuf,
    pub tts_csv_dir: PathBuf,
    pub concat_csv_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database: PathBuf::from("mantrify.db"),
            queuer_dir: PathBuf::from("queuer"),
            tts_csv_dir: PathBuf::from("elevenlabs_csv_files"),
            concat_csv_dir: PathBuf::from("audio_concatenator_csv_files"),
        }
    }
}

impl PathsConfig {
    /// Anchor every relative path at `root`
    pub fn resolve_against(&mut self, root: &Path) {
        self.database = resolve_relative(root, &self.database);
        self.queuer_dir = resolve_relative(root, &self.queuer_dir);
        self.tts_csv_dir = resolve_relative(root, &self.tts_csv_dir);
        self.concat_csv_dir = resolve_relative(root, &self.concat_csv_dir);
        self.root_folder = Some(root.to_path_buf());
    }

    /// Directory holding caller-uploaded request files
    pub fn user_request_dir(&self) -> PathBuf {
        self.queuer_dir.join("user_request_csv_files")
    }
}

/// `[tts]` / `[concatenator]`: how to launch an external engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Exported to the engine as `NAME_APP`
    pub app_name: String,
    /// Flag preceding the input file name
    pub file_arg: String,
    pub env: BTreeMap<String, String>,
    pub output_marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["start".to_string(), "--".to_string()],
            working_dir: None,
            app_name: String::new(),
            file_arg: "--file_name".to_string(),
            env: BTreeMap::new(),
            output_marker: DEFAULT_OUTPUT_MARKER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Text-to-speech engine defaults
    pub fn tts_default() -> Self {
        Self {
            app_name: "RequesterElevenLabs01".to_string(),
            ..Self::default()
        }
    }

    /// Concatenation engine defaults
    pub fn concatenator_default() -> Self {
        Self {
            app_name: "AudioFileConcatenator01".to_string(),
            ..Self::default()
        }
    }

    /// Command line for one run over `input_file_name`
    pub fn command_for(&self, input_file_name: &str) -> StageCommand {
        let mut args = self.args.clone();
        if !self.file_arg.is_empty() {
            args.push(self.file_arg.clone());
        }
        args.push(input_file_name.to_string());

        let mut env: Vec<(String, String)> = Vec::with_capacity(self.env.len() + 1);
        if !self.app_name.is_empty() {
            env.push(("NAME_APP".to_string(), self.app_name.clone()));
        }
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        StageCommand {
            program: self.program.clone(),
            args,
            env,
            working_dir: self.working_dir.clone(),
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(Error::Config(format!("[{}] program must not be empty", section)));
        }
        if self.output_marker.trim().is_empty() {
            return Err(Error::Config(format!(
                "[{}] output_marker must not be empty",
                section
            )));
        }
        Ok(())
    }
}

/// What to do when the TTS engine reports a different number of files than
/// there are speech elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Fail the job
    #[default]
    Strict,
    /// Warn, pair what can be paired, drop the rest
    Lenient,
}

/// `[pipeline]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mismatch_policy: MismatchPolicy,
    /// Written for speech elements without a `voice_id`
    pub default_voice_id: String,
    /// Written for speech elements without a `speed`
    pub default_speed: String,
    /// Worker fallback poll interval when no submission wakes it
    pub worker_poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mismatch_policy: MismatchPolicy::Strict,
            default_voice_id: String::new(),
            default_speed: "1.0".to_string(),
            worker_poll_interval_ms: 2000,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Append log output to this file instead of stdout
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl QueuerConfig {
    /// Defaults with engine-specific app names filled in
    pub fn with_defaults() -> Self {
        Self {
            tts: EngineConfig::tts_default(),
            concatenator: EngineConfig::concatenator_default(),
            ..Self::default()
        }
    }

    /// Load from a TOML file
    ///
    /// A missing file is not an error: defaults are used so the service can
    /// start on a fresh machine. A file that exists but does not parse is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::with_defaults());
        };

        if !path.exists() {
            tracing::warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::with_defaults());
        }

        let mut config: QueuerConfig = load_toml_file(path)?;
        if config.tts.app_name.is_empty() {
            config.tts.app_name = EngineConfig::tts_default().app_name;
        }
        if config.concatenator.app_name.is_empty() {
            config.concatenator.app_name = EngineConfig::concatenator_default().app_name;
        }
        Ok(config)
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("[server] port must be non-zero".to_string()));
        }
        self.tts.validate("tts")?;
        self.concatenator.validate("concatenator")?;
        if self.pipeline.worker_poll_interval_ms == 0 {
            return Err(Error::Config(
                "[pipeline] worker_poll_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
