//! Test Helper Utilities
//!
//! Shared utilities for testing mantrify-queuer: an isolated root folder
//! with its own database, and shell-script stand-ins for the external
//! engines (unix only).

#![allow(dead_code)]

pub mod fake_engines;

pub use fake_engines::FakeTts;

use mantrify_queuer::config::{MismatchPolicy, QueuerConfig};
use mantrify_queuer::services::WorkflowOrchestrator;
use mantrify_queuer::AppState;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Isolated service environment rooted in a temp directory
///
/// The TempDir must be kept alive for the duration of the test.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config: Arc<QueuerConfig>,
    pub db: SqlitePool,
}

impl TestEnv {
    /// Environment with a well-behaved TTS engine and strict matching
    pub async fn new() -> Self {
        Self::with(FakeTts::Normal, MismatchPolicy::Strict).await
    }

    pub async fn with(tts: FakeTts, policy: MismatchPolicy) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();

        let mut config = QueuerConfig::with_defaults();
        config.paths.resolve_against(&root);
        config.pipeline.mismatch_policy = policy;
        config.pipeline.worker_poll_interval_ms = 50;

        for dir in [
            config.paths.queuer_dir.clone(),
            config.paths.user_request_dir(),
            config.paths.tts_csv_dir.clone(),
            config.paths.concat_csv_dir.clone(),
            root.join("captured_tts"),
            root.join("captured_concat"),
            root.join("audio_out"),
        ] {
            std::fs::create_dir_all(dir).unwrap();
        }

        fake_engines::install(&mut config, &root, tts);

        let db = mantrify_queuer::db::init_database(&config.paths.database)
            .await
            .unwrap();

        Self {
            temp_dir,
            config: Arc::new(config),
            db,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn orchestrator(&self) -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(self.db.clone(), self.config.clone())
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.db.clone(), self.config.clone())
    }

    /// Input files the fake TTS engine was run with
    pub fn tts_inputs(&self) -> Vec<String> {
        read_dir_sorted(&self.root().join("captured_tts"))
    }

    /// Input files the fake concatenation engine was run with
    pub fn concat_inputs(&self) -> Vec<String> {
        read_dir_sorted(&self.root().join("captured_concat"))
    }

    /// Engine start/end events in the order they happened
    pub fn engine_runs(&self) -> Vec<String> {
        match std::fs::read_to_string(self.root().join(fake_engines::RUN_LOG)) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Place a caller-uploaded request file
    pub fn upload_request_csv(&self, name: &str, content: &str) -> PathBuf {
        let path = self.config.paths.user_request_dir().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

fn read_dir_sorted(dir: &Path) -> Vec<String> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    paths.sort();
    paths
        .into_iter()
        .map(|path| std::fs::read_to_string(path).unwrap())
        .collect()
}

/// Count rows in a table
pub async fn count_rows(db: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(db)
        .await
        .unwrap()
}
