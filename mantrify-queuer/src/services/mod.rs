//! Service modules for the meditation pipeline

pub mod artifact_linker;
pub mod concat_engine;
pub mod csv_files;
pub mod element_normalizer;
pub mod job_worker;
pub mod stage_driver;
pub mod tts_engine;
pub mod workflow_orchestrator;

pub use artifact_linker::{link_artifacts, LinkSummary};
pub use concat_engine::ConcatEngine;
pub use element_normalizer::{normalize_request, NormalizedRequest};
pub use job_worker::JobWorker;
pub use stage_driver::{StageCommand, StageDriver, StageOutput};
pub use tts_engine::TtsEngine;
pub use workflow_orchestrator::WorkflowOrchestrator;
