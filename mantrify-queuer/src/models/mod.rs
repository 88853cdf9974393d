//! Data models for mantrify-queuer
//!
//! - Element: one segment of a submitted script
//! - Job: durable pipeline state machine
//! - Workflow: request/outcome types at the orchestrator boundary

pub mod element;
pub mod job;
pub mod workflow;

pub use element::{Element, ElementKind, Numeric};
pub use job::{Job, JobStage, JobStatus, StateTransition, StatusCounts};
pub use workflow::{MeditationRequest, WorkflowOutcome};
