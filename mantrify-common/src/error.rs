//! Common error types for Mantrify

use serde::Serialize;
use thiserror::Error;

/// Common result type for Mantrify operations
pub type Result<T> = std::result::Result<T, Error>;

/// One problem found while validating a single input element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Position of the element in the submitted sequence
    pub index: usize,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}

/// Common error types across Mantrify services
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or inconsistent user input, with per-element details
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationIssue>,
    },

    /// External engine exited non-zero, failed to start, or reported unusable output
    #[error("{stage} process failed: {message}")]
    ProcessFailure { stage: String, message: String },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited file encode/decode error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Validation error without per-element details
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn process_failure(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProcessFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error's category
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::ProcessFailure { .. } => "PROCESS_FAILURE",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Database(_) => "PERSISTENCE_ERROR",
            Error::Io(_) | Error::Csv(_) | Error::Config(_) | Error::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}
