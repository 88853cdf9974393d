//! # Mantrify Common Library
//!
//! Shared code for the Mantrify services including:
//! - Error taxonomy shared by every layer
//! - Root folder and configuration file resolution
//! - Database schema and initialization
//! - Timestamp helpers used for snapshot naming

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result, ValidationIssue};
