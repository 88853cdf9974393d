//! Database access for mantrify-queuer
//!
//! Free functions over a shared `SqlitePool`. Schema creation lives in
//! `mantrify_common::db`.

pub mod generated_audio;
pub mod jobs;
pub mod meditations;
pub mod sound_files;

pub use mantrify_common::db::init_database;
