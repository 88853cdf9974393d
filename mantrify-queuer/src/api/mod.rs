//! HTTP API handlers

pub mod health;
pub mod jobs;
pub mod meditations;

pub use health::health_routes;
pub use jobs::job_routes;
pub use meditations::meditation_routes;
