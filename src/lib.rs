//! coursetrack - progress core for a learning-management frontend
//!
//! Builds the ordered content of a course, decides what a student may open,
//! and turns playback and reading into progress the backend can trust.

pub mod api;
pub mod config;
pub mod content;
pub mod progression;
pub mod watch;

pub use api::{ApiClient, ApiError};
pub use config::Config;
pub use content::ContentGraph;
pub use progression::{LockState, ProgressionEngine};
pub use watch::{DocumentTracker, WatchSessionTracker};
