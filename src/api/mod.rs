//! Course backend integration
//!
//! Provides bearer-token storage, the REST client and the transport used to
//! deliver progress updates.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

// Re-export commonly used types
pub use auth::TokenManager;
pub use client::ApiClient;
pub use error::ApiError;
pub use models::{
    Ack, DocumentProgressUpdate, QuizAvailability, QuizSession, ResumePosition, WatchUpdate,
};
pub use transport::ProgressTransport;
