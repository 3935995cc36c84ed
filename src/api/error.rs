//! Error types for the course backend

use thiserror::Error;

/// Errors that can occur when talking to the backend
#[derive(Debug, Error)]
pub enum ApiError {
    /// No bearer token is available, or the backend rejected it
    #[error("Not authenticated: {0}")]
    Auth(String),

    /// Failed to access system keyring
    #[error("Failed to access keyring: {0}")]
    KeyringError(String),

    /// Token does not look like a bearer token
    #[error("Invalid token format")]
    InvalidToken,

    /// Request or response failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Server says progression is blocked
    #[error("Progression blocked by server: {message}")]
    ProgressionConflict {
        /// Unit that must be reviewed first, when the server names it
        blocking_unit: Option<String>,
        /// Explanation from the server
        message: String,
    },

    /// API returned an error response
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },

    /// The blocking delivery thread did not finish
    #[error("Blocking delivery failed: {0}")]
    Blocking(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ApiError {
    /// Check if this error is transient and the write should be retried
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Blocking(_) => true,
            ApiError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Check if this error requires re-authentication
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::Auth(_) | ApiError::InvalidToken)
    }

    /// Check if the local lock state must be re-synced from the server
    pub fn is_progression_conflict(&self) -> bool {
        matches!(self, ApiError::ProgressionConflict { .. })
    }

    /// The unit the server reported as blocking progression
    pub fn blocking_unit(&self) -> Option<&str> {
        match self {
            ApiError::ProgressionConflict { blocking_unit, .. } => blocking_unit.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_recoverable() {
        assert!(ApiError::Api { status: 503, message: String::new() }.is_recoverable());
        assert!(!ApiError::Api { status: 400, message: String::new() }.is_recoverable());
    }

    #[test]
    fn validation_errors_are_permanent() {
        assert!(!ApiError::Validation("bad body".into()).is_recoverable());
    }

    #[test]
    fn conflict_names_blocking_unit() {
        let error = ApiError::ProgressionConflict {
            blocking_unit: Some("u2".into()),
            message: String::new(),
        };
        assert!(error.is_progression_conflict());
        assert!(!error.is_recoverable());
        assert_eq!(error.blocking_unit(), Some("u2"));
        assert_eq!(ApiError::Auth("expired".into()).blocking_unit(), None);
    }

    #[test]
    fn auth_requires_reauth() {
        assert!(ApiError::Auth("expired".into()).requires_reauth());
        assert!(!ApiError::Validation("x".into()).requires_reauth());
    }
}
