//! Bearer token storage using system keyring

use keyring::Entry;

use super::error::ApiError;

/// Service name for keyring storage
const SERVICE_NAME: &str = "coursetrack";
/// Entry name for the bearer token
const TOKEN_ENTRY: &str = "api-bearer-token";
/// Environment variable that overrides the keyring
pub const TOKEN_ENV: &str = "COURSETRACK_TOKEN";

/// Manages the backend bearer token in the system keyring
pub struct TokenManager;

impl TokenManager {
    /// Resolve the token: environment first, then keyring
    pub fn resolve() -> Result<String, ApiError> {
        match std::env::var(TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Self::get_token(),
        }
    }

    /// Get the token from system keyring
    pub fn get_token() -> Result<String, ApiError> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => {
                ApiError::Auth("no token stored, run `coursetrack login <token>`".into())
            }
            _ => ApiError::KeyringError(e.to_string()),
        })
    }

    /// Store the token in system keyring
    pub fn set_token(token: &str) -> Result<(), ApiError> {
        if !Self::validate_token_format(token) {
            return Err(ApiError::InvalidToken);
        }

        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        entry.set_password(token).map_err(|e| ApiError::KeyringError(e.to_string()))
    }

    /// Delete the stored token
    pub fn delete_token() -> Result<(), ApiError> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        entry.delete_credential().map_err(|e| ApiError::KeyringError(e.to_string()))
    }

    /// Validate token format
    fn validate_token_format(token: &str) -> bool {
        // JWTs and opaque tokens alike: long enough, no whitespace
        token.len() >= 16 && !token.chars().any(char::is_whitespace)
    }

    /// Mask a token for display (show first 6 and last 4 chars)
    pub fn mask_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() <= 12 {
            return "*".repeat(chars.len());
        }
        let prefix: String = chars[..6].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }
}
