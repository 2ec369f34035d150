//! Error types for manualroot

use thiserror::Error;

/// Result type alias using ManualRootError
pub type Result<T> = std::result::Result<T, ManualRootError>;

/// Error type alias for convenience
pub type Error = ManualRootError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for manualroot
#[derive(Debug, Error)]
pub enum ManualRootError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Brand not found: {0}")]
    BrandNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("LLM error: {0}")]
    Llm(String),

    /// Quota exhaustion reported by the reasoning service. Never retried.
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upstream service failure; `retryable` is decided from the HTTP status.
    #[error("External service error: {message}")]
    ExternalError { message: String, retryable: bool },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ManualRootError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BrandNotFound(_) | Self::DocumentNotFound(_) | Self::ConversationNotFound(_) => {
                exit_codes::NOT_FOUND
            }
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }

    /// Whether a reasoning-service call that failed with this error may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::QuotaExhausted(_) => false,
            Self::ExternalError { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Build an external error from an HTTP status and body
    pub fn from_status(service: &str, status: reqwest::StatusCode, body: &str) -> Self {
        if status.as_u16() == 429 || body.to_uppercase().contains("RESOURCE_EXHAUSTED") {
            return Self::QuotaExhausted(format!("{} (HTTP {}): {}", service, status, body));
        }
        Self::ExternalError {
            message: format!("{} error (HTTP {}): {}", service, status, body),
            retryable: status.is_server_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_quota_is_never_retryable() {
        let err = ManualRootError::from_status("LLM service", StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, ManualRootError::QuotaExhausted(_)));
        assert!(!err.is_retryable());

        let err = ManualRootError::from_status(
            "LLM service",
            StatusCode::INTERNAL_SERVER_ERROR,
            "{\"status\": \"RESOURCE_EXHAUSTED\"}",
        );
        assert!(matches!(err, ManualRootError::QuotaExhausted(_)));
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = ManualRootError::from_status("LLM service", StatusCode::BAD_GATEWAY, "upstream");
        assert!(err.is_retryable());

        let err = ManualRootError::from_status("LLM service", StatusCode::BAD_REQUEST, "bad");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            ManualRootError::ConversationNotFound("x".into()).exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            ManualRootError::Config("bad".into()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            ManualRootError::Llm("boom".into()).exit_code(),
            exit_codes::GENERAL_ERROR
        );
    }
}
