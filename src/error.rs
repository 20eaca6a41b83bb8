//! Application error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Upstream problems are recoverable: the ticker is skipped for this cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Feed(_) | AppError::Http(_))
    }
}

/// Error code and message as carried in job reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        let (code, message) = match &err {
            AppError::DuckDb(_) => ("DUCKDB_ERROR", err.to_string()),
            AppError::Serialization(_) => ("SERIALIZATION_ERROR", err.to_string()),
            AppError::Http(_) => ("HTTP_ERROR", err.to_string()),
            AppError::ConfigParse(_) => ("CONFIG_ERROR", err.to_string()),
            AppError::Feed(_) => ("FEED_ERROR", err.to_string()),
            AppError::Notify(_) => ("NOTIFY_ERROR", err.to_string()),
            AppError::Validation(_) => ("VALIDATION_ERROR", err.to_string()),
            AppError::Config(_) => ("CONFIG_ERROR", err.to_string()),
            AppError::Io(_) => ("IO_ERROR", err.to_string()),
            AppError::Internal(_) => ("INTERNAL_ERROR", err.to_string()),
        };

        ErrorResponse {
            code: code.to_string(),
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let resp = ErrorResponse::from(AppError::Feed("empty frame".to_string()));
        assert_eq!(resp.code, "FEED_ERROR");
        assert!(resp.message.contains("empty frame"));

        let resp = ErrorResponse::from(AppError::Validation("bad period".to_string()));
        assert_eq!(resp.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Feed("x".to_string()).is_transient());
        assert!(!AppError::Internal("x".to_string()).is_transient());
        assert!(!AppError::Config("x".to_string()).is_transient());
    }
}
