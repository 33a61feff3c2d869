//! Application-wide error types using thiserror
//!
//! Errors that escape the tool dispatch layer are wrapped in AppError
//! so the binary has a single failure type to report.

use crate::client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange client error: {0}")]
    Client(#[from] ClientError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_converts_to_app_error() {
        let client_err = ClientError::Network("timeout".into());
        let app_err: AppError = client_err.into();
        let msg = app_err.to_string();
        assert!(msg.contains("Exchange client error"), "Got: {}", msg);
        assert!(msg.contains("timeout"), "Got: {}", msg);
    }

    #[test]
    fn test_serde_error_converts_to_app_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let app_err: AppError = serde_err.into();
        assert!(app_err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_io_error_converts_to_app_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let app_err: AppError = io_err.into();
        let msg = app_err.to_string();
        assert!(msg.contains("IO error"), "Got: {}", msg);
        assert!(msg.contains("stdout closed"), "Got: {}", msg);
    }

    #[test]
    fn test_config_error_display() {
        let err = AppError::Config("missing private key".into());
        assert_eq!(err.to_string(), "Configuration error: missing private key");
    }
}
