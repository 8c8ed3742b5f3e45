//! Error types for the otpgate service.

use thiserror::Error;

/// Main error type for otpgate operations.
#[derive(Error, Debug)]
pub enum OtpError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable store read/write failures
    #[error("Store error: {0}")]
    Store(String),

    /// Outbound mail delivery failures
    #[error("Mail delivery error: {0}")]
    Mail(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for OtpError {
    fn from(err: config::ConfigError) -> Self {
        OtpError::Config(err.to_string())
    }
}

/// Result type alias for otpgate operations.
pub type Result<T> = std::result::Result<T, OtpError>;
