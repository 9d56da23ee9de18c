//! Error types and handling.

use thiserror::Error;

use crate::config::ConfigError;
use crate::stick::StickError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Stick communication failed
    #[error("Stick error: {0}")]
    Stick(#[from] StickError),

    /// Configuration file problem
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a validation error with message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config validation error with message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Validation(msg.into()))
    }
}
