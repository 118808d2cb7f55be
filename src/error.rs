//! Error types for configuration loading and rendering.
//!
//! The resource generators are total and never return these.

use thiserror::Error;

/// Error type for everything around the resource factory
#[derive(Error, Debug)]
pub enum Error {
    /// Reading a configuration file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse or emit error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON emit error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Pull policy other than Always, IfNotPresent or Never
    #[error("invalid image pull policy {0:?}: expected Always, IfNotPresent or Never")]
    InvalidPullPolicy(String),

    /// Configuration rejected by validation
    #[error("invalid configuration: {field} {reason}")]
    Validation { field: String, reason: String },
}

impl Error {
    /// Create a validation error for `field`
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error came from configuration validation
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::InvalidPullPolicy(_))
    }
}

/// Result type alias for configuration and rendering
pub type Result<T> = std::result::Result<T, Error>;
