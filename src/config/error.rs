//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Capacity '{0}' must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("Interval '{0}' must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("Shutdown topic prefix must not be empty")]
    EmptyShutdownPrefix,

    #[error("Shutdown topic prefix must not contain whitespace")]
    InvalidShutdownPrefix,
}
