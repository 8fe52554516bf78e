//! Core error types for gretun

use std::path::PathBuf;
use thiserror::Error;

/// Input validation failures.
///
/// Always locally recoverable: the workflow re-prompts the same stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Malformed IPv4 address
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    /// MTU outside [1280, 1500] or not a number
    #[error("Invalid MTU (expected 1280-1500): {0}")]
    InvalidMtu(String),

    /// Hour outside [0, 23] or not a number
    #[error("Invalid hour (expected 0-23): {0}")]
    InvalidHour(String),

    /// Empty tunnel name
    #[error("Tunnel name must not be empty")]
    EmptyName,

    /// Empty pre-shared key
    #[error("Pre-shared key must not be empty")]
    EmptyPsk,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
