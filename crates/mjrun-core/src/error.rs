//! Error types for mjrun

use std::path::PathBuf;

use thiserror::Error;

use crate::registry::RegistryError;

/// Errors raised while loading and resolving a run configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file {} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Top-level entry '{0}' is not a section")]
    InvalidSection(String),

    #[error("Unknown override --{0} (no such key in the config file)")]
    UnknownOverride(String),

    #[error("Override --{0} expects a value")]
    MissingOverrideValue(String),

    #[error("Invalid key path: '{0}'")]
    InvalidKeyPath(String),

    #[error("Key path '{path}' is used both as a value and as a section")]
    KeyConflict { path: String },

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid value '{value}' for {field} (expected one of: {choices})")]
    InvalidChoice {
        field: &'static str,
        value: String,
        choices: String,
    },
}

/// Main error type for mjrun
#[derive(Error, Debug)]
pub enum MjrunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mjrun operations
pub type Result<T> = std::result::Result<T, MjrunError>;
