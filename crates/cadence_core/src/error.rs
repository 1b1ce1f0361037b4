//! Error types

use crate::value::ValueKind;
use thiserror::Error;

/// Errors raised while resolving host property values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The declared state does not match the live property type
    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// The target has no property at this path
    #[error("Missing property: {path}")]
    MissingProperty { path: String },

    /// The target object was released before the value could be resolved
    #[error("Target released while resolving '{path}'")]
    TargetReleased { path: String },

    /// No assistant accepts this target
    #[error("Unsupported target for '{path}'")]
    Unsupported { path: String },
}

/// Errors raised while loading engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of its allowed range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for value operations
pub type Result<T> = std::result::Result<T, ValueError>;
