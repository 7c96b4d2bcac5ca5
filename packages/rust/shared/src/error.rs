//! Error types for the lead magnet generator.
//!
//! Library crates use [`LeadMagnetError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for configuration, providers and persistence.
#[derive(Debug, thiserror::Error)]
pub enum LeadMagnetError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Language model transport or provider error.
    #[error("llm error: {0}")]
    Llm(String),

    /// Search provider transport or provider error.
    #[error("search error: {0}")]
    Search(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty output, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON or TOML (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadMagnetError>;

impl LeadMagnetError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short category name, safe to show without any internal detail.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::Llm(_) => "LlmError",
            Self::Search(_) => "SearchError",
            Self::Io { .. } => "IoError",
            Self::Validation { .. } => "ValidationError",
            Self::Serialization(_) => "SerializationError",
        }
    }
}
