//! Error types for configuration operations.

use thiserror::Error;

use crate::data::schema::SchemaError;

/// Errors returned by the configuration model.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mutation or schema query was attempted with no document loaded.
    #[error("Input not initialized")]
    NotInitialized,

    /// Save, export or dictionary access on a document without sections.
    #[error("Empty input data")]
    EmptyDocument,

    /// Malformed input file or built-in template.
    #[error("{source_name}:{line}: {message}")]
    Parse {
        /// File name or resource the content came from.
        source_name: String,
        /// 1-based line number, 0 when unknown.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// A value or section rejected by the schema.
    #[error(transparent)]
    SchemaViolation(#[from] SchemaError),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Preferences file could not be read or written.
    #[error("preferences error: {0}")]
    Preferences(String),
}

impl ConfigError {
    /// Build a [`ConfigError::Parse`].
    pub fn parse(source_name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        ConfigError::Parse {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
