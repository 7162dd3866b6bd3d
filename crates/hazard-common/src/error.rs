//! Error types for the hazard loader.

use thiserror::Error;

/// Result type alias using LoadError.
pub type LoadResult<T> = Result<T, LoadError>;

/// Primary error type for data loading operations.
///
/// Variants carry different blast radii: `Configuration` aborts a run before
/// any side effects, `Metadata` fails one region or document entry,
/// `MissingField` fails one data row, and `Stream`/`Merge` fail one region's
/// load while the rest of the run continues.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Metadata insert failed for {kind} '{name}': {message}")]
    Metadata {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("Missing value for column '{column}' in line: {line}")]
    MissingField { column: String, line: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Stream(err.to_string())
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Configuration(format!("JSON error: {}", err))
    }
}
