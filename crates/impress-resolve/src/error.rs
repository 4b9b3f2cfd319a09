//! Error types for impress-resolve

use thiserror::Error;

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Main error type for resolution operations.
///
/// Data problems (empty names, missing attribute values) are never errors;
/// these variants cover programmer errors and unusable configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// A linkage was requested over a matrix with no entries
    #[error("Empty distance matrix where a non-empty one was expected")]
    EmptyMatrix,

    /// Matrix shape disagrees with its batch or is not square
    #[error("Inconsistent matrix dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Distance entry outside [0, 1] or not finite
    #[error("Invalid distance {value} at ({row}, {col})")]
    InvalidDistance { row: usize, col: usize, value: f64 },

    /// Distance threshold is negative or not finite
    #[error("Invalid distance threshold: {0}")]
    InvalidThreshold(f64),

    /// Required column missing from the input table
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Configuration could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for ResolveError {
    fn from(err: toml::de::Error) -> Self {
        ResolveError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::Config(err.to_string())
    }
}
