//! Error types for the habitus pipeline

use thiserror::Error;

/// Result type alias for habitus operations
pub type Result<T> = std::result::Result<T, HabitusError>;

/// Main error type for the habitus pipeline.
///
/// Every variant is fatal to the record or training run being processed:
/// callers must handle the failure, nothing is coerced to a default.
#[derive(Error, Debug)]
pub enum HabitusError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("Zero variance in column '{0}': standardization is undefined")]
    ZeroVariance(String),

    #[error("Value out of range: {field} = {value} ({reason})")]
    Range {
        field: String,
        value: f64,
        reason: String,
    },

    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Data error: {0}")]
    Data(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<polars::error::PolarsError> for HabitusError {
    fn from(err: polars::error::PolarsError) -> Self {
        HabitusError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for HabitusError {
    fn from(err: serde_json::Error) -> Self {
        HabitusError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for HabitusError {
    fn from(err: ndarray::ShapeError) -> Self {
        HabitusError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
