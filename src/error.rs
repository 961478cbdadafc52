//! Error types for the survey-xwas library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum XwasError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid numeric value '{value}' at row {row}, column '{column}'")]
    InvalidValue {
        value: String,
        row: usize,
        column: String,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing column '{0}' in dataset")]
    MissingColumn(String),

    #[error("Invalid column type for '{column}': {reason}")]
    InvalidColumnType { column: String, reason: String },

    #[error("Invalid survey design: {0}")]
    InvalidDesign(String),

    #[error("Singular fit for '{variable}': {reason}")]
    SingularFit { variable: String, reason: String },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Screen error: {0}")]
    Screen(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, XwasError>;
