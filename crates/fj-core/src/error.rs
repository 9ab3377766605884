//! Error types for the fatjet-skim workspace.

use thiserror::Error;

/// Workspace-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet read/write error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A derived column's row count disagrees with the weight baseline.
    #[error("schema mismatch for field '{field}': expected {expected} rows, got {actual}")]
    Schema {
        /// Name of the offending output field.
        field: String,
        /// Row count of the weight baseline.
        expected: usize,
        /// Row count actually observed.
        actual: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
