//! Feature Error Types

use thiserror::Error;

/// Errors raised while building or normalizing features
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// Fewer rows than the lookback window requires
    #[error("Insufficient data: need at least {required} rows, got {available}")]
    InsufficientData { required: usize, available: usize },

    /// Lookback of zero produces empty windows
    #[error("Lookback must be at least 1")]
    InvalidLookback,

    /// Requested target or column is not in the frame
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Model schema names a column the feature transform did not produce
    #[error("Feature schema mismatch: column '{0}' is not produced by the feature transform")]
    SchemaMismatch(String),

    /// Matrix width does not match the fitted transform
    #[error("Dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Scaler fitted on zero rows
    #[error("Cannot fit a scaler on an empty matrix")]
    EmptyInput,
}
