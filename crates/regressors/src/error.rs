//! Model Error Types

use thiserror::Error;

/// Errors raised while fitting, evaluating or decoding a regressor
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Cannot fit with zero samples")]
    EmptyTrainingSet,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<postcard::Error> for ModelError {
    fn from(err: postcard::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<smartcore::error::Failed> for ModelError {
    fn from(err: smartcore::error::Failed) -> Self {
        ModelError::Numerical(err.to_string())
    }
}
