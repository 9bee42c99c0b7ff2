//! Error types for cascade training.

use thiserror::Error;

/// Errors surfaced by network construction and training setup.
///
/// Numeric stagnation and timeouts are not errors; they are reported through
/// [`crate::TrainStatus`] in the trial result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CascadeError {
    #[error("invalid training configuration: {0}")]
    InvalidConfiguration(String),

    #[error("data set does not match network: {0}")]
    DataMismatch(String),

    #[error("insufficient memory for the activation cache")]
    CacheAllocation,

    #[error("input vector has wrong length: expected {expected}, got {got}")]
    InputSize { expected: usize, got: usize },
}
