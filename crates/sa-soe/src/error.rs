//! Error types for the linear system of equations.

use thiserror::Error;

/// Failures raised while sizing, assembling or solving a system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SoeError {
    #[error("System has not been sized")]
    NotSized,

    #[error("Size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Entry ({row}, {col}) lies outside the allocated storage pattern")]
    OutsidePattern { row: usize, col: usize },

    #[error("Zero pivot at equation {row}")]
    ZeroPivot { row: usize },

    #[error("Matrix not positive definite at equation {row} (pivot {pivot:e})")]
    NotPositiveDefinite { row: usize, pivot: f64 },

    #[error("Matrix is singular")]
    Singular,

    #[error("Iterative solver did not converge in {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },
}

impl SoeError {
    /// Negative status code for callers that branch on integers.
    pub fn code(&self) -> i32 {
        match self {
            SoeError::NotSized | SoeError::SizeMismatch { .. } => -1,
            SoeError::ZeroPivot { .. } | SoeError::Singular => -2,
            SoeError::NotPositiveDefinite { .. } => -3,
            SoeError::NotConverged { .. } => -4,
            SoeError::OutsidePattern { .. } => -5,
        }
    }
}

pub type SoeResult<T> = Result<T, SoeError>;
