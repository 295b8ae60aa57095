//! Error types for the analysis model.

use sa_core::{CoreError, DofId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("DOF {dof} does not exist (model has {num_dofs} DOFs)")]
    InvalidDof { dof: DofId, num_dofs: usize },

    #[error("Element {index} ({name}): {what}")]
    Element {
        index: usize,
        name: &'static str,
        what: String,
    },

    #[error("Invalid model parameter: {what}")]
    InvalidParameter { what: String },

    #[error("Equations have not been numbered")]
    NotNumbered,

    #[error("Size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ModelResult<T> = Result<T, ModelError>;
