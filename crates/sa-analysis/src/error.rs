//! Error types for integrators, algorithms and analysis drivers.

use sa_model::ModelError;
use sa_soe::SoeError;
use thiserror::Error;

/// Failures raised by an integrator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegratorError {
    #[error("Zero denominator in {what}")]
    ZeroDenominator { what: &'static str },

    #[error("Arc-length constraint has imaginary roots (discriminant {discriminant:e})")]
    ImaginaryRoots { discriminant: f64 },

    #[error("Invalid integrator parameter: {what}")]
    InvalidParameter { what: String },

    #[error("{integrator} accepts a single update per step")]
    RepeatedUpdate { integrator: &'static str },

    #[error("{integrator}: update called before new_step")]
    NoStep { integrator: &'static str },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Soe(#[from] SoeError),
}

impl IntegratorError {
    pub fn code(&self) -> i32 {
        match self {
            IntegratorError::ZeroDenominator { .. } => -1,
            IntegratorError::ImaginaryRoots { .. } => -2,
            IntegratorError::InvalidParameter { .. } => -3,
            IntegratorError::RepeatedUpdate { .. } => -4,
            IntegratorError::Model(_) => -5,
            IntegratorError::Soe(_) => -6,
            IntegratorError::NoStep { .. } => -7,
        }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        IntegratorError::InvalidParameter { what: what.into() }
    }
}

pub type IntegratorResult<T> = Result<T, IntegratorError>;

/// Outcome of a failed analysis step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Tangent formation failed: {0}")]
    Tangent(#[source] IntegratorError),

    #[error("Unbalance formation failed: {0}")]
    Unbalance(#[source] IntegratorError),

    #[error("Linear solve failed: {0}")]
    Solve(#[source] SoeError),

    #[error("Integrator update failed: {0}")]
    Update(#[source] IntegratorError),

    #[error("Analysis has no {what}")]
    Unbound { what: &'static str },

    #[error("Failed to converge in {iterations} iterations (norm {norm:e})")]
    NotConverged { iterations: usize, norm: f64 },

    #[error("Integrator rejected the new step: {0}")]
    NewStep(#[source] IntegratorError),

    #[error("Commit failed: {0}")]
    Commit(#[source] IntegratorError),

    #[error("System sizing failed: {0}")]
    Setup(#[source] SoeError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl AnalysisError {
    /// Negative status code; one value per failure kind.
    pub fn code(&self) -> i32 {
        match self {
            AnalysisError::Tangent(_) => -1,
            AnalysisError::Unbalance(_) => -2,
            AnalysisError::Solve(_) => -3,
            AnalysisError::Update(_) => -4,
            AnalysisError::Unbound { .. } => -5,
            AnalysisError::NotConverged { .. } => -6,
            AnalysisError::NewStep(_) => -7,
            AnalysisError::Commit(_) | AnalysisError::Model(_) => -8,
            AnalysisError::Setup(_) => -9,
        }
    }

    /// True for a step that ran cleanly but did not converge.
    pub fn is_non_convergence(&self) -> bool {
        matches!(self, AnalysisError::NotConverged { .. })
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_codes_are_distinct() {
        let errs = [
            AnalysisError::Tangent(IntegratorError::invalid("x")),
            AnalysisError::Unbalance(IntegratorError::invalid("x")),
            AnalysisError::Solve(SoeError::Singular),
            AnalysisError::Update(IntegratorError::invalid("x")),
            AnalysisError::Unbound { what: "test" },
            AnalysisError::NotConverged {
                iterations: 3,
                norm: 1.0,
            },
            AnalysisError::NewStep(IntegratorError::invalid("x")),
        ];
        let mut codes: Vec<i32> = errs.iter().map(AnalysisError::code).collect();
        assert_eq!(codes, vec![-1, -2, -3, -4, -5, -6, -7]);
        codes.dedup();
        assert_eq!(codes.len(), 7);
    }

    #[test]
    fn zero_denominator_is_minus_one() {
        let e = IntegratorError::ZeroDenominator {
            what: "arc-length projection",
        };
        assert_eq!(e.code(), -1);
        assert_ne!(
            IntegratorError::RepeatedUpdate {
                integrator: "NewmarkExplicit"
            }
            .code(),
            e.code()
        );
    }
}
