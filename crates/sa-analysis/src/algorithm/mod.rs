//! Solution algorithms: how one step iterates to equilibrium.
//!
//! Every algorithm follows the same cycle
//!
//! ```text
//! form unbalance, start test
//! loop: [form tangent] → solve → update → form unbalance → test
//! ```
//!
//! and differs only in when the tangent is re-formed and how the solved
//! increment is turned into the applied one.

mod broyden;
mod line_search;
mod linear;
mod newton;

pub use broyden::Broyden;
pub use line_search::{LineSearch, LineSearchParams, NewtonLineSearch};
pub use linear::Linear;
pub use newton::{ModifiedNewton, NewtonRaphson, NewtonTangent, PeriodicNewton};

use crate::convergence::{ConvergenceTest, TestVerdict};
use crate::error::{AnalysisError, AnalysisResult};
use crate::integrator::{Integrator, TangentKind};
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;
use serde::Serialize;

/// Borrowed parts an algorithm drives for one step.
pub struct AnalysisLinks<'a> {
    pub model: &'a mut AnalysisModel,
    pub integrator: &'a mut dyn Integrator,
    pub soe: &'a mut dyn LinearSoe,
    pub test: Option<&'a mut ConvergenceTest>,
}

impl AnalysisLinks<'_> {
    fn form_tangent(&mut self, kind: TangentKind) -> AnalysisResult<()> {
        self.integrator
            .form_tangent(&*self.model, &mut *self.soe, kind)
            .map_err(AnalysisError::Tangent)
    }

    fn form_unbalance(&mut self) -> AnalysisResult<()> {
        self.integrator
            .form_unbalance(&*self.model, &mut *self.soe)
            .map_err(AnalysisError::Unbalance)
    }

    /// Solve and return a copy of `x`.
    fn solve(&mut self) -> AnalysisResult<DVector<f64>> {
        self.soe.solve().map_err(AnalysisError::Solve)?;
        Ok(self.soe.x().clone())
    }

    fn update(&mut self, delta: &DVector<f64>) -> AnalysisResult<()> {
        self.integrator
            .update(&mut *self.model, &mut *self.soe, delta)
            .map_err(AnalysisError::Update)
    }

    fn test_mut(&mut self) -> AnalysisResult<&mut ConvergenceTest> {
        self.test.as_deref_mut().ok_or(AnalysisError::Unbound {
            what: "convergence test",
        })
    }

    fn start_test(&mut self) -> AnalysisResult<()> {
        self.test_mut()?.start();
        Ok(())
    }

    fn check(&mut self) -> AnalysisResult<TestVerdict> {
        let soe: &dyn LinearSoe = &*self.soe;
        let test = self.test.as_deref_mut().ok_or(AnalysisError::Unbound {
            what: "convergence test",
        })?;
        Ok(test.test(soe))
    }

    fn report(&self, iterations: usize) -> StepReport {
        StepReport {
            iterations,
            norms: self
                .test
                .as_deref()
                .map(|t| t.norms().to_vec())
                .unwrap_or_default(),
        }
    }

    /// Turn a test verdict into the step outcome; `None` means iterate.
    fn conclude(
        &self,
        algorithm: &'static str,
        verdict: TestVerdict,
    ) -> Option<AnalysisResult<StepReport>> {
        match verdict {
            TestVerdict::Converged { iterations } => Some(Ok(self.report(iterations))),
            TestVerdict::Continue => None,
            TestVerdict::Failed { iterations, norm } => {
                tracing::warn!(algorithm, iterations, norm, "step failed to converge");
                Some(Err(AnalysisError::NotConverged { iterations, norm }))
            }
        }
    }
}

/// Result of a converged step.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StepReport {
    pub iterations: usize,
    /// Test norms, one per iteration.
    pub norms: Vec<f64>,
}

pub trait SolutionAlgorithm {
    fn name(&self) -> &'static str;

    /// Iterate the current step to convergence.
    fn solve_current_step(&mut self, links: &mut AnalysisLinks<'_>) -> AnalysisResult<StepReport>;

    /// Whether a convergence test must be attached.
    fn needs_test(&self) -> bool {
        true
    }

    /// Forget cached state after the equation numbering changed.
    fn domain_changed(&mut self) {}
}
