//! Element contribution contract.
//!
//! Elements are external collaborators: the solution layer only asks them
//! for local matrices and vectors and maps those into the system through
//! each element's equation numbers. Elements pull their trial response from
//! a [`TrialResponse`] view during state determination.

use crate::error::ModelResult;
use nalgebra::{DMatrix, DVector};
use sa_core::DofId;

/// Which response field to gather.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Disp,
    Vel,
    Accel,
}

/// Read-only view of the model's trial response (DOF space).
#[derive(Clone, Copy, Debug)]
pub struct TrialResponse<'a> {
    pub(crate) disp: &'a DVector<f64>,
    pub(crate) vel: &'a DVector<f64>,
    pub(crate) accel: &'a DVector<f64>,
    pub(crate) time: f64,
}

impl<'a> TrialResponse<'a> {
    pub fn disp(&self, dof: DofId) -> f64 {
        self.disp[dof.index()]
    }

    pub fn vel(&self, dof: DofId) -> f64 {
        self.vel[dof.index()]
    }

    pub fn accel(&self, dof: DofId) -> f64 {
        self.accel[dof.index()]
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Gather one field for a list of DOFs.
    pub fn gather(&self, dofs: &[DofId], kind: ResponseKind) -> DVector<f64> {
        let src = match kind {
            ResponseKind::Disp => self.disp,
            ResponseKind::Vel => self.vel,
            ResponseKind::Accel => self.accel,
        };
        DVector::from_iterator(dofs.len(), dofs.iter().map(|d| src[d.index()]))
    }
}

/// A finite element as seen by the integrators.
///
/// All matrix and vector queries are pure reads of the element's current
/// trial state; only `update` and the commit/revert calls mutate it.
pub trait Element: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Global DOFs in local ordering.
    fn dofs(&self) -> &[DofId];

    /// State determination from the trial response.
    fn update(&mut self, trial: &TrialResponse<'_>) -> ModelResult<()>;

    fn tangent_stiff(&self) -> DMatrix<f64>;

    fn initial_stiff(&self) -> DMatrix<f64>;

    /// Tangent at the last committed state.
    fn committed_stiff(&self) -> DMatrix<f64> {
        self.tangent_stiff()
    }

    fn mass(&self) -> DMatrix<f64> {
        let n = self.dofs().len();
        DMatrix::zeros(n, n)
    }

    /// Element damping, excluding model-level Rayleigh terms.
    fn damp(&self) -> DMatrix<f64> {
        let n = self.dofs().len();
        DMatrix::zeros(n, n)
    }

    /// Static resisting force for the trial state.
    fn resisting_force(&self) -> DVector<f64>;

    fn commit_state(&mut self) -> ModelResult<()>;

    fn revert_to_last_commit(&mut self) -> ModelResult<()>;

    fn revert_to_start(&mut self) -> ModelResult<()>;
}
