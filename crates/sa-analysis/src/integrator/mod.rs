//! Incremental integrators.
//!
//! An integrator owns the step-control state. It forms the tangent and the
//! unbalance into the system of equations and applies each solved increment
//! to the model. Static integrators advance the load factor; transient ones
//! advance time.

mod assemble;
mod static_ctrl;
mod transient;

pub use static_ctrl::{
    ArcLength, ArcLength1, DeterminantSign, DisplacementControl, LoadControl, MinUnbalDispNorm,
};
pub use transient::{
    AlphaOs, CentralDifference, Hht, Newmark, NewmarkExplicit, NewmarkParams,
};

use crate::error::IntegratorResult;
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;
use serde::{Deserialize, Serialize};

/// Which stiffness the tangent is built from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TangentKind {
    #[default]
    Current,
    Initial,
}

/// Operations shared by every integrator; this is all an algorithm sees.
pub trait Integrator {
    fn name(&self) -> &'static str;

    /// Re-size internal vectors after equation numbering.
    fn domain_changed(&mut self, model: &AnalysisModel) -> IntegratorResult<()>;

    fn form_tangent(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
        kind: TangentKind,
    ) -> IntegratorResult<()>;

    /// Assemble the unbalance for the current trial state into `b`.
    fn form_unbalance(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()>;

    /// Apply a solved increment to the trial state.
    ///
    /// Path-following integrators may solve further systems here and
    /// leave the increment actually applied in `soe.x()`.
    fn update(
        &mut self,
        model: &mut AnalysisModel,
        soe: &mut dyn LinearSoe,
        delta: &DVector<f64>,
    ) -> IntegratorResult<()>;

    /// Accept the step; `iterations` is what the algorithm needed.
    fn commit(&mut self, model: &mut AnalysisModel, iterations: usize) -> IntegratorResult<()> {
        let _ = iterations;
        model.commit_state()?;
        Ok(())
    }

    fn revert_to_last_step(&mut self, model: &mut AnalysisModel) -> IntegratorResult<()> {
        model.revert_to_last_step()?;
        Ok(())
    }
}

/// Upcast helper for the integrator sub-traits.
pub trait AsIntegrator {
    fn as_integrator(&mut self) -> &mut dyn Integrator;
}

impl<T: Integrator> AsIntegrator for T {
    fn as_integrator(&mut self) -> &mut dyn Integrator {
        self
    }
}

/// Load-factor stepping.
pub trait StaticIntegrator: Integrator + AsIntegrator {
    /// Advance λ and apply the step predictor.
    fn new_step(&mut self, model: &mut AnalysisModel, soe: &mut dyn LinearSoe)
    -> IntegratorResult<()>;
}

/// Time stepping.
pub trait TransientIntegrator: Integrator + AsIntegrator {
    /// Advance time by `dt` and apply the predictor.
    fn new_step(&mut self, model: &mut AnalysisModel, dt: f64) -> IntegratorResult<()>;
}
