use super::{
    adapt_step, apply_increment, check_jd, form_static_tangent, form_static_unbalance,
    solve_reference,
};
use crate::error::{IntegratorError, IntegratorResult};
use crate::integrator::{Integrator, StaticIntegrator, TangentKind};
use nalgebra::DVector;
use sa_core::DofId;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;

/// Chooses λ so that one DOF moves by a prescribed increment per step.
#[derive(Clone, Debug)]
pub struct DisplacementControl {
    dof: DofId,
    eq: Option<usize>,
    incr: f64,
    jd: usize,
    bounds: (f64, f64),
    last_iterations: usize,
    phat: DVector<f64>,
}

impl DisplacementControl {
    pub fn new(dof: DofId, incr: f64) -> IntegratorResult<Self> {
        Self::adaptive(dof, incr, 1, incr, incr)
    }

    pub fn adaptive(
        dof: DofId,
        incr: f64,
        jd: usize,
        min: f64,
        max: f64,
    ) -> IntegratorResult<Self> {
        check_jd(jd)?;
        if incr == 0.0 || !incr.is_finite() {
            return Err(IntegratorError::invalid(format!(
                "displacement increment must be non-zero, got {incr}"
            )));
        }
        Ok(Self {
            dof,
            eq: None,
            incr,
            jd,
            bounds: (min, max),
            last_iterations: jd,
            phat: DVector::zeros(0),
        })
    }

    fn eq(&self) -> IntegratorResult<usize> {
        self.eq.ok_or(IntegratorError::NoStep {
            integrator: "DisplacementControl",
        })
    }

    /// `ΔÛ[dof]`, rejecting a reference load that does not move the DOF.
    fn control_component(&self, uhat: &DVector<f64>) -> IntegratorResult<f64> {
        let v = uhat[self.eq()?];
        if v == 0.0 {
            return Err(IntegratorError::ZeroDenominator {
                what: "displacement control (reference load does not move the controlled DOF)",
            });
        }
        Ok(v)
    }
}

impl Integrator for DisplacementControl {
    fn name(&self) -> &'static str {
        "DisplacementControl"
    }

    fn domain_changed(&mut self, model: &AnalysisModel) -> IntegratorResult<()> {
        self.eq = model.equation(self.dof)?;
        if self.eq.is_none() {
            return Err(IntegratorError::invalid(format!(
                "controlled DOF {} is constrained",
                self.dof
            )));
        }
        Ok(())
    }

    fn form_tangent(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
        kind: TangentKind,
    ) -> IntegratorResult<()> {
        form_static_tangent(model, soe, kind)
    }

    fn form_unbalance(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        form_static_unbalance(model, soe)
    }

    fn update(
        &mut self,
        model: &mut AnalysisModel,
        soe: &mut dyn LinearSoe,
        delta: &DVector<f64>,
    ) -> IntegratorResult<()> {
        let uhat = solve_reference(soe, &self.phat)?;
        let d_lambda = -delta[self.eq()?] / self.control_component(&uhat)?;
        let du = delta + &uhat * d_lambda;
        let lambda = model.time() + d_lambda;
        apply_increment(model, &du, lambda)?;
        soe.set_x(&du)?;
        Ok(())
    }

    fn commit(&mut self, model: &mut AnalysisModel, iterations: usize) -> IntegratorResult<()> {
        self.last_iterations = iterations.max(1);
        model.commit_state()?;
        Ok(())
    }
}

impl StaticIntegrator for DisplacementControl {
    fn new_step(
        &mut self,
        model: &mut AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        self.incr = adapt_step(self.incr, self.jd, self.last_iterations, self.bounds);
        self.phat = model.reference_load();
        form_static_tangent(model, soe, TangentKind::Current)?;
        let uhat = solve_reference(soe, &self.phat)?;
        let d_lambda = self.incr / self.control_component(&uhat)?;
        let lambda = model.time() + d_lambda;
        apply_increment(model, &(uhat * d_lambda), lambda)?;
        tracing::debug!(lambda, d_lambda, incr = self.incr, "displacement control step");
        Ok(())
    }
}
