use super::{
    adapt_step, apply_increment, check_jd, form_static_tangent, form_static_unbalance,
};
use crate::error::{IntegratorError, IntegratorResult};
use crate::integrator::{Integrator, StaticIntegrator, TangentKind};
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;

/// Fixed or iteration-adapted load-factor increments.
///
/// After each step `Δλ ← Δλ · Jd / iterations`, clamped to `[min, max]`.
/// With the default bounds `min = max = Δλ` the increment stays constant.
#[derive(Clone, Debug)]
pub struct LoadControl {
    delta_lambda: f64,
    jd: usize,
    bounds: (f64, f64),
    last_iterations: usize,
}

impl LoadControl {
    pub fn new(delta_lambda: f64) -> IntegratorResult<Self> {
        Self::adaptive(delta_lambda, 1, delta_lambda, delta_lambda)
    }

    pub fn adaptive(delta_lambda: f64, jd: usize, min: f64, max: f64) -> IntegratorResult<Self> {
        check_jd(jd)?;
        if !delta_lambda.is_finite() || !min.is_finite() || !max.is_finite() {
            return Err(IntegratorError::invalid(format!(
                "load increment {delta_lambda} with bounds [{min}, {max}]"
            )));
        }
        Ok(Self {
            delta_lambda,
            jd,
            bounds: (min, max),
            last_iterations: jd,
        })
    }

    /// Increment that the next step will use.
    pub fn delta_lambda(&self) -> f64 {
        self.delta_lambda
    }
}

impl Integrator for LoadControl {
    fn name(&self) -> &'static str {
        "LoadControl"
    }

    fn domain_changed(&mut self, _model: &AnalysisModel) -> IntegratorResult<()> {
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
        _soe: &mut dyn LinearSoe,
        delta: &DVector<f64>,
    ) -> IntegratorResult<()> {
        let lambda = model.time();
        apply_increment(model, delta, lambda)
    }

    fn commit(&mut self, model: &mut AnalysisModel, iterations: usize) -> IntegratorResult<()> {
        self.last_iterations = iterations.max(1);
        model.commit_state()?;
        Ok(())
    }
}

impl StaticIntegrator for LoadControl {
    fn new_step(
        &mut self,
        model: &mut AnalysisModel,
        _soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        self.delta_lambda = adapt_step(
            self.delta_lambda,
            self.jd,
            self.last_iterations,
            self.bounds,
        );
        let lambda = model.time() + self.delta_lambda;
        model.apply_load(lambda);
        tracing::debug!(lambda, d_lambda = self.delta_lambda, "load control step");
        Ok(())
    }
}
