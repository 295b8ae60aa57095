use super::{
    adapt_step, apply_increment, check_jd, form_static_tangent, form_static_unbalance,
    solve_reference,
};
use crate::error::{IntegratorError, IntegratorResult};
use crate::integrator::{Integrator, StaticIntegrator, TangentKind};
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;
use serde::{Deserialize, Serialize};

/// How the sign of the first load increment of a step is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeterminantSign {
    /// Continue in the direction of the previous step.
    #[default]
    LastStep,
    /// Reverse when the tangent determinant changes sign (limit point).
    DeterminantChange,
}

/// Minimum unbalanced displacement norm control.
///
/// Iterations choose `Δλ = -(ΔÛ · ΔŪ) / (ΔÛ · ΔÛ)`, which minimizes the
/// norm of the corrected displacement increment.
#[derive(Clone, Debug)]
pub struct MinUnbalDispNorm {
    d_lambda1: f64,
    jd: usize,
    bounds: (f64, f64),
    sign_method: DeterminantSign,
    last_iterations: usize,
    sign: f64,
    /// Starts positive, so a step that opens on a negative-definite
    /// tangent reverses.
    last_det_sign: f64,
    delta_lambda_step: f64,
    phat: DVector<f64>,
}

impl MinUnbalDispNorm {
    pub fn new(d_lambda1: f64) -> IntegratorResult<Self> {
        Self::adaptive(d_lambda1, 1, d_lambda1, d_lambda1, DeterminantSign::LastStep)
    }

    pub fn adaptive(
        d_lambda1: f64,
        jd: usize,
        min: f64,
        max: f64,
        sign_method: DeterminantSign,
    ) -> IntegratorResult<Self> {
        check_jd(jd)?;
        if d_lambda1 == 0.0 || !d_lambda1.is_finite() {
            return Err(IntegratorError::invalid(format!(
                "first load increment must be non-zero, got {d_lambda1}"
            )));
        }
        Ok(Self {
            d_lambda1: d_lambda1.abs(),
            jd,
            bounds: (min.abs(), max.abs()),
            sign_method,
            last_iterations: jd,
            sign: d_lambda1.signum(),
            last_det_sign: 1.0,
            delta_lambda_step: 0.0,
            phat: DVector::zeros(0),
        })
    }

    fn step_sign(&mut self, soe: &dyn LinearSoe) -> f64 {
        match self.sign_method {
            DeterminantSign::LastStep => {
                if self.delta_lambda_step != 0.0 {
                    self.sign = self.delta_lambda_step.signum();
                }
            }
            DeterminantSign::DeterminantChange => match soe.determinant() {
                Some(det) => {
                    let det_sign = det.signum();
                    if det_sign != self.last_det_sign {
                        self.sign = -self.sign;
                    }
                    self.last_det_sign = det_sign;
                }
                None => {
                    tracing::warn!(
                        solver = soe.solver_name(),
                        "solver does not expose a determinant; keeping previous direction"
                    );
                }
            },
        }
        self.sign
    }
}

impl Integrator for MinUnbalDispNorm {
    fn name(&self) -> &'static str {
        "MinUnbalDispNorm"
    }

    fn domain_changed(&mut self, model: &AnalysisModel) -> IntegratorResult<()> {
        self.phat = DVector::zeros(model.num_eqn());
        self.delta_lambda_step = 0.0;
        self.last_det_sign = 1.0;
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
        let denom = uhat.dot(&uhat);
        if denom == 0.0 {
            return Err(IntegratorError::ZeroDenominator {
                what: "minimum unbalanced displacement norm",
            });
        }
        let d_lambda = -uhat.dot(delta) / denom;
        let du = delta + uhat * d_lambda;
        self.delta_lambda_step += d_lambda;
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

impl StaticIntegrator for MinUnbalDispNorm {
    fn new_step(
        &mut self,
        model: &mut AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        self.d_lambda1 = adapt_step(self.d_lambda1, self.jd, self.last_iterations, self.bounds);
        self.phat = model.reference_load();
        form_static_tangent(model, soe, TangentKind::Current)?;
        let uhat = solve_reference(soe, &self.phat)?;
        let d_lambda = self.step_sign(soe) * self.d_lambda1;
        self.delta_lambda_step = d_lambda;
        let lambda = model.time() + d_lambda;
        apply_increment(model, &(uhat * d_lambda), lambda)?;
        tracing::debug!(lambda, d_lambda, "min unbalanced displacement norm step");
        Ok(())
    }
}
