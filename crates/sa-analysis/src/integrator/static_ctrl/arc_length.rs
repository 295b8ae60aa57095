//! Spherical arc-length control: `‖ΔU‖² + α² Δλ² = s²` per step.

use super::{apply_increment, form_static_tangent, form_static_unbalance, solve_reference};
use crate::error::{IntegratorError, IntegratorResult};
use crate::integrator::{Integrator, StaticIntegrator, TangentKind};
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;

/// Step state shared by both arc-length variants.
#[derive(Clone, Debug)]
struct ArcState {
    arc_length2: f64,
    alpha2: f64,
    phat: DVector<f64>,
    delta_u_step: DVector<f64>,
    delta_lambda_step: f64,
}

impl ArcState {
    fn new(arc_length: f64, alpha: f64) -> IntegratorResult<Self> {
        if !(arc_length > 0.0 && arc_length.is_finite()) || !alpha.is_finite() {
            return Err(IntegratorError::invalid(format!(
                "arc length {arc_length} with alpha {alpha}"
            )));
        }
        Ok(Self {
            arc_length2: arc_length * arc_length,
            alpha2: alpha * alpha,
            phat: DVector::zeros(0),
            delta_u_step: DVector::zeros(0),
            delta_lambda_step: 0.0,
        })
    }

    fn reset(&mut self, n: usize) {
        self.phat = DVector::zeros(n);
        self.delta_u_step = DVector::zeros(n);
        self.delta_lambda_step = 0.0;
    }

    /// First iteration: tangent predictor on the arc, continuing in the
    /// direction of the previous step.
    fn predict(&mut self, model: &mut AnalysisModel, soe: &mut dyn LinearSoe) -> IntegratorResult<()> {
        let sign = if self.delta_lambda_step < 0.0 { -1.0 } else { 1.0 };
        self.phat = model.reference_load();
        form_static_tangent(model, soe, TangentKind::Current)?;
        let uhat = solve_reference(soe, &self.phat)?;

        let denom = uhat.dot(&uhat) + self.alpha2;
        if denom == 0.0 {
            return Err(IntegratorError::ZeroDenominator {
                what: "arc-length predictor (no reference load and alpha = 0)",
            });
        }
        let d_lambda = sign * (self.arc_length2 / denom).sqrt();
        let du = uhat * d_lambda;
        self.delta_lambda_step = d_lambda;
        self.delta_u_step = du.clone();
        let lambda = model.time() + d_lambda;
        apply_increment(model, &du, lambda)?;
        tracing::debug!(lambda, d_lambda, "arc-length step");
        Ok(())
    }

    fn correct(
        &mut self,
        model: &mut AnalysisModel,
        soe: &mut dyn LinearSoe,
        delta_ubar: &DVector<f64>,
        d_lambda: f64,
        uhat: &DVector<f64>,
    ) -> IntegratorResult<()> {
        let du = delta_ubar + uhat * d_lambda;
        self.delta_u_step += &du;
        self.delta_lambda_step += d_lambda;
        let lambda = model.time() + d_lambda;
        apply_increment(model, &du, lambda)?;
        soe.set_x(&du)?;
        Ok(())
    }
}

/// Arc-length with the exact quadratic constraint.
#[derive(Clone, Debug)]
pub struct ArcLength {
    state: ArcState,
}

impl ArcLength {
    pub fn new(arc_length: f64, alpha: f64) -> IntegratorResult<Self> {
        Ok(Self {
            state: ArcState::new(arc_length, alpha)?,
        })
    }

    /// Load-factor increment accumulated over the current step.
    pub fn step_load_increment(&self) -> f64 {
        self.state.delta_lambda_step
    }

    /// Root of `a Δλ² + b Δλ + c = 0` that keeps the step moving forward.
    fn select_root(
        &self,
        uhat: &DVector<f64>,
        ubar: &DVector<f64>,
    ) -> IntegratorResult<f64> {
        let s = &self.state;
        let a = s.alpha2 + uhat.dot(uhat);
        let b = 2.0
            * (s.alpha2 * s.delta_lambda_step + uhat.dot(ubar) + s.delta_u_step.dot(uhat));
        let c = 2.0 * s.delta_u_step.dot(ubar) + ubar.dot(ubar);

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return Err(IntegratorError::ImaginaryRoots { discriminant });
        }
        if a == 0.0 {
            return Err(IntegratorError::ZeroDenominator {
                what: "arc-length quadratic",
            });
        }
        let sqrt_d = discriminant.sqrt();
        let l1 = (-b + sqrt_d) / (2.0 * a);
        let l2 = (-b - sqrt_d) / (2.0 * a);

        let base = s.delta_u_step.dot(&s.delta_u_step) + ubar.dot(&s.delta_u_step);
        let val = uhat.dot(&s.delta_u_step);
        let theta1 = base + l1 * val;
        let theta2 = base + l2 * val;
        Ok(if theta1 >= theta2 { l1 } else { l2 })
    }
}

/// Arc-length with the constraint linearized about the current step
/// (normal-plane iteration).
#[derive(Clone, Debug)]
pub struct ArcLength1 {
    state: ArcState,
}

impl ArcLength1 {
    pub fn new(arc_length: f64, alpha: f64) -> IntegratorResult<Self> {
        Ok(Self {
            state: ArcState::new(arc_length, alpha)?,
        })
    }

    /// `Δλ` that keeps the correction orthogonal to the step so far.
    fn project(&self, uhat: &DVector<f64>, ubar: &DVector<f64>) -> IntegratorResult<f64> {
        let s = &self.state;
        let denom = s.delta_u_step.dot(uhat) + s.alpha2 * s.delta_lambda_step;
        if denom == 0.0 {
            return Err(IntegratorError::ZeroDenominator {
                what: "arc-length projection",
            });
        }
        Ok(-s.delta_u_step.dot(ubar) / denom)
    }
}

impl StaticIntegrator for ArcLength {
    fn new_step(
        &mut self,
        model: &mut AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        self.state.predict(model, soe)
    }
}

impl StaticIntegrator for ArcLength1 {
    fn new_step(
        &mut self,
        model: &mut AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        self.state.predict(model, soe)
    }
}

impl Integrator for ArcLength {
    fn name(&self) -> &'static str {
        "ArcLength"
    }

    fn domain_changed(&mut self, model: &AnalysisModel) -> IntegratorResult<()> {
        self.state.reset(model.num_eqn());
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
        let uhat = solve_reference(soe, &self.state.phat)?;
        let d_lambda = self.select_root(&uhat, delta)?;
        self.state.correct(model, soe, delta, d_lambda, &uhat)
    }
}

impl Integrator for ArcLength1 {
    fn name(&self) -> &'static str {
        "ArcLength1"
    }

    fn domain_changed(&mut self, model: &AnalysisModel) -> IntegratorResult<()> {
        self.state.reset(model.num_eqn());
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
        let uhat = solve_reference(soe, &self.state.phat)?;
        let d_lambda = self.project(&uhat, delta)?;
        self.state.correct(model, soe, delta, d_lambda, &uhat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(x)
    }

    /// Part way through a step of length 1 along `step`.
    fn on_step(state: &mut ArcState, step: &[f64]) {
        state.reset(step.len());
        state.delta_u_step = v(step);
        state.delta_lambda_step = 1.0;
    }

    fn arc1(alpha: f64, step: &[f64]) -> ArcLength1 {
        let mut arc = ArcLength1::new(1.0, alpha).unwrap();
        on_step(&mut arc.state, step);
        arc
    }

    fn quadratic_arc(alpha: f64, step: &[f64]) -> ArcLength {
        let mut arc = ArcLength::new(1.0, alpha).unwrap();
        on_step(&mut arc.state, step);
        arc
    }

    #[test]
    fn projection_with_orthogonal_reference_is_zero_denominator() {
        let arc = arc1(0.0, &[1.0, 0.0]);
        let err = arc.project(&v(&[0.0, 1.0]), &v(&[0.3, 0.2])).unwrap_err();
        assert!(matches!(err, IntegratorError::ZeroDenominator { .. }));
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn projection_cancels_the_along_step_correction() {
        let arc = arc1(0.0, &[1.0, 0.0]);
        let d_lambda = arc.project(&v(&[2.0, 0.0]), &v(&[0.5, 0.0])).unwrap();
        assert!((d_lambda + 0.25).abs() < 1e-15);
    }

    #[test]
    fn alpha_keeps_projection_defined() {
        let arc = arc1(1.0, &[1.0, 0.0]);
        let d_lambda = arc.project(&v(&[0.0, 1.0]), &v(&[0.5, 0.0])).unwrap();
        assert!((d_lambda + 0.5).abs() < 1e-15);
    }

    #[test]
    fn quadratic_root_continues_forward() {
        let arc = quadratic_arc(0.0, &[1.0]);
        // roots -0.5 (back onto the arc ahead) and -2.5 (reversal)
        let d_lambda = arc.select_root(&v(&[1.0]), &v(&[0.5])).unwrap();
        assert!((d_lambda + 0.5).abs() < 1e-12);
    }

    #[test]
    fn correction_missing_the_arc_is_imaginary_roots() {
        let arc = quadratic_arc(0.0, &[1.0, 0.0]);
        let err = arc
            .select_root(&v(&[1.0, 0.0]), &v(&[0.0, 3.0]))
            .unwrap_err();
        assert!(matches!(err, IntegratorError::ImaginaryRoots { .. }));
        assert_eq!(err.code(), -2);
    }
}
