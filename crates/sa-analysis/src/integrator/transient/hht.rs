use super::{Kinematics, NewmarkParams};
use crate::error::{IntegratorError, IntegratorResult};
use crate::integrator::assemble::{TangentCoeffs, assemble_tangent, assemble_unbalance};
use crate::integrator::{Integrator, TangentKind, TransientIntegrator};
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;

/// Hilber–Hughes–Taylor α method.
///
/// Equilibrium is enforced at `t + αΔt` with the displacement and
/// velocity weighted as `(1 - α) Xₙ + α Xₙ₊₁`. `α = 1` recovers the
/// average acceleration rule; smaller values add high-frequency damping.
#[derive(Clone, Debug)]
pub struct Hht {
    alpha: f64,
    params: NewmarkParams,
    dt: f64,
    kin: Option<Kinematics>,
}

impl Hht {
    /// β and γ from `alpha`.
    pub fn new(alpha: f64) -> IntegratorResult<Self> {
        Self::with_params(alpha, NewmarkParams::for_alpha(alpha))
    }

    pub fn with_params(alpha: f64, params: NewmarkParams) -> IntegratorResult<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(IntegratorError::invalid(format!(
                "HHT alpha must lie in (0, 1], got {alpha}"
            )));
        }
        if alpha < 2.0 / 3.0 {
            tracing::warn!(alpha, "HHT alpha below 2/3 loses second-order accuracy");
        }
        Ok(Self {
            alpha,
            params,
            dt: 0.0,
            kin: None,
        })
    }

    fn push_weighted(&self, kin: &Kinematics, model: &mut AnalysisModel) -> IntegratorResult<()> {
        let (u, v) = kin.weighted(self.alpha);
        model.set_response(&u, &v, &kin.a)?;
        model.update_domain()?;
        Ok(())
    }
}

impl Integrator for Hht {
    fn name(&self) -> &'static str {
        "HHT"
    }

    fn domain_changed(&mut self, _model: &AnalysisModel) -> IntegratorResult<()> {
        self.kin = None;
        Ok(())
    }

    fn form_tangent(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
        kind: TangentKind,
    ) -> IntegratorResult<()> {
        let p = self.params;
        let coeffs = TangentCoeffs {
            k: self.alpha,
            c: self.alpha * p.gamma / (p.beta * self.dt),
            m: 1.0 / (p.beta * self.dt * self.dt),
        };
        assemble_tangent(model, soe, kind, coeffs)
    }

    fn form_unbalance(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        let load = model.external_load();
        assemble_unbalance(model, soe, &load, true)
    }

    fn update(
        &mut self,
        model: &mut AnalysisModel,
        _soe: &mut dyn LinearSoe,
        delta: &DVector<f64>,
    ) -> IntegratorResult<()> {
        let mut kin = self.kin.take().ok_or(IntegratorError::NoStep { integrator: "HHT" })?;
        let p = self.params;
        kin.correct(delta, p.gamma / (p.beta * self.dt), 1.0 / (p.beta * self.dt * self.dt));
        let result = self.push_weighted(&kin, model);
        self.kin = Some(kin);
        result
    }

    /// Move the model from `t + αΔt` to `t + Δt` before committing.
    fn commit(&mut self, model: &mut AnalysisModel, _iterations: usize) -> IntegratorResult<()> {
        let kin = self.kin.as_ref().ok_or(IntegratorError::NoStep { integrator: "HHT" })?;
        kin.push_to(model)?;
        model.apply_load(model.committed_time() + self.dt);
        model.update_domain()?;
        model.commit_state()?;
        Ok(())
    }
}

impl TransientIntegrator for Hht {
    fn new_step(&mut self, model: &mut AnalysisModel, dt: f64) -> IntegratorResult<()> {
        self.params.check_implicit(dt)?;
        self.dt = dt;
        let mut kin = Kinematics::from_committed(model);
        kin.predict_zero_accel(dt, self.params);
        model.apply_load(model.committed_time() + self.alpha * dt);
        self.push_weighted(&kin, model)?;
        self.kin = Some(kin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_model::ModelBuilder;
    use sa_model::elements::{LumpedMass, Spring};

    #[test]
    fn alpha_outside_range_is_rejected() {
        assert!(Hht::new(0.0).is_err());
        assert!(Hht::new(1.2).is_err());
        assert!(Hht::new(0.8).is_ok());
    }

    #[test]
    fn state_is_weighted_during_step_and_full_at_commit() {
        let mut b = ModelBuilder::new();
        let d = b.add_dof();
        b.add_element(Spring::linear(d, None, 1.0).unwrap());
        b.add_element(LumpedMass::new(d, 1.0).unwrap());
        let mut model = b.build().unwrap();
        model.set_vel(&DVector::from_element(1, 1.0)).unwrap();
        model.commit_state().unwrap();

        let mut hht = Hht::new(0.8).unwrap();
        hht.new_step(&mut model, 0.1).unwrap();
        // predicted U = 0.1, weighted 0.8 * 0.1
        assert!((model.disp()[0] - 0.08).abs() < 1e-15);
        assert!((model.time() - 0.08).abs() < 1e-15);

        hht.commit(&mut model, 1).unwrap();
        assert!((model.committed_disp()[0] - 0.1).abs() < 1e-15);
        assert!((model.committed_time() - 0.1).abs() < 1e-15);
    }
}
