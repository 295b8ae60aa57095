use super::check_dt;
use crate::error::{IntegratorError, IntegratorResult};
use crate::integrator::assemble::{
    MatrixKind, TangentCoeffs, add_matrix_product, assemble_tangent, internal_forces,
};
use crate::integrator::{Integrator, TangentKind, TransientIntegrator};
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;

/// Explicit central difference in displacement form.
///
/// Equilibrium is written at `tₙ`:
///
/// ```text
/// (M/Δt² + C/(2Δt)) Uₙ₊₁ = Pₙ - R(Uₙ) + M (2Uₙ - Uₙ₋₁)/Δt² + C Uₙ₋₁/(2Δt)
/// ```
///
/// The solved vector is the new displacement itself, not an increment, so
/// each step accepts exactly one update.
///
/// The stored velocity is the second-order backward difference at `tₙ₊₁`;
/// the stored acceleration is the centred value at `tₙ`.
#[derive(Clone, Debug)]
pub struct CentralDifference {
    dt: f64,
    u_prev: Option<DVector<f64>>,
    u_now: DVector<f64>,
    updated: bool,
}

impl CentralDifference {
    pub fn new() -> Self {
        Self {
            dt: 0.0,
            u_prev: None,
            u_now: DVector::zeros(0),
            updated: false,
        }
    }

    fn c2(&self) -> f64 {
        0.5 / self.dt
    }

    fn c3(&self) -> f64 {
        1.0 / (self.dt * self.dt)
    }
}

impl Default for CentralDifference {
    fn default() -> Self {
        Self::new()
    }
}

impl Integrator for CentralDifference {
    fn name(&self) -> &'static str {
        "CentralDifference"
    }

    fn domain_changed(&mut self, _model: &AnalysisModel) -> IntegratorResult<()> {
        self.u_prev = None;
        Ok(())
    }

    fn form_tangent(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
        kind: TangentKind,
    ) -> IntegratorResult<()> {
        let coeffs = TangentCoeffs {
            k: 0.0,
            c: self.c2(),
            m: self.c3(),
        };
        assemble_tangent(model, soe, kind, coeffs)
    }

    fn form_unbalance(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        let u_prev = self.u_prev.as_ref().ok_or(IntegratorError::NoStep {
            integrator: "CentralDifference",
        })?;
        let b = model.external_load() - internal_forces(model, false);
        soe.set_b(&b)?;
        let mass_arg = &self.u_now * 2.0 - u_prev;
        add_matrix_product(model, soe, MatrixKind::Mass, &mass_arg, self.c3())?;
        add_matrix_product(model, soe, MatrixKind::Damping, u_prev, self.c2())
    }

    fn update(
        &mut self,
        model: &mut AnalysisModel,
        _soe: &mut dyn LinearSoe,
        delta: &DVector<f64>,
    ) -> IntegratorResult<()> {
        if self.updated {
            return Err(IntegratorError::RepeatedUpdate {
                integrator: "CentralDifference",
            });
        }
        let u_prev = self.u_prev.as_ref().ok_or(IntegratorError::NoStep {
            integrator: "CentralDifference",
        })?;
        let vel = (delta * 3.0 - &self.u_now * 4.0 + u_prev) * self.c2();
        let accel = (delta - &self.u_now * 2.0 + u_prev) * self.c3();
        model.set_response(delta, &vel, &accel)?;
        model.apply_load(model.committed_time() + self.dt);
        model.update_domain()?;
        self.updated = true;
        Ok(())
    }

    fn commit(&mut self, model: &mut AnalysisModel, _iterations: usize) -> IntegratorResult<()> {
        model.commit_state()?;
        self.u_prev = Some(self.u_now.clone());
        Ok(())
    }
}

impl TransientIntegrator for CentralDifference {
    fn new_step(&mut self, model: &mut AnalysisModel, dt: f64) -> IntegratorResult<()> {
        check_dt(dt)?;
        let u = model.committed_disp();
        if self.u_prev.is_none() || dt != self.dt {
            // start-up (or step change): Uₙ₋₁ from a Taylor expansion
            let v = model.committed_vel();
            let a = model.committed_accel();
            self.u_prev = Some(&u - &v * dt + &a * (0.5 * dt * dt));
        }
        self.dt = dt;
        self.u_now = u;
        self.updated = false;
        model.apply_load(model.committed_time());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_model::ModelBuilder;
    use sa_model::elements::{LumpedMass, Spring};
    use sa_soe::DiagonalSoe;

    #[test]
    fn free_vibration_tracks_cosine() {
        // m = 1, k = 1, u0 = 1: u(t) = cos t
        let mut b = ModelBuilder::new();
        let d = b.add_dof();
        b.add_element(Spring::linear(d, None, 1.0).unwrap());
        b.add_element(LumpedMass::new(d, 1.0).unwrap());
        let mut model = b.build().unwrap();
        model.set_disp(&DVector::from_element(1, 1.0)).unwrap();
        model.set_accel(&DVector::from_element(1, -1.0)).unwrap();
        model.update_domain().unwrap();
        model.commit_state().unwrap();

        let mut soe = DiagonalSoe::default();
        soe.set_size(&model.dof_graph().unwrap()).unwrap();
        let mut cd = CentralDifference::new();
        cd.domain_changed(&model).unwrap();
        let dt = 0.01;
        for _ in 0..100 {
            cd.new_step(&mut model, dt).unwrap();
            cd.form_tangent(&model, &mut soe, TangentKind::Current).unwrap();
            cd.form_unbalance(&model, &mut soe).unwrap();
            soe.solve().unwrap();
            let x = soe.x().clone();
            cd.update(&mut model, &mut soe, &x).unwrap();
            cd.commit(&mut model, 1).unwrap();
        }
        assert!((model.time() - 1.0).abs() < 1e-9);
        assert!((model.disp()[0] - 1.0f64.cos()).abs() < 1e-4);
        // velocity belongs to t = 1, not the step before
        assert!((model.vel()[0] + 1.0f64.sin()).abs() < 1e-3);
    }
}
