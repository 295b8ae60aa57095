use super::{Kinematics, NewmarkParams};
use crate::error::{IntegratorError, IntegratorResult};
use crate::integrator::assemble::{
    MatrixKind, TangentCoeffs, add_matrix_product, assemble_tangent, internal_forces,
};
use crate::integrator::{Integrator, TangentKind, TransientIntegrator};
use nalgebra::DVector;
use sa_core::timing::{Phase, Timer};
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;

/// α operator-splitting method.
///
/// The nonlinear restoring force is split into its value at the predictor
/// plus an initial-stiffness correction, so every step needs a single
/// linear solve:
///
/// ```text
/// (M/(βΔt²) + αγ/(βΔt) C + α K₀) ΔU =
///     α Pₙ₊₁ + (1-α) Pₙ - α (R(Ũ) + C Ṽ) - (1-α) (Rₙ + C Vₙ)
/// ```
#[derive(Clone, Debug)]
pub struct AlphaOs {
    alpha: f64,
    params: NewmarkParams,
    dt: f64,
    kin: Option<Kinematics>,
    updated: bool,
    force_prev: DVector<f64>,
    load_prev: DVector<f64>,
}

impl AlphaOs {
    pub fn new(alpha: f64) -> IntegratorResult<Self> {
        Self::with_params(alpha, NewmarkParams::for_alpha(alpha))
    }

    pub fn with_params(alpha: f64, params: NewmarkParams) -> IntegratorResult<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(IntegratorError::invalid(format!(
                "alpha-OS alpha must lie in (0, 1], got {alpha}"
            )));
        }
        Ok(Self {
            alpha,
            params,
            dt: 0.0,
            kin: None,
            updated: false,
            force_prev: DVector::zeros(0),
            load_prev: DVector::zeros(0),
        })
    }

    fn c2(&self) -> f64 {
        self.params.gamma / (self.params.beta * self.dt)
    }

    fn c3(&self) -> f64 {
        1.0 / (self.params.beta * self.dt * self.dt)
    }

    fn split_unbalance(&self, model: &AnalysisModel, soe: &mut dyn LinearSoe) -> IntegratorResult<()> {
        let a = self.alpha;
        let b = model.external_load() * a + &self.load_prev * (1.0 - a)
            - internal_forces(model, true) * a
            - &self.force_prev * (1.0 - a);
        soe.set_b(&b)?;
        add_matrix_product(model, soe, MatrixKind::Mass, &model.accel(), -1.0)
    }

    fn remember_committed(&mut self, model: &AnalysisModel) {
        self.force_prev = internal_forces(model, true);
        self.load_prev = model.external_load();
    }
}

impl Integrator for AlphaOs {
    fn name(&self) -> &'static str {
        "AlphaOS"
    }

    fn domain_changed(&mut self, model: &AnalysisModel) -> IntegratorResult<()> {
        self.kin = None;
        self.remember_committed(model);
        Ok(())
    }

    /// Always built from the initial stiffness.
    fn form_tangent(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
        _kind: TangentKind,
    ) -> IntegratorResult<()> {
        let coeffs = TangentCoeffs {
            k: self.alpha,
            c: self.alpha * self.c2(),
            m: self.c3(),
        };
        assemble_tangent(model, soe, TangentKind::Initial, coeffs)
    }

    fn form_unbalance(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        let timer = Timer::start();
        let result = self.split_unbalance(model, soe);
        timer.stop_into(Phase::AssembleUnbalance);
        result
    }

    fn update(
        &mut self,
        model: &mut AnalysisModel,
        _soe: &mut dyn LinearSoe,
        delta: &DVector<f64>,
    ) -> IntegratorResult<()> {
        if self.updated {
            return Err(IntegratorError::RepeatedUpdate {
                integrator: "AlphaOS",
            });
        }
        let (c2, c3) = (self.c2(), self.c3());
        let kin = self.kin.as_mut().ok_or(IntegratorError::NoStep {
            integrator: "AlphaOS",
        })?;
        kin.correct(delta, c2, c3);
        kin.push_to(model)?;
        model.update_domain()?;
        self.updated = true;
        Ok(())
    }

    fn commit(&mut self, model: &mut AnalysisModel, _iterations: usize) -> IntegratorResult<()> {
        model.commit_state()?;
        self.remember_committed(model);
        Ok(())
    }
}

impl TransientIntegrator for AlphaOs {
    fn new_step(&mut self, model: &mut AnalysisModel, dt: f64) -> IntegratorResult<()> {
        self.params.check_implicit(dt)?;
        self.dt = dt;
        if self.load_prev.len() != model.num_eqn() {
            self.remember_committed(model);
        }
        let mut kin = Kinematics::from_committed(model);
        kin.predict_zero_accel(dt, self.params);
        kin.push_to(model)?;
        model.apply_load(model.committed_time() + dt);
        model.update_domain()?;
        self.kin = Some(kin);
        self.updated = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::Newmark;
    use sa_model::ModelBuilder;
    use sa_model::elements::{LumpedMass, Spring};
    use sa_soe::FullGenSoe;

    fn oscillator() -> AnalysisModel {
        let mut b = ModelBuilder::new();
        let d = b.add_dof();
        b.add_element(Spring::linear(d, None, 4.0).unwrap());
        b.add_element(LumpedMass::new(d, 1.0).unwrap());
        let mut model = b.build().unwrap();
        model.set_vel(&DVector::from_element(1, 1.0)).unwrap();
        model.commit_state().unwrap();
        model
    }

    fn one_step(integrator: &mut dyn TransientIntegrator) -> f64 {
        let mut model = oscillator();
        let mut soe = FullGenSoe::default();
        soe.set_size(&model.dof_graph().unwrap()).unwrap();
        integrator.domain_changed(&model).unwrap();
        integrator.new_step(&mut model, 0.05).unwrap();
        integrator
            .form_tangent(&model, &mut soe, TangentKind::Current)
            .unwrap();
        integrator.form_unbalance(&model, &mut soe).unwrap();
        soe.solve().unwrap();
        let dx = soe.x().clone();
        integrator.update(&mut model, &mut soe, &dx).unwrap();
        integrator.commit(&mut model, 1).unwrap();
        model.committed_disp()[0]
    }

    #[test]
    fn alpha_one_on_linear_model_matches_newmark() {
        let u_os = one_step(&mut AlphaOs::new(1.0).unwrap());
        let u_nm = one_step(&mut Newmark::new(0.5, 0.25));
        assert!((u_os - u_nm).abs() < 1e-14);
    }

    #[test]
    fn second_update_is_rejected() {
        let mut model = oscillator();
        let mut soe = FullGenSoe::default();
        soe.set_size(&model.dof_graph().unwrap()).unwrap();
        let mut os = AlphaOs::new(0.9).unwrap();
        os.domain_changed(&model).unwrap();
        os.new_step(&mut model, 0.05).unwrap();
        let dx = DVector::zeros(1);
        os.update(&mut model, &mut soe, &dx).unwrap();
        assert!(matches!(
            os.update(&mut model, &mut soe, &dx),
            Err(IntegratorError::RepeatedUpdate { .. })
        ));
    }
}
