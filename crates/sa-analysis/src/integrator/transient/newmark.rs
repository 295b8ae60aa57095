use super::{Kinematics, NewmarkParams, check_dt};
use crate::error::{IntegratorError, IntegratorResult};
use crate::integrator::assemble::{TangentCoeffs, assemble_tangent, assemble_unbalance};
use crate::integrator::{Integrator, TangentKind, TransientIntegrator};
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;

fn form_dynamic_unbalance(model: &AnalysisModel, soe: &mut dyn LinearSoe) -> IntegratorResult<()> {
    let load = model.external_load();
    assemble_unbalance(model, soe, &load, true)
}

/// Implicit Newmark, displacement form.
///
/// Tangent `K + γ/(βΔt) C + 1/(βΔt²) M`.
#[derive(Clone, Debug)]
pub struct Newmark {
    params: NewmarkParams,
    c2: f64,
    c3: f64,
    kin: Option<Kinematics>,
}

impl Newmark {
    pub fn new(gamma: f64, beta: f64) -> Self {
        Self::with_params(NewmarkParams::new(gamma, beta))
    }

    pub fn with_params(params: NewmarkParams) -> Self {
        Self {
            params,
            c2: 0.0,
            c3: 0.0,
            kin: None,
        }
    }

    pub fn params(&self) -> NewmarkParams {
        self.params
    }
}

impl Integrator for Newmark {
    fn name(&self) -> &'static str {
        "Newmark"
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
        let coeffs = TangentCoeffs {
            k: 1.0,
            c: self.c2,
            m: self.c3,
        };
        assemble_tangent(model, soe, kind, coeffs)
    }

    fn form_unbalance(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        form_dynamic_unbalance(model, soe)
    }

    fn update(
        &mut self,
        model: &mut AnalysisModel,
        _soe: &mut dyn LinearSoe,
        delta: &DVector<f64>,
    ) -> IntegratorResult<()> {
        let kin = self.kin.as_mut().ok_or(IntegratorError::NoStep {
            integrator: "Newmark",
        })?;
        kin.correct(delta, self.c2, self.c3);
        kin.push_to(model)?;
        model.update_domain()?;
        Ok(())
    }
}

impl TransientIntegrator for Newmark {
    fn new_step(&mut self, model: &mut AnalysisModel, dt: f64) -> IntegratorResult<()> {
        self.params.check_implicit(dt)?;
        let p = self.params;
        self.c2 = p.gamma / (p.beta * dt);
        self.c3 = 1.0 / (p.beta * dt * dt);

        let mut kin = Kinematics::from_committed(model);
        kin.predict_zero_accel(dt, p);
        kin.push_to(model)?;
        model.apply_load(model.committed_time() + dt);
        model.update_domain()?;
        self.kin = Some(kin);
        Ok(())
    }
}

/// Explicit Newmark (β = 0), acceleration form.
///
/// Solves `(M + γΔt C) ΔA = R` once per step; stiffness enters only through
/// the predicted displacement.
#[derive(Clone, Debug)]
pub struct NewmarkExplicit {
    gamma: f64,
    c2: f64,
    kin: Option<Kinematics>,
    updated: bool,
}

impl NewmarkExplicit {
    pub fn new(gamma: f64) -> IntegratorResult<Self> {
        if !(gamma > 0.0 && gamma.is_finite()) {
            return Err(IntegratorError::invalid(format!(
                "explicit Newmark needs gamma > 0, got {gamma}"
            )));
        }
        Ok(Self {
            gamma,
            c2: 0.0,
            kin: None,
            updated: false,
        })
    }
}

impl Integrator for NewmarkExplicit {
    fn name(&self) -> &'static str {
        "NewmarkExplicit"
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
        let coeffs = TangentCoeffs {
            k: 0.0,
            c: self.c2,
            m: 1.0,
        };
        assemble_tangent(model, soe, kind, coeffs)
    }

    fn form_unbalance(
        &mut self,
        model: &AnalysisModel,
        soe: &mut dyn LinearSoe,
    ) -> IntegratorResult<()> {
        form_dynamic_unbalance(model, soe)
    }

    fn update(
        &mut self,
        model: &mut AnalysisModel,
        _soe: &mut dyn LinearSoe,
        delta: &DVector<f64>,
    ) -> IntegratorResult<()> {
        if self.updated {
            return Err(IntegratorError::RepeatedUpdate {
                integrator: "NewmarkExplicit",
            });
        }
        let kin = self.kin.as_mut().ok_or(IntegratorError::NoStep {
            integrator: "NewmarkExplicit",
        })?;
        kin.a += delta;
        kin.v.axpy(self.c2, delta, 1.0);
        kin.push_to(model)?;
        model.update_domain()?;
        self.updated = true;
        Ok(())
    }
}

impl TransientIntegrator for NewmarkExplicit {
    fn new_step(&mut self, model: &mut AnalysisModel, dt: f64) -> IntegratorResult<()> {
        check_dt(dt)?;
        let params = NewmarkParams::new(self.gamma, 0.0);
        self.c2 = self.gamma * dt;

        let mut kin = Kinematics::from_committed(model);
        kin.predict_zero_accel(dt, params);
        kin.push_to(model)?;
        model.apply_load(model.committed_time() + dt);
        model.update_domain()?;
        self.kin = Some(kin);
        self.updated = false;
        Ok(())
    }
}
