//! Transient (time-stepping) integrators of the Newmark family.
//!
//! All of them start a step from the committed response with the Newmark
//! predictor
//!
//! ```text
//! Ũ = Uₙ + Δt Vₙ + (½ - β) Δt² Aₙ
//! Ṽ = Vₙ + (1 - γ) Δt Aₙ
//! Ã = 0
//! ```
//!
//! and correct with `U = Ũ + ΔU`, `A = ΔU / (β Δt²)`, `V = Ṽ + γ Δt A`
//! (or the acceleration form for the explicit variants).

mod alpha_os;
mod central_difference;
mod hht;
mod newmark;

pub use alpha_os::AlphaOs;
pub use central_difference::CentralDifference;
pub use hht::Hht;
pub use newmark::{Newmark, NewmarkExplicit};

use crate::error::{IntegratorError, IntegratorResult};
use nalgebra::DVector;
use sa_model::AnalysisModel;

/// Newmark γ and β.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NewmarkParams {
    pub gamma: f64,
    pub beta: f64,
}

impl NewmarkParams {
    /// Trapezoidal rule, unconditionally stable.
    pub const AVERAGE_ACCELERATION: NewmarkParams = NewmarkParams {
        gamma: 0.5,
        beta: 0.25,
    };

    pub const LINEAR_ACCELERATION: NewmarkParams = NewmarkParams {
        gamma: 0.5,
        beta: 1.0 / 6.0,
    };

    pub fn new(gamma: f64, beta: f64) -> Self {
        Self { gamma, beta }
    }

    /// Parameters that give HHT/α-OS their numerical damping for `alpha`.
    pub fn for_alpha(alpha: f64) -> Self {
        Self {
            gamma: 1.5 - alpha,
            beta: (2.0 - alpha).powi(2) / 4.0,
        }
    }

    /// Unconditional stability of the implicit scheme.
    pub fn is_unconditionally_stable(&self) -> bool {
        self.gamma >= 0.5 && self.beta >= 0.25 * (self.gamma + 0.5).powi(2) - 1e-12
    }

    fn check_implicit(&self, dt: f64) -> IntegratorResult<()> {
        check_dt(dt)?;
        if self.beta <= 0.0 || self.gamma <= 0.0 {
            return Err(IntegratorError::invalid(format!(
                "implicit Newmark needs beta > 0 and gamma > 0, got beta {} gamma {}",
                self.beta, self.gamma
            )));
        }
        Ok(())
    }
}

impl Default for NewmarkParams {
    fn default() -> Self {
        Self::AVERAGE_ACCELERATION
    }
}

fn check_dt(dt: f64) -> IntegratorResult<()> {
    if dt > 0.0 && dt.is_finite() {
        Ok(())
    } else {
        Err(IntegratorError::invalid(format!(
            "time step must be positive, got {dt}"
        )))
    }
}

/// Committed and trial response in equation space.
#[derive(Clone, Debug)]
struct Kinematics {
    ut: DVector<f64>,
    vt: DVector<f64>,
    at: DVector<f64>,
    u: DVector<f64>,
    v: DVector<f64>,
    a: DVector<f64>,
}

impl Kinematics {
    fn from_committed(model: &AnalysisModel) -> Self {
        let (ut, vt, at) = (
            model.committed_disp(),
            model.committed_vel(),
            model.committed_accel(),
        );
        Self {
            u: ut.clone(),
            v: vt.clone(),
            a: at.clone(),
            ut,
            vt,
            at,
        }
    }

    /// Newmark predictor. The trial acceleration is zero, so anything that
    /// reads `A` before the first correction sees no inertia.
    fn predict_zero_accel(&mut self, dt: f64, p: NewmarkParams) {
        self.u = &self.ut + &self.vt * dt + &self.at * ((0.5 - p.beta) * dt * dt);
        self.v = &self.vt + &self.at * ((1.0 - p.gamma) * dt);
        self.a = DVector::zeros(self.ut.len());
    }

    /// Displacement-form correction.
    fn correct(&mut self, du: &DVector<f64>, c2: f64, c3: f64) {
        self.u += du;
        self.v.axpy(c2, du, 1.0);
        self.a.axpy(c3, du, 1.0);
    }

    fn push_to(&self, model: &mut AnalysisModel) -> IntegratorResult<()> {
        model.set_response(&self.u, &self.v, &self.a)?;
        Ok(())
    }

    /// `(1 - α) Xₙ + α X` for displacement and velocity.
    fn weighted(&self, alpha: f64) -> (DVector<f64>, DVector<f64>) {
        (
            &self.ut * (1.0 - alpha) + &self.u * alpha,
            &self.vt * (1.0 - alpha) + &self.v * alpha,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_parameters_match_hht_defaults() {
        let p = NewmarkParams::for_alpha(1.0);
        assert_eq!(p, NewmarkParams::AVERAGE_ACCELERATION);
        let p = NewmarkParams::for_alpha(0.9);
        assert!((p.gamma - 0.6).abs() < 1e-15);
        assert!((p.beta - 0.3025).abs() < 1e-15);
        assert!(p.is_unconditionally_stable());
        assert!(!NewmarkParams::LINEAR_ACCELERATION.is_unconditionally_stable());
    }

    #[test]
    fn implicit_check_rejects_bad_input() {
        assert!(NewmarkParams::new(0.5, 0.0).check_implicit(0.1).is_err());
        assert!(NewmarkParams::new(0.0, 0.25).check_implicit(0.1).is_err());
        assert!(NewmarkParams::default().check_implicit(0.0).is_err());
        assert!(NewmarkParams::default().check_implicit(0.01).is_ok());
    }

    #[test]
    fn predictor_then_correction_satisfies_newmark_relations() {
        let p = NewmarkParams::default();
        let dt = 0.1;
        let mut k = Kinematics {
            ut: DVector::from_vec(vec![1.0]),
            vt: DVector::from_vec(vec![2.0]),
            at: DVector::from_vec(vec![-4.0]),
            u: DVector::zeros(1),
            v: DVector::zeros(1),
            a: DVector::zeros(1),
        };
        k.predict_zero_accel(dt, p);
        let du = DVector::from_vec(vec![0.05]);
        k.correct(&du, p.gamma / (p.beta * dt), 1.0 / (p.beta * dt * dt));
        let (ut, vt, at) = (1.0, 2.0, -4.0);
        let (u, v, a) = (k.u[0], k.v[0], k.a[0]);
        let u_nm = ut + dt * vt + dt * dt * ((0.5 - p.beta) * at + p.beta * a);
        let v_nm = vt + dt * ((1.0 - p.gamma) * at + p.gamma * a);
        assert!((u - u_nm).abs() < 1e-12);
        assert!((v - v_nm).abs() < 1e-12);
    }
}
