//! Rayleigh damping.

use nalgebra::DMatrix;

/// `C = alpha_m M + beta_k K + beta_k0 K0 + beta_kc Kc`
///
/// `K` is the current tangent, `K0` the initial stiffness and `Kc` the last
/// committed tangent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayleighDamping {
    pub alpha_m: f64,
    pub beta_k: f64,
    pub beta_k0: f64,
    pub beta_kc: f64,
}

impl RayleighDamping {
    pub fn is_zero(&self) -> bool {
        self.alpha_m == 0.0 && self.beta_k == 0.0 && self.beta_k0 == 0.0 && self.beta_kc == 0.0
    }

    /// Mass- and stiffness-proportional factors that give `zeta` damping at
    /// the circular frequencies `w1` and `w2`.
    pub fn from_modal(zeta: f64, w1: f64, w2: f64) -> Self {
        Self {
            alpha_m: 2.0 * zeta * w1 * w2 / (w1 + w2),
            beta_k: 2.0 * zeta / (w1 + w2),
            ..Self::default()
        }
    }

    pub(crate) fn matrix(
        &self,
        mass: impl FnOnce() -> DMatrix<f64>,
        tangent: impl FnOnce() -> DMatrix<f64>,
        initial: impl FnOnce() -> DMatrix<f64>,
        committed: impl FnOnce() -> DMatrix<f64>,
        n: usize,
    ) -> DMatrix<f64> {
        let mut c = DMatrix::zeros(n, n);
        if self.alpha_m != 0.0 {
            c += mass() * self.alpha_m;
        }
        if self.beta_k != 0.0 {
            c += tangent() * self.beta_k;
        }
        if self.beta_k0 != 0.0 {
            c += initial() * self.beta_k0;
        }
        if self.beta_kc != 0.0 {
            c += committed() * self.beta_kc;
        }
        c
    }
}
