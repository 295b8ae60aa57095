//! Quasi-Newton iteration with Broyden's inverse update.
//!
//! One tangent `K0` is factored; the inverse is corrected with rank-one
//! secant terms
//!
//! ```text
//! H_{i+1} v = H_i v + (s_i - z_i) (s_i · H_i v) / (s_i · z_i),   z_i = H_i y_i
//! ```
//!
//! where `s_i` is the applied increment and `y_i` the drop in unbalance.

use super::{AnalysisLinks, SolutionAlgorithm, StepReport};
use crate::error::{AnalysisError, AnalysisResult, IntegratorError};
use crate::integrator::TangentKind;
use nalgebra::DVector;

struct Secant {
    s: DVector<f64>,
    z: DVector<f64>,
    sz: f64,
}

pub struct Broyden {
    count: usize,
    history: Vec<Secant>,
}

impl Broyden {
    /// Re-form the tangent after `count` secant updates.
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
            history: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// `H v`, given `w = K0⁻¹ v`.
    fn apply_inverse(&self, mut w: DVector<f64>) -> DVector<f64> {
        for secant in &self.history {
            let scale = secant.s.dot(&w) / secant.sz;
            w += (&secant.s - &secant.z) * scale;
        }
        w
    }

    /// Solve `K0 x = v` with the factored tangent, leaving `b` unchanged.
    fn initial_solve(
        links: &mut AnalysisLinks<'_>,
        v: &DVector<f64>,
    ) -> AnalysisResult<DVector<f64>> {
        let b = links.soe.b().clone();
        links.soe.set_b(v).map_err(AnalysisError::Solve)?;
        let x = links.solve()?;
        links.soe.set_b(&b).map_err(AnalysisError::Solve)?;
        Ok(x)
    }
}

impl Default for Broyden {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SolutionAlgorithm for Broyden {
    fn name(&self) -> &'static str {
        "Broyden"
    }

    fn solve_current_step(&mut self, links: &mut AnalysisLinks<'_>) -> AnalysisResult<StepReport> {
        self.history.clear();
        links.form_unbalance()?;
        links.start_test()?;
        let mut reform = true;
        loop {
            if reform {
                links.form_tangent(TangentKind::Current)?;
                self.history.clear();
                reform = false;
            }
            let b_old = links.soe.b().clone();
            let w = links.solve()?;
            let delta = self.apply_inverse(w);
            // path-following integrators overwrite x with the step they applied
            links.soe.set_x(&delta).map_err(AnalysisError::Solve)?;
            links.update(&delta)?;
            let applied = links.soe.x().clone();
            links.form_unbalance()?;

            // y = b_old - b_new, the secant image of the applied step
            let y = &b_old - links.soe.b();
            let z = self.apply_inverse(Self::initial_solve(links, &y)?);
            let sz = applied.dot(&z);
            if sz == 0.0 {
                return Err(AnalysisError::Update(IntegratorError::ZeroDenominator {
                    what: "Broyden secant update",
                }));
            }
            links.soe.set_x(&applied).map_err(AnalysisError::Solve)?;

            let verdict = links.check()?;
            if let Some(outcome) = links.conclude(self.name(), verdict) {
                return outcome;
            }
            self.history.push(Secant { s: applied, z, sz });
            if self.history.len() >= self.count {
                tracing::debug!(count = self.count, "Broyden window full, re-forming tangent");
                reform = true;
            }
        }
    }

    fn domain_changed(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_the_initial_inverse() {
        let b = Broyden::new(3);
        let w = DVector::from_vec(vec![1.0, 2.0]);
        assert_eq!(b.apply_inverse(w.clone()), w);
    }

    #[test]
    fn secant_update_maps_y_to_s() {
        // K0 = I, true K = 2 I: one secant pair s = 0.5 y
        let mut b = Broyden::new(3);
        let y = DVector::from_vec(vec![1.0, 0.0]);
        let s = DVector::from_vec(vec![0.5, 0.0]);
        let z = b.apply_inverse(y.clone());
        let sz = s.dot(&z);
        b.history.push(Secant { s: s.clone(), z, sz });
        let hy = b.apply_inverse(y);
        assert!((hy - s).norm() < 1e-14);
    }
}
