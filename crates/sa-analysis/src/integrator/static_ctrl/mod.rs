//! Static (load-factor) integrators.
//!
//! The model time is the load factor λ. All integrators here share the
//! static tangent `K` and unbalance `P(λ) - R(U)`; they differ in how λ is
//! chosen at the start of a step and during iterations. Path-following
//! schemes use the reference load `P̂ = P(1) - P(0)`.

mod arc_length;
mod displacement_control;
mod load_control;
mod min_unbal;

pub use arc_length::{ArcLength, ArcLength1};
pub use displacement_control::DisplacementControl;
pub use load_control::LoadControl;
pub use min_unbal::{DeterminantSign, MinUnbalDispNorm};

use super::TangentKind;
use super::assemble::{TangentCoeffs, assemble_tangent, assemble_unbalance};
use crate::error::{IntegratorError, IntegratorResult};
use nalgebra::DVector;
use sa_model::AnalysisModel;
use sa_soe::LinearSoe;

fn form_static_tangent(
    model: &AnalysisModel,
    soe: &mut dyn LinearSoe,
    kind: TangentKind,
) -> IntegratorResult<()> {
    assemble_tangent(model, soe, kind, TangentCoeffs::STATIC)
}

fn form_static_unbalance(model: &AnalysisModel, soe: &mut dyn LinearSoe) -> IntegratorResult<()> {
    let load = model.external_load();
    assemble_unbalance(model, soe, &load, false)
}

/// Solve `K ΔÛ = P̂` with the current factorization.
fn solve_reference(soe: &mut dyn LinearSoe, phat: &DVector<f64>) -> IntegratorResult<DVector<f64>> {
    soe.set_b(phat)?;
    soe.solve()?;
    Ok(soe.x().clone())
}

/// `U += du`, move to `lambda` and bring the elements along.
fn apply_increment(
    model: &mut AnalysisModel,
    du: &DVector<f64>,
    lambda: f64,
) -> IntegratorResult<()> {
    model.incr_disp(du, 1.0)?;
    model.apply_load(lambda);
    model.update_domain()?;
    Ok(())
}

/// Step size scaled by `jd / last_iterations` and clamped to `[lo, hi]`.
fn adapt_step(step: f64, jd: usize, last_iterations: usize, bounds: (f64, f64)) -> f64 {
    let scaled = if last_iterations > 0 {
        step * jd as f64 / last_iterations as f64
    } else {
        step
    };
    let (lo, hi) = (bounds.0.min(bounds.1), bounds.0.max(bounds.1));
    scaled.clamp(lo, hi)
}

fn check_jd(jd: usize) -> IntegratorResult<()> {
    if jd == 0 {
        Err(IntegratorError::invalid("Jd must be at least 1"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapt_step_scales_and_clamps() {
        assert_eq!(adapt_step(0.1, 4, 2, (0.01, 1.0)), 0.2);
        assert_eq!(adapt_step(0.1, 1, 100, (0.01, 1.0)), 0.01);
        assert_eq!(adapt_step(-0.1, 2, 1, (-0.15, -0.01)), -0.15);
        assert_eq!(adapt_step(0.1, 1, 0, (0.1, 0.1)), 0.1);
    }
}
