//! Newton with a one-dimensional search along the solved direction.
//!
//! The merit function is `s(η) = ΔU · R(U + η ΔU)`; the search looks for
//! `|s(η) / s(0)| <= tolerance`.

use super::{AnalysisLinks, SolutionAlgorithm, StepReport};
use crate::error::{AnalysisError, AnalysisResult};
use crate::integrator::TangentKind;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineSearch {
    /// Interpolate between `(0, s0)` and the latest point.
    #[default]
    InitialInterpolated,
    Bisection,
    /// Interpolate between the two latest points.
    Secant,
    /// Bisection with linear interpolation inside the bracket.
    RegulaFalsi,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearchParams {
    pub tolerance: f64,
    pub max_iter: usize,
    pub min_eta: f64,
    pub max_eta: f64,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        Self {
            tolerance: 0.8,
            max_iter: 10,
            min_eta: 0.1,
            max_eta: 10.0,
        }
    }
}

/// Moves the trial state along a fixed direction, tracking the applied
/// scale so each point only pushes the difference.
struct SearchPoint<'d> {
    direction: &'d DVector<f64>,
    applied: f64,
}

impl SearchPoint<'_> {
    fn move_to(&mut self, links: &mut AnalysisLinks<'_>, eta: f64) -> AnalysisResult<f64> {
        let step = self.direction * (eta - self.applied);
        links.update(&step)?;
        links.form_unbalance()?;
        self.applied = eta;
        Ok(self.direction.dot(links.soe.b()))
    }
}

impl LineSearch {
    /// Run the search from `η = 1` and return the accepted scale.
    fn search(
        self,
        links: &mut AnalysisLinks<'_>,
        direction: &DVector<f64>,
        s0: f64,
        s1: f64,
        params: &LineSearchParams,
    ) -> AnalysisResult<f64> {
        if s0 == 0.0 || (s1 / s0).abs() <= params.tolerance {
            return Ok(1.0);
        }
        let mut point = SearchPoint {
            direction,
            applied: 1.0,
        };
        let clamp = |eta: f64| eta.clamp(params.min_eta, params.max_eta);
        let converged = |s: f64| (s / s0).abs() <= params.tolerance;

        match self {
            LineSearch::InitialInterpolated => {
                let (mut eta, mut s) = (1.0, s1);
                let r0 = (s1 / s0).abs();
                for _ in 0..params.max_iter {
                    if converged(s) || s == s0 {
                        break;
                    }
                    let mut next = clamp(eta * s0 / (s0 - s));
                    if (s / s0).abs() > r0 {
                        next = 1.0;
                    }
                    s = point.move_to(links, next)?;
                    eta = next;
                }
                Ok(eta)
            }
            LineSearch::Secant => {
                let (mut eta_prev, mut s_prev) = (0.0, s0);
                let (mut eta, mut s) = (1.0, s1);
                for _ in 0..params.max_iter {
                    if converged(s) || s == s_prev {
                        break;
                    }
                    let next = clamp(eta - s * (eta - eta_prev) / (s - s_prev));
                    eta_prev = eta;
                    s_prev = s;
                    s = point.move_to(links, next)?;
                    eta = next;
                }
                Ok(eta)
            }
            LineSearch::Bisection | LineSearch::RegulaFalsi => {
                let (mut eta_l, mut s_l) = (0.0, s0);
                let (mut eta_u, mut s_u) = (1.0, s1);
                // widen until the merit changes sign
                while s_u * s0 > 0.0 && eta_u < params.max_eta {
                    eta_l = eta_u;
                    s_l = s_u;
                    eta_u = (2.0 * eta_u).min(params.max_eta);
                    s_u = point.move_to(links, eta_u)?;
                }
                if s_u * s0 > 0.0 || converged(s_u) {
                    return Ok(point.applied);
                }
                let mut eta = point.applied;
                for _ in 0..params.max_iter {
                    let next = if self == LineSearch::Bisection || s_u == s_l {
                        0.5 * (eta_l + eta_u)
                    } else {
                        eta_u - s_u * (eta_u - eta_l) / (s_u - s_l)
                    };
                    eta = next.max(params.min_eta);
                    let s = point.move_to(links, eta)?;
                    if converged(s) {
                        break;
                    }
                    if s * s_u < 0.0 {
                        eta_l = eta;
                        s_l = s;
                    } else {
                        eta_u = eta;
                        s_u = s;
                    }
                }
                Ok(eta)
            }
        }
    }
}

/// Full Newton with a line search on every iteration.
#[derive(Clone, Debug, Default)]
pub struct NewtonLineSearch {
    search: LineSearch,
    params: LineSearchParams,
}

impl NewtonLineSearch {
    pub fn new(search: LineSearch) -> Self {
        Self {
            search,
            params: LineSearchParams::default(),
        }
    }

    pub fn with_params(mut self, params: LineSearchParams) -> Self {
        self.params = params;
        self
    }

    pub fn search(&self) -> LineSearch {
        self.search
    }
}

impl SolutionAlgorithm for NewtonLineSearch {
    fn name(&self) -> &'static str {
        "NewtonLineSearch"
    }

    fn solve_current_step(&mut self, links: &mut AnalysisLinks<'_>) -> AnalysisResult<StepReport> {
        links.form_unbalance()?;
        links.start_test()?;
        loop {
            links.form_tangent(TangentKind::Current)?;
            let direction = links.solve()?;
            let s0 = direction.dot(links.soe.b());
            links.update(&direction)?;
            links.form_unbalance()?;
            let s1 = direction.dot(links.soe.b());

            let eta = self
                .search
                .search(links, &direction, s0, s1, &self.params)?;
            if eta != 1.0 {
                tracing::debug!(eta, search = ?self.search, "line search scaled step");
                links
                    .soe
                    .set_x(&(&direction * eta))
                    .map_err(AnalysisError::Solve)?;
            }

            let verdict = links.check()?;
            if let Some(outcome) = links.conclude(self.name(), verdict) {
                return outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let p = LineSearchParams::default();
        assert_eq!(p.tolerance, 0.8);
        assert_eq!(p.max_iter, 10);
        assert_eq!((p.min_eta, p.max_eta), (0.1, 10.0));
    }
}
