//! Newton variants that differ only in when the tangent is re-formed.

use super::{AnalysisLinks, SolutionAlgorithm, StepReport};
use crate::error::AnalysisResult;
use crate::integrator::TangentKind;
use serde::{Deserialize, Serialize};

/// Tangent used by full Newton-Raphson.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewtonTangent {
    #[default]
    Current,
    Initial,
    /// Initial stiffness on the first iteration of a step, current after.
    InitialThenCurrent,
}

/// When to re-form the tangent within a step.
#[derive(Clone, Copy, Debug)]
enum Reform {
    Every(NewtonTangent),
    FirstOnly(TangentKind),
    Periodic { kind: TangentKind, every: usize },
}

impl Reform {
    fn tangent_for(self, iteration: usize) -> Option<TangentKind> {
        match self {
            Reform::Every(NewtonTangent::Current) => Some(TangentKind::Current),
            Reform::Every(NewtonTangent::Initial) => Some(TangentKind::Initial),
            Reform::Every(NewtonTangent::InitialThenCurrent) => Some(if iteration == 0 {
                TangentKind::Initial
            } else {
                TangentKind::Current
            }),
            Reform::FirstOnly(kind) => (iteration == 0).then_some(kind),
            Reform::Periodic { kind, every } => (iteration % every == 0).then_some(kind),
        }
    }
}

fn iterate(
    algorithm: &'static str,
    reform: Reform,
    links: &mut AnalysisLinks<'_>,
) -> AnalysisResult<StepReport> {
    links.form_unbalance()?;
    links.start_test()?;
    let mut iteration = 0;
    loop {
        if let Some(kind) = reform.tangent_for(iteration) {
            links.form_tangent(kind)?;
        }
        let delta = links.solve()?;
        links.update(&delta)?;
        links.form_unbalance()?;
        let verdict = links.check()?;
        if let Some(outcome) = links.conclude(algorithm, verdict) {
            return outcome;
        }
        iteration += 1;
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewtonRaphson {
    tangent: NewtonTangent,
}

impl NewtonRaphson {
    pub fn new(tangent: NewtonTangent) -> Self {
        Self { tangent }
    }

    pub fn tangent(&self) -> NewtonTangent {
        self.tangent
    }
}

impl SolutionAlgorithm for NewtonRaphson {
    fn name(&self) -> &'static str {
        "NewtonRaphson"
    }

    fn solve_current_step(&mut self, links: &mut AnalysisLinks<'_>) -> AnalysisResult<StepReport> {
        iterate(self.name(), Reform::Every(self.tangent), links)
    }
}

/// Tangent formed once, at the start of each step.
#[derive(Clone, Debug, Default)]
pub struct ModifiedNewton {
    tangent: TangentKind,
}

impl ModifiedNewton {
    pub fn new(tangent: TangentKind) -> Self {
        Self { tangent }
    }
}

impl SolutionAlgorithm for ModifiedNewton {
    fn name(&self) -> &'static str {
        "ModifiedNewton"
    }

    fn solve_current_step(&mut self, links: &mut AnalysisLinks<'_>) -> AnalysisResult<StepReport> {
        iterate(self.name(), Reform::FirstOnly(self.tangent), links)
    }
}

/// Tangent re-formed every `max_count` iterations.
#[derive(Clone, Debug)]
pub struct PeriodicNewton {
    tangent: TangentKind,
    max_count: usize,
}

impl PeriodicNewton {
    /// A period of zero behaves like one (full Newton).
    pub fn new(tangent: TangentKind, max_count: usize) -> Self {
        Self {
            tangent,
            max_count: max_count.max(1),
        }
    }
}

impl SolutionAlgorithm for PeriodicNewton {
    fn name(&self) -> &'static str {
        "PeriodicNewton"
    }

    fn solve_current_step(&mut self, links: &mut AnalysisLinks<'_>) -> AnalysisResult<StepReport> {
        let reform = Reform::Periodic {
            kind: self.tangent,
            every: self.max_count,
        };
        iterate(self.name(), reform, links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_then_current_switches_after_first_iteration() {
        let r = Reform::Every(NewtonTangent::InitialThenCurrent);
        assert_eq!(r.tangent_for(0), Some(TangentKind::Initial));
        assert_eq!(r.tangent_for(1), Some(TangentKind::Current));
    }

    #[test]
    fn periodic_reforms_on_multiples() {
        let r = Reform::Periodic {
            kind: TangentKind::Current,
            every: 3,
        };
        let formed: Vec<usize> = (0..7).filter(|&i| r.tangent_for(i).is_some()).collect();
        assert_eq!(formed, vec![0, 3, 6]);
        assert_eq!(Reform::FirstOnly(TangentKind::Initial).tangent_for(2), None);
    }

    #[test]
    fn zero_period_means_every_iteration() {
        let p = PeriodicNewton::new(TangentKind::Current, 0);
        assert_eq!(p.max_count, 1);
    }
}
