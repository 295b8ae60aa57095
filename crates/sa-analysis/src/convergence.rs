//! Convergence tests over the system of equations.
//!
//! A test reads `x` (last increment) and `b` (current unbalance) from the
//! system after each update. `start()` opens a step; each `test()` records a
//! norm. A converged verdict does not advance the iteration counter, so
//! asking again without an update gives the same answer.

use sa_core::{NormOrder, norm};
use sa_soe::LinearSoe;
use serde::{Deserialize, Serialize};

/// Quantity checked against the tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    NormUnbalance,
    NormDispIncr,
    /// `0.5 |x · b|`
    EnergyIncr,
    RelativeNormUnbalance,
    RelativeNormDispIncr,
    RelativeEnergyIncr,
    /// `|x| / Σ |x_k|` over the step.
    RelativeTotalNormDispIncr,
    /// Accept after exactly `max_iter` iterations.
    FixedNumIter,
}

impl TestKind {
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::NormUnbalance => "NormUnbalance",
            TestKind::NormDispIncr => "NormDispIncr",
            TestKind::EnergyIncr => "EnergyIncr",
            TestKind::RelativeNormUnbalance => "RelativeNormUnbalance",
            TestKind::RelativeNormDispIncr => "RelativeNormDispIncr",
            TestKind::RelativeEnergyIncr => "RelativeEnergyIncr",
            TestKind::RelativeTotalNormDispIncr => "RelativeTotalNormDispIncr",
            TestKind::FixedNumIter => "FixedNumIter",
        }
    }

    fn is_relative(&self) -> bool {
        matches!(
            self,
            TestKind::RelativeNormUnbalance
                | TestKind::RelativeNormDispIncr
                | TestKind::RelativeEnergyIncr
        )
    }
}

/// Diagnostic output level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verbosity {
    #[default]
    Silent,
    /// Report the step result.
    Summary,
    /// Report every iteration.
    Iterations,
}

impl Verbosity {
    pub fn from_flag(flag: u32) -> Self {
        match flag {
            0 => Verbosity::Silent,
            1 => Verbosity::Iterations,
            _ => Verbosity::Summary,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TestVerdict {
    Converged { iterations: usize },
    Continue,
    Failed { iterations: usize, norm: f64 },
}

#[derive(Clone, Debug)]
pub struct ConvergenceTest {
    kind: TestKind,
    tol: f64,
    max_iter: usize,
    order: NormOrder,
    verbosity: Verbosity,
    max_incr: Option<usize>,
    current_iter: usize,
    reference: Option<f64>,
    total_incr: f64,
    increases: usize,
    history: Vec<f64>,
}

impl ConvergenceTest {
    pub fn new(kind: TestKind, tol: f64, max_iter: usize) -> Self {
        Self {
            kind,
            tol,
            max_iter: max_iter.max(1),
            order: NormOrder::Two,
            verbosity: Verbosity::Silent,
            max_incr: None,
            current_iter: 0,
            reference: None,
            total_incr: 0.0,
            increases: 0,
            history: Vec::new(),
        }
    }

    pub fn with_norm(mut self, order: NormOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Fail early once the norm has grown `max_incr` times in one step.
    pub fn with_max_incr(mut self, max_incr: usize) -> Self {
        self.max_incr = Some(max_incr);
        self
    }

    pub fn kind(&self) -> TestKind {
        self.kind
    }

    pub fn tolerance(&self) -> f64 {
        self.tol
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Iterations used so far in the current step.
    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    /// Norms recorded since the last `start()`.
    pub fn norms(&self) -> &[f64] {
        &self.history
    }

    pub fn last_norm(&self) -> Option<f64> {
        self.history.last().copied()
    }

    pub fn start(&mut self) {
        self.current_iter = 1;
        self.reference = None;
        self.total_incr = 0.0;
        self.increases = 0;
        self.history.clear();
    }

    fn measure(&mut self, soe: &dyn LinearSoe) -> f64 {
        let x = soe.x().as_slice();
        let b = soe.b().as_slice();
        let raw = match self.kind {
            TestKind::NormUnbalance | TestKind::RelativeNormUnbalance => norm(b, self.order),
            TestKind::NormDispIncr
            | TestKind::RelativeNormDispIncr
            | TestKind::FixedNumIter => norm(x, self.order),
            TestKind::EnergyIncr | TestKind::RelativeEnergyIncr => {
                0.5 * x.iter().zip(b).map(|(xi, bi)| xi * bi).sum::<f64>().abs()
            }
            TestKind::RelativeTotalNormDispIncr => {
                let n = norm(x, self.order);
                if self.history.len() < self.current_iter {
                    self.total_incr += n;
                }
                return if self.total_incr == 0.0 {
                    0.0
                } else {
                    n / self.total_incr
                };
            }
        };
        if !self.kind.is_relative() {
            return raw;
        }
        let reference = *self.reference.get_or_insert(raw);
        if reference == 0.0 { 0.0 } else { raw / reference }
    }

    fn record(&mut self, value: f64) {
        if self.history.len() < self.current_iter {
            if let Some(&prev) = self.history.last() {
                if value > prev {
                    self.increases += 1;
                }
            }
            self.history.push(value);
        } else if let Some(last) = self.history.last_mut() {
            *last = value;
        }
    }

    /// Check the current increment and unbalance held in `soe`.
    pub fn test(&mut self, soe: &dyn LinearSoe) -> TestVerdict {
        if self.current_iter == 0 {
            self.start();
        }
        let value = self.measure(soe);
        self.record(value);
        let iterations = self.current_iter;

        let converged = match self.kind {
            TestKind::FixedNumIter => iterations >= self.max_iter,
            _ => value <= self.tol,
        };
        if self.verbosity >= Verbosity::Iterations {
            tracing::info!(
                test = self.kind.name(),
                iter = iterations,
                norm = value,
                tol = self.tol,
                "convergence check"
            );
        }

        if converged {
            if self.verbosity >= Verbosity::Summary {
                tracing::info!(
                    test = self.kind.name(),
                    iterations,
                    norm = value,
                    "step converged"
                );
            }
            return TestVerdict::Converged { iterations };
        }

        let diverging = self.max_incr.is_some_and(|m| self.increases >= m);
        if iterations >= self.max_iter || diverging || !value.is_finite() {
            tracing::debug!(
                test = self.kind.name(),
                iterations,
                norm = value,
                diverging,
                "convergence test failed"
            );
            return TestVerdict::Failed {
                iterations,
                norm: value,
            };
        }
        self.current_iter += 1;
        TestVerdict::Continue
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use nalgebra::DVector;
    use proptest::prelude::*;
    use sa_soe::{DofGraph, FullGenSoe};

    fn kind_strategy() -> impl Strategy<Value = TestKind> {
        prop_oneof![
            Just(TestKind::NormUnbalance),
            Just(TestKind::NormDispIncr),
            Just(TestKind::EnergyIncr),
            Just(TestKind::RelativeNormUnbalance),
            Just(TestKind::RelativeNormDispIncr),
            Just(TestKind::RelativeEnergyIncr),
            Just(TestKind::RelativeTotalNormDispIncr),
        ]
    }

    proptest! {
        #[test]
        fn repeated_check_without_update_is_stable(
            kind in kind_strategy(),
            pairs in proptest::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 1..8),
            tol in 1e-6f64..1e3,
        ) {
            let (x, b): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let mut soe = FullGenSoe::default();
            soe.set_size(&DofGraph::new(x.len())).unwrap();
            soe.set_x(&DVector::from_vec(x)).unwrap();
            soe.set_b(&DVector::from_vec(b)).unwrap();

            let mut t = ConvergenceTest::new(kind, tol, 20);
            t.start();
            let first = t.test(&soe);
            if let TestVerdict::Converged { .. } = first {
                prop_assert_eq!(t.test(&soe), first);
                prop_assert_eq!(t.iterations(), 1);
            }
        }
    }
}
