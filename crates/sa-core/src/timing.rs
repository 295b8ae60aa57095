//! Opt-in wall-clock accounting for the phases of a nonlinear iteration.
//!
//! Off unless [`enable_timing`] was called or `SA_TIMING` is set. Each phase
//! accumulates total time and call count; [`log_summary`] reports them
//! through `tracing`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("SA_TIMING").is_ok()
}

/// Where time is spent inside one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Element state determination (`update_domain`).
    ElementState,
    AssembleTangent,
    AssembleUnbalance,
    /// Factorization plus substitution.
    FactorSolve,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::ElementState,
        Phase::AssembleTangent,
        Phase::AssembleUnbalance,
        Phase::FactorSolve,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Phase::ElementState => "element state",
            Phase::AssembleTangent => "tangent assembly",
            Phase::AssembleUnbalance => "unbalance assembly",
            Phase::FactorSolve => "factor/solve",
        }
    }

    fn counter(self) -> &'static PhaseCounter {
        &COUNTERS[self as usize]
    }

    pub fn totals(self) -> PhaseTotals {
        self.counter().totals()
    }
}

struct PhaseCounter {
    nanos: AtomicU64,
    calls: AtomicU64,
}

impl PhaseCounter {
    const fn new() -> Self {
        Self {
            nanos: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    fn add(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    fn totals(&self) -> PhaseTotals {
        PhaseTotals {
            calls: self.calls.load(Ordering::Relaxed),
            seconds: self.nanos.load(Ordering::Relaxed) as f64 * 1e-9,
        }
    }

    fn clear(&self) {
        self.nanos.store(0, Ordering::Relaxed);
        self.calls.store(0, Ordering::Relaxed);
    }
}

static COUNTERS: [PhaseCounter; 4] = [
    PhaseCounter::new(),
    PhaseCounter::new(),
    PhaseCounter::new(),
    PhaseCounter::new(),
];

/// Accumulated time of one phase.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseTotals {
    pub calls: u64,
    pub seconds: f64,
}

impl PhaseTotals {
    pub fn average_seconds(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.seconds / self.calls as f64
        }
    }
}

/// Running measurement; `None` inside when timing is off.
pub struct Timer(Option<Instant>);

impl Timer {
    pub fn start() -> Self {
        Self(is_enabled().then(Instant::now))
    }

    /// Elapsed seconds, if timing was on at `start()`.
    pub fn stop(self) -> Option<f64> {
        self.0.map(|t| t.elapsed().as_secs_f64())
    }

    pub fn stop_into(self, phase: Phase) {
        if let Some(t) = self.0 {
            let nanos = u64::try_from(t.elapsed().as_nanos()).unwrap_or(u64::MAX);
            phase.counter().add(nanos);
        }
    }
}

pub fn reset_all() {
    for phase in Phase::ALL {
        phase.counter().clear();
    }
}

/// Log one line per phase that ran, if timing is enabled.
pub fn log_summary() {
    if !is_enabled() {
        return;
    }
    for phase in Phase::ALL {
        let totals = phase.totals();
        if totals.calls > 0 {
            tracing::info!(
                phase = phase.label(),
                calls = totals.calls,
                total_s = totals.seconds,
                avg_ms = totals.average_seconds() * 1000.0,
                "timing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_average_over_calls() {
        let t = PhaseTotals {
            calls: 4,
            seconds: 2.0,
        };
        assert!((t.average_seconds() - 0.5).abs() < 1e-15);
        assert_eq!(PhaseTotals::default().average_seconds(), 0.0);
    }

    #[test]
    fn phases_index_their_own_counter() {
        for (i, phase) in Phase::ALL.into_iter().enumerate() {
            assert_eq!(phase as usize, i);
        }
    }

    #[test]
    fn disabled_timer_stops_to_none() {
        disable_timing();
        if std::env::var("SA_TIMING").is_err() {
            assert!(Timer::start().stop().is_none());
        }
    }
}
