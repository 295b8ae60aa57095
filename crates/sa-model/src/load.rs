//! Load patterns scaled by time series.
//!
//! In static analysis the model time is the load factor λ, so a
//! [`TimeSeries::Linear`] pattern applies `λ · P`.

use crate::error::{ModelError, ModelResult};
use sa_core::DofId;

#[derive(Clone, Debug, PartialEq)]
pub enum TimeSeries {
    Constant { factor: f64 },
    Linear { factor: f64 },
    /// Piecewise-linear path; zero outside `[times[0], times[last]]`.
    Path {
        times: Vec<f64>,
        values: Vec<f64>,
        factor: f64,
    },
    /// `factor · sin(2π (t - start) / period)` for `start <= t <= end`.
    Sine {
        period: f64,
        start: f64,
        end: f64,
        factor: f64,
    },
}

impl TimeSeries {
    pub fn validate(&self) -> ModelResult<()> {
        match self {
            TimeSeries::Path { times, values, .. } => {
                if times.len() != values.len() || times.is_empty() {
                    return Err(ModelError::InvalidParameter {
                        what: "path series needs equal, non-empty times and values".into(),
                    });
                }
                if times.windows(2).any(|w| w[1] <= w[0]) {
                    return Err(ModelError::InvalidParameter {
                        what: "path series times must increase".into(),
                    });
                }
                Ok(())
            }
            TimeSeries::Sine { period, .. } if *period <= 0.0 => {
                Err(ModelError::InvalidParameter {
                    what: format!("sine period must be positive, got {period}"),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn factor(&self, t: f64) -> f64 {
        match self {
            TimeSeries::Constant { factor } => *factor,
            TimeSeries::Linear { factor } => factor * t,
            TimeSeries::Path {
                times,
                values,
                factor,
            } => {
                let (first, last) = (times[0], times[times.len() - 1]);
                if t < first || t > last {
                    return 0.0;
                }
                let k = times.partition_point(|&ti| ti <= t).saturating_sub(1);
                if k + 1 >= times.len() {
                    return factor * values[k];
                }
                let w = (t - times[k]) / (times[k + 1] - times[k]);
                factor * (values[k] + w * (values[k + 1] - values[k]))
            }
            TimeSeries::Sine {
                period,
                start,
                end,
                factor,
            } => {
                if t < *start || t > *end {
                    0.0
                } else {
                    factor * (2.0 * std::f64::consts::PI * (t - start) / period).sin()
                }
            }
        }
    }
}

/// Nodal loads sharing one time series.
#[derive(Clone, Debug)]
pub struct LoadPattern {
    series: TimeSeries,
    loads: Vec<(DofId, f64)>,
    frozen: Option<f64>,
}

impl LoadPattern {
    pub fn new(series: TimeSeries) -> ModelResult<Self> {
        series.validate()?;
        Ok(Self {
            series,
            loads: Vec::new(),
            frozen: None,
        })
    }

    pub fn with_load(mut self, dof: DofId, value: f64) -> Self {
        self.loads.push((dof, value));
        self
    }

    pub fn add_load(&mut self, dof: DofId, value: f64) {
        self.loads.push((dof, value));
    }

    pub fn loads(&self) -> &[(DofId, f64)] {
        &self.loads
    }

    /// Scale applied at time `t`.
    pub fn factor(&self, t: f64) -> f64 {
        self.frozen.unwrap_or_else(|| self.series.factor(t))
    }

    /// Hold the factor reached at `t` for the rest of the analysis.
    pub fn freeze_at(&mut self, t: f64) {
        self.frozen = Some(self.series.factor(t));
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_series_interpolates() {
        let s = TimeSeries::Path {
            times: vec![0.0, 1.0, 3.0],
            values: vec![0.0, 2.0, 0.0],
            factor: 2.0,
        };
        s.validate().unwrap();
        assert!((s.factor(0.5) - 2.0).abs() < 1e-12);
        assert!((s.factor(2.0) - 2.0).abs() < 1e-12);
        assert_eq!(s.factor(3.0), 0.0);
        assert_eq!(s.factor(5.0), 0.0);
    }

    #[test]
    fn invalid_path_is_rejected() {
        let s = TimeSeries::Path {
            times: vec![0.0, 0.0],
            values: vec![1.0, 2.0],
            factor: 1.0,
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn frozen_pattern_ignores_time() {
        let mut p = LoadPattern::new(TimeSeries::Linear { factor: 1.0 })
            .unwrap()
            .with_load(DofId::from_index(0), 10.0);
        assert_eq!(p.factor(0.3), 0.3);
        p.freeze_at(0.5);
        assert!(p.is_frozen());
        assert_eq!(p.factor(0.0), 0.5);
        assert_eq!(p.loads().len(), 1);
    }
}
