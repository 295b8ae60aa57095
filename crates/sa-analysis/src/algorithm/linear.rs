use super::{AnalysisLinks, SolutionAlgorithm, StepReport};
use crate::error::AnalysisResult;
use crate::integrator::TangentKind;

/// One tangent, unbalance, solve and update cycle per step.
#[derive(Clone, Debug, Default)]
pub struct Linear {
    factor_once: bool,
    factored: bool,
}

impl Linear {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the first factorization for every later step.
    pub fn factor_once() -> Self {
        Self {
            factor_once: true,
            factored: false,
        }
    }
}

impl SolutionAlgorithm for Linear {
    fn name(&self) -> &'static str {
        "Linear"
    }

    fn solve_current_step(&mut self, links: &mut AnalysisLinks<'_>) -> AnalysisResult<StepReport> {
        let reuse = self.factor_once && self.factored;
        if !reuse {
            links.form_tangent(TangentKind::Current)?;
        }
        links.form_unbalance()?;
        let delta = links.solve()?;
        self.factored = true;
        links.update(&delta)?;
        Ok(StepReport {
            iterations: 1,
            norms: Vec::new(),
        })
    }

    fn needs_test(&self) -> bool {
        false
    }

    fn domain_changed(&mut self) {
        self.factored = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::{Integrator, LoadControl, StaticIntegrator};
    use sa_model::elements::Spring;
    use sa_model::{AnalysisModel, LoadPattern, ModelBuilder, TimeSeries};
    use sa_soe::{LinearSoe, ProfileSoe};

    fn spring(k: f64) -> AnalysisModel {
        let mut b = ModelBuilder::new();
        let d = b.add_dof();
        b.add_element(Spring::linear(d, None, k).unwrap());
        b.add_pattern(
            LoadPattern::new(TimeSeries::Linear { factor: 1.0 })
                .unwrap()
                .with_load(d, 1.0),
        );
        b.build().unwrap()
    }

    #[test]
    fn failed_factorization_is_not_reused() {
        let mut model = spring(0.0);
        let mut soe = ProfileSoe::default();
        soe.set_size(&model.dof_graph().unwrap()).unwrap();
        let mut integrator = LoadControl::new(1.0).unwrap();
        integrator.domain_changed(&model).unwrap();
        integrator.new_step(&mut model, &mut soe).unwrap();

        let mut linear = Linear::factor_once();
        let mut links = AnalysisLinks {
            model: &mut model,
            integrator: &mut integrator,
            soe: &mut soe,
            test: None,
        };
        let err = linear.solve_current_step(&mut links).unwrap_err();
        assert_eq!(err.code(), -3);
        assert!(!linear.factored);
    }
}
