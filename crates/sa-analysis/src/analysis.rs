//! Analysis drivers: the step loop around an algorithm and an integrator.

use crate::algorithm::{AnalysisLinks, SolutionAlgorithm, StepReport};
use crate::convergence::ConvergenceTest;
use crate::error::{AnalysisError, AnalysisResult, IntegratorError};
use crate::integrator::{Integrator, StaticIntegrator, TransientIntegrator};
use sa_core::DofId;
use sa_core::timing;
use sa_model::{AnalysisModel, ResponseKind};
use sa_soe::LinearSoe;
use serde::{Deserialize, Serialize};

/// Committed history, one entry per converged step.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AnalysisRecord {
    /// Pseudo-time (load factor) or time
    pub time: Vec<f64>,
    /// Displacement of every DOF, constrained ones included
    pub disp: Vec<Vec<f64>>,
    pub iterations: Vec<usize>,
}

impl AnalysisRecord {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    fn push(&mut self, model: &AnalysisModel, report: &StepReport) -> AnalysisResult<()> {
        let disp = (0..model.num_dofs())
            .map(|d| model.dof_response(DofId::from_index(d), ResponseKind::Disp))
            .collect::<Result<Vec<_>, _>>()?;
        self.time.push(model.committed_time());
        self.disp.push(disp);
        self.iterations.push(report.iterations);
        Ok(())
    }
}

/// Parts every driver owns.
struct Parts {
    model: AnalysisModel,
    algorithm: Box<dyn SolutionAlgorithm>,
    soe: Box<dyn LinearSoe>,
    test: Option<ConvergenceTest>,
    record: AnalysisRecord,
    ready: bool,
}

impl Parts {
    /// Number equations and size everything that depends on them.
    fn setup(&mut self, integrator: &mut dyn Integrator) -> AnalysisResult<()> {
        if self.ready && self.model.is_numbered() {
            return Ok(());
        }
        let num_eqn = self.model.number_equations();
        let graph = self.model.dof_graph()?;
        self.soe.set_size(&graph).map_err(AnalysisError::Setup)?;
        integrator
            .domain_changed(&self.model)
            .map_err(AnalysisError::NewStep)?;
        self.algorithm.domain_changed();
        self.ready = true;
        tracing::debug!(
            num_eqn,
            algorithm = self.algorithm.name(),
            integrator = integrator.name(),
            solver = self.soe.solver_name(),
            "analysis set up"
        );
        Ok(())
    }

    /// Solve the step already started by the integrator, then commit, or
    /// revert on failure.
    fn solve_and_commit(&mut self, integrator: &mut dyn Integrator) -> AnalysisResult<StepReport> {
        let solved = {
            let mut links = AnalysisLinks {
                model: &mut self.model,
                integrator: &mut *integrator,
                soe: self.soe.as_mut(),
                test: self.test.as_mut(),
            };
            self.algorithm.solve_current_step(&mut links)
        };
        match solved {
            Ok(report) => {
                if let Err(err) = integrator.commit(&mut self.model, report.iterations) {
                    self.revert(integrator);
                    return Err(AnalysisError::Commit(err));
                }
                self.record.push(&self.model, &report)?;
                Ok(report)
            }
            Err(err) => {
                self.revert(integrator);
                Err(err)
            }
        }
    }

    fn revert(&mut self, integrator: &mut dyn Integrator) {
        if let Err(revert) = integrator.revert_to_last_step(&mut self.model) {
            tracing::warn!(%revert, "revert after failed step failed");
        }
    }
}

fn finish(steps: usize) {
    tracing::info!(steps, "analysis complete");
    timing::log_summary();
}

/// Load-factor stepping.
pub struct StaticAnalysis {
    parts: Parts,
    integrator: Box<dyn StaticIntegrator>,
}

impl StaticAnalysis {
    /// Run `num_steps` steps; stops at the first failed step, which is
    /// reverted.
    pub fn analyze(&mut self, num_steps: usize) -> AnalysisResult<()> {
        self.parts.setup(self.integrator.as_integrator())?;
        for step in 0..num_steps {
            let report = self.step().inspect_err(|err| {
                tracing::warn!(step, code = err.code(), %err, "static step failed");
            })?;
            tracing::info!(
                step,
                lambda = self.parts.model.committed_time(),
                iterations = report.iterations,
                "static step converged"
            );
        }
        finish(num_steps);
        Ok(())
    }

    /// One step: new_step, solve, commit.
    pub fn step(&mut self) -> AnalysisResult<StepReport> {
        self.parts.setup(self.integrator.as_integrator())?;
        if let Err(err) = self
            .integrator
            .new_step(&mut self.parts.model, self.parts.soe.as_mut())
        {
            self.parts.revert(self.integrator.as_integrator());
            return Err(AnalysisError::NewStep(err));
        }
        self.parts.solve_and_commit(self.integrator.as_integrator())
    }

    pub fn model(&self) -> &AnalysisModel {
        &self.parts.model
    }

    pub fn model_mut(&mut self) -> &mut AnalysisModel {
        &mut self.parts.model
    }

    pub fn record(&self) -> &AnalysisRecord {
        &self.parts.record
    }

    pub fn into_model(self) -> AnalysisModel {
        self.parts.model
    }
}

/// Fixed time stepping.
pub struct TransientAnalysis {
    parts: Parts,
    integrator: Box<dyn TransientIntegrator>,
}

impl TransientAnalysis {
    pub fn analyze(&mut self, num_steps: usize, dt: f64) -> AnalysisResult<()> {
        self.parts.setup(self.integrator.as_integrator())?;
        for step in 0..num_steps {
            let report = self.step(dt).inspect_err(|err| {
                tracing::warn!(step, dt, code = err.code(), %err, "transient step failed");
            })?;
            tracing::info!(
                step,
                time = self.parts.model.committed_time(),
                iterations = report.iterations,
                "transient step converged"
            );
        }
        finish(num_steps);
        Ok(())
    }

    pub fn step(&mut self, dt: f64) -> AnalysisResult<StepReport> {
        self.parts.setup(self.integrator.as_integrator())?;
        if let Err(err) = self.integrator.new_step(&mut self.parts.model, dt) {
            self.parts.revert(self.integrator.as_integrator());
            return Err(AnalysisError::NewStep(err));
        }
        self.parts.solve_and_commit(self.integrator.as_integrator())
    }

    pub fn model(&self) -> &AnalysisModel {
        &self.parts.model
    }

    pub fn model_mut(&mut self) -> &mut AnalysisModel {
        &mut self.parts.model
    }

    pub fn record(&self) -> &AnalysisRecord {
        &self.parts.record
    }

    pub fn into_model(self) -> AnalysisModel {
        self.parts.model
    }
}

/// Time-step bounds for [`VariableTransientAnalysis`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableDt {
    pub dt_min: f64,
    pub dt_max: f64,
    /// Desired iterations per step
    pub jd: usize,
}

impl VariableDt {
    /// Next step size from the iterations the last step needed.
    pub fn next_dt(&self, dt: f64, iterations: usize) -> f64 {
        let ratio = self.jd as f64 / iterations.max(1) as f64;
        (dt * ratio.sqrt()).clamp(self.dt_min, self.dt_max)
    }
}

/// Transient analysis that adapts Δt to the iteration count and halves it
/// after a failed step.
pub struct VariableTransientAnalysis {
    inner: TransientAnalysis,
    options: VariableDt,
}

impl VariableTransientAnalysis {
    /// Run `num_steps` converged steps starting from `dt`.
    pub fn analyze(&mut self, num_steps: usize, dt: f64) -> AnalysisResult<()> {
        let mut dt = dt.clamp(self.options.dt_min, self.options.dt_max);
        for step in 0..num_steps {
            let report = loop {
                match self.inner.step(dt) {
                    Ok(report) => break report,
                    Err(err) if retryable(&err) && dt / 2.0 >= self.options.dt_min => {
                        dt /= 2.0;
                        tracing::warn!(step, dt, code = err.code(), "step failed, halving dt");
                    }
                    Err(err) => return Err(err),
                }
            };
            tracing::info!(
                step,
                dt,
                time = self.inner.model().committed_time(),
                iterations = report.iterations,
                "variable step converged"
            );
            dt = self.options.next_dt(dt, report.iterations);
        }
        finish(num_steps);
        Ok(())
    }

    pub fn options(&self) -> VariableDt {
        self.options
    }

    pub fn model(&self) -> &AnalysisModel {
        self.inner.model()
    }

    pub fn record(&self) -> &AnalysisRecord {
        self.inner.record()
    }

    pub fn into_model(self) -> AnalysisModel {
        self.inner.into_model()
    }
}

/// Failures a smaller step may cure.
fn retryable(err: &AnalysisError) -> bool {
    matches!(
        err,
        AnalysisError::Tangent(_)
            | AnalysisError::Unbalance(_)
            | AnalysisError::Solve(_)
            | AnalysisError::Update(_)
            | AnalysisError::NotConverged { .. }
    )
}

/// Collects the parts of an analysis; any missing part is an
/// [`AnalysisError::Unbound`] at build time.
pub struct AnalysisBuilder {
    model: AnalysisModel,
    algorithm: Option<Box<dyn SolutionAlgorithm>>,
    soe: Option<Box<dyn LinearSoe>>,
    test: Option<ConvergenceTest>,
}

impl AnalysisBuilder {
    pub fn new(model: AnalysisModel) -> Self {
        Self {
            model,
            algorithm: None,
            soe: None,
            test: None,
        }
    }

    pub fn algorithm(mut self, algorithm: impl SolutionAlgorithm + 'static) -> Self {
        self.algorithm = Some(Box::new(algorithm));
        self
    }

    pub fn boxed_algorithm(mut self, algorithm: Box<dyn SolutionAlgorithm>) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn soe(mut self, soe: impl LinearSoe + 'static) -> Self {
        self.soe = Some(Box::new(soe));
        self
    }

    pub fn boxed_soe(mut self, soe: Box<dyn LinearSoe>) -> Self {
        self.soe = Some(soe);
        self
    }

    pub fn test(mut self, test: ConvergenceTest) -> Self {
        self.test = Some(test);
        self
    }

    fn parts(self) -> AnalysisResult<Parts> {
        let algorithm = self.algorithm.ok_or(AnalysisError::Unbound {
            what: "solution algorithm",
        })?;
        let soe = self.soe.ok_or(AnalysisError::Unbound {
            what: "system of equations",
        })?;
        if algorithm.needs_test() && self.test.is_none() {
            return Err(AnalysisError::Unbound {
                what: "convergence test",
            });
        }
        Ok(Parts {
            model: self.model,
            algorithm,
            soe,
            test: self.test,
            record: AnalysisRecord::default(),
            ready: false,
        })
    }

    pub fn build_static(
        self,
        integrator: impl StaticIntegrator + 'static,
    ) -> AnalysisResult<StaticAnalysis> {
        self.build_static_boxed(Box::new(integrator))
    }

    pub fn build_static_boxed(
        self,
        integrator: Box<dyn StaticIntegrator>,
    ) -> AnalysisResult<StaticAnalysis> {
        Ok(StaticAnalysis {
            parts: self.parts()?,
            integrator,
        })
    }

    pub fn build_transient(
        self,
        integrator: impl TransientIntegrator + 'static,
    ) -> AnalysisResult<TransientAnalysis> {
        self.build_transient_boxed(Box::new(integrator))
    }

    pub fn build_transient_boxed(
        self,
        integrator: Box<dyn TransientIntegrator>,
    ) -> AnalysisResult<TransientAnalysis> {
        Ok(TransientAnalysis {
            parts: self.parts()?,
            integrator,
        })
    }

    pub fn build_variable_transient(
        self,
        integrator: Box<dyn TransientIntegrator>,
        options: VariableDt,
    ) -> AnalysisResult<VariableTransientAnalysis> {
        if !(options.dt_min > 0.0 && options.dt_min <= options.dt_max) {
            return Err(AnalysisError::NewStep(IntegratorError::invalid(format!(
                "time step bounds [{}, {}]",
                options.dt_min, options.dt_max
            ))));
        }
        Ok(VariableTransientAnalysis {
            inner: self.build_transient_boxed(integrator)?,
            options,
        })
    }
}
