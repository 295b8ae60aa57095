//! Serializable analysis definitions and the factories that turn them into
//! live objects.
//!
//! ```yaml
//! system: { type: BandSpd }
//! algorithm: { type: NewtonRaphson }
//! test: { kind: EnergyIncr, tol: 1.0e-10, max_iter: 10 }
//! integrator: { type: LoadControl, d_lambda: 0.1 }
//! steps: 10
//! ```

use crate::algorithm::{
    Broyden, Linear, LineSearch, LineSearchParams, ModifiedNewton, NewtonLineSearch,
    NewtonRaphson, NewtonTangent, PeriodicNewton, SolutionAlgorithm,
};
use crate::analysis::{
    AnalysisBuilder, AnalysisRecord, StaticAnalysis, TransientAnalysis, VariableDt,
    VariableTransientAnalysis,
};
use crate::convergence::{ConvergenceTest, TestKind, Verbosity};
use crate::error::{AnalysisError, AnalysisResult, IntegratorError, IntegratorResult};
use crate::integrator::{
    AlphaOs, ArcLength, ArcLength1, CentralDifference, DeterminantSign, DisplacementControl, Hht,
    LoadControl, MinUnbalDispNorm, Newmark, NewmarkExplicit, NewmarkParams, StaticIntegrator,
    TangentKind, TransientIntegrator,
};
use sa_core::{DofId, NormOrder};
use sa_model::{AnalysisModel, Numberer};
use sa_soe::{
    BandGenSoe, BandSpdSoe, DiagonalSoe, FullGenSoe, LinearSoe, PcgSolver, ProfileSoe, Soe,
    SparseGenSoe, SparseGenStorage,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDef {
    #[serde(default)]
    pub system: SystemDef,
    #[serde(default)]
    pub numberer: NumbererDef,
    pub algorithm: AlgorithmDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestDef>,
    pub integrator: IntegratorDef,
    pub steps: usize,
    /// Time step; required for transient integrators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    /// Adaptive time-step bounds; transient only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_dt: Option<VariableDt>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemDef {
    FullGeneral,
    BandSpd,
    BandGeneral,
    #[default]
    Profile,
    SparseGeneral,
    SparsePcg {
        #[serde(default = "default_pcg_tol")]
        tol: f64,
        /// 0 means twice the number of equations.
        #[serde(default)]
        max_iter: usize,
    },
    Diagonal,
}

fn default_pcg_tol() -> f64 {
    1e-12
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumbererDef {
    #[default]
    Plain,
    ReverseCuthillMcKee,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlgorithmDef {
    Linear {
        #[serde(default)]
        factor_once: bool,
    },
    NewtonRaphson {
        #[serde(default)]
        tangent: NewtonTangent,
    },
    ModifiedNewton {
        #[serde(default)]
        tangent: TangentKind,
    },
    PeriodicNewton {
        #[serde(default)]
        tangent: TangentKind,
        max_count: usize,
    },
    NewtonLineSearch {
        #[serde(default)]
        search: LineSearch,
        #[serde(default)]
        params: LineSearchParams,
    },
    Broyden {
        #[serde(default = "default_broyden_count")]
        count: usize,
    },
}

fn default_broyden_count() -> usize {
    10
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestDef {
    pub kind: TestKind,
    pub tol: f64,
    pub max_iter: usize,
    #[serde(default)]
    pub norm: NormOrder,
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_incr: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntegratorDef {
    LoadControl {
        d_lambda: f64,
        #[serde(default = "default_jd")]
        jd: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    DisplacementControl {
        dof: usize,
        incr: f64,
        #[serde(default = "default_jd")]
        jd: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    ArcLength {
        s: f64,
        alpha: f64,
    },
    ArcLength1 {
        s: f64,
        alpha: f64,
    },
    MinUnbalDispNorm {
        d_lambda1: f64,
        #[serde(default = "default_jd")]
        jd: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default)]
        sign: DeterminantSign,
    },
    Newmark {
        gamma: f64,
        beta: f64,
    },
    NewmarkExplicit {
        gamma: f64,
    },
    Hht {
        alpha: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gamma: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        beta: Option<f64>,
    },
    AlphaOs {
        alpha: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gamma: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        beta: Option<f64>,
    },
    CentralDifference,
}

fn default_jd() -> usize {
    1
}

/// Explicit γ and β, or the α-dependent defaults.
fn alpha_params(alpha: f64, gamma: Option<f64>, beta: Option<f64>) -> NewmarkParams {
    let defaults = NewmarkParams::for_alpha(alpha);
    NewmarkParams::new(gamma.unwrap_or(defaults.gamma), beta.unwrap_or(defaults.beta))
}

impl SystemDef {
    pub fn build(&self) -> Box<dyn LinearSoe> {
        match *self {
            SystemDef::FullGeneral => Box::new(FullGenSoe::default()),
            SystemDef::BandSpd => Box::new(BandSpdSoe::default()),
            SystemDef::BandGeneral => Box::new(BandGenSoe::default()),
            SystemDef::Profile => Box::new(ProfileSoe::default()),
            SystemDef::SparseGeneral => Box::new(SparseGenSoe::default()),
            SystemDef::SparsePcg { tol, max_iter } => Box::new(Soe::new(
                SparseGenStorage::new(),
                PcgSolver::new(tol, max_iter),
            )),
            SystemDef::Diagonal => Box::new(DiagonalSoe::default()),
        }
    }
}

impl From<NumbererDef> for Numberer {
    fn from(def: NumbererDef) -> Self {
        match def {
            NumbererDef::Plain => Numberer::Plain,
            NumbererDef::ReverseCuthillMcKee => Numberer::ReverseCuthillMcKee,
        }
    }
}

impl AlgorithmDef {
    pub fn build(&self) -> Box<dyn SolutionAlgorithm> {
        match *self {
            AlgorithmDef::Linear { factor_once } => Box::new(if factor_once {
                Linear::factor_once()
            } else {
                Linear::new()
            }),
            AlgorithmDef::NewtonRaphson { tangent } => Box::new(NewtonRaphson::new(tangent)),
            AlgorithmDef::ModifiedNewton { tangent } => Box::new(ModifiedNewton::new(tangent)),
            AlgorithmDef::PeriodicNewton { tangent, max_count } => {
                Box::new(PeriodicNewton::new(tangent, max_count))
            }
            AlgorithmDef::NewtonLineSearch { search, params } => {
                Box::new(NewtonLineSearch::new(search).with_params(params))
            }
            AlgorithmDef::Broyden { count } => Box::new(Broyden::new(count)),
        }
    }
}

impl TestDef {
    pub fn build(&self) -> ConvergenceTest {
        let test = ConvergenceTest::new(self.kind, self.tol, self.max_iter)
            .with_norm(self.norm)
            .with_verbosity(self.verbosity);
        match self.max_incr {
            Some(max_incr) => test.with_max_incr(max_incr),
            None => test,
        }
    }
}

impl IntegratorDef {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IntegratorDef::Newmark { .. }
                | IntegratorDef::NewmarkExplicit { .. }
                | IntegratorDef::Hht { .. }
                | IntegratorDef::AlphaOs { .. }
                | IntegratorDef::CentralDifference
        )
    }

    pub fn build_static(&self) -> IntegratorResult<Box<dyn StaticIntegrator>> {
        let integrator: Box<dyn StaticIntegrator> = match *self {
            IntegratorDef::LoadControl { d_lambda, jd, min, max } => Box::new(LoadControl::adaptive(
                d_lambda,
                jd,
                min.unwrap_or(d_lambda),
                max.unwrap_or(d_lambda),
            )?),
            IntegratorDef::DisplacementControl { dof, incr, jd, min, max } => {
                Box::new(DisplacementControl::adaptive(
                    DofId::from_index(dof),
                    incr,
                    jd,
                    min.unwrap_or(incr),
                    max.unwrap_or(incr),
                )?)
            }
            IntegratorDef::ArcLength { s, alpha } => Box::new(ArcLength::new(s, alpha)?),
            IntegratorDef::ArcLength1 { s, alpha } => Box::new(ArcLength1::new(s, alpha)?),
            IntegratorDef::MinUnbalDispNorm { d_lambda1, jd, min, max, sign } => {
                Box::new(MinUnbalDispNorm::adaptive(
                    d_lambda1,
                    jd,
                    min.unwrap_or(d_lambda1),
                    max.unwrap_or(d_lambda1),
                    sign,
                )?)
            }
            _ => {
                return Err(IntegratorError::invalid(format!(
                    "{self:?} is not a static integrator"
                )));
            }
        };
        Ok(integrator)
    }

    pub fn build_transient(&self) -> IntegratorResult<Box<dyn TransientIntegrator>> {
        let integrator: Box<dyn TransientIntegrator> = match *self {
            IntegratorDef::Newmark { gamma, beta } => Box::new(Newmark::new(gamma, beta)),
            IntegratorDef::NewmarkExplicit { gamma } => Box::new(NewmarkExplicit::new(gamma)?),
            IntegratorDef::Hht { alpha, gamma, beta } => {
                Box::new(Hht::with_params(alpha, alpha_params(alpha, gamma, beta))?)
            }
            IntegratorDef::AlphaOs { alpha, gamma, beta } => {
                Box::new(AlphaOs::with_params(alpha, alpha_params(alpha, gamma, beta))?)
            }
            IntegratorDef::CentralDifference => Box::new(CentralDifference::new()),
            _ => {
                return Err(IntegratorError::invalid(format!(
                    "{self:?} is not a transient integrator"
                )));
            }
        };
        Ok(integrator)
    }
}

/// A built analysis of any kind, ready to run.
pub enum ConfiguredAnalysis {
    Static {
        analysis: StaticAnalysis,
        steps: usize,
    },
    Transient {
        analysis: TransientAnalysis,
        steps: usize,
        dt: f64,
    },
    Variable {
        analysis: VariableTransientAnalysis,
        steps: usize,
        dt: f64,
    },
}

impl ConfiguredAnalysis {
    pub fn run(&mut self) -> AnalysisResult<()> {
        match self {
            ConfiguredAnalysis::Static { analysis, steps } => analysis.analyze(*steps),
            ConfiguredAnalysis::Transient { analysis, steps, dt } => analysis.analyze(*steps, *dt),
            ConfiguredAnalysis::Variable { analysis, steps, dt } => analysis.analyze(*steps, *dt),
        }
    }

    pub fn model(&self) -> &AnalysisModel {
        match self {
            ConfiguredAnalysis::Static { analysis, .. } => analysis.model(),
            ConfiguredAnalysis::Transient { analysis, .. } => analysis.model(),
            ConfiguredAnalysis::Variable { analysis, .. } => analysis.model(),
        }
    }

    pub fn record(&self) -> &AnalysisRecord {
        match self {
            ConfiguredAnalysis::Static { analysis, .. } => analysis.record(),
            ConfiguredAnalysis::Transient { analysis, .. } => analysis.record(),
            ConfiguredAnalysis::Variable { analysis, .. } => analysis.record(),
        }
    }
}

impl AnalysisDef {
    /// Build every part and bind them to `model`.
    pub fn build(&self, mut model: AnalysisModel) -> AnalysisResult<ConfiguredAnalysis> {
        model.set_numberer(self.numberer.into());
        let mut builder = AnalysisBuilder::new(model)
            .boxed_algorithm(self.algorithm.build())
            .boxed_soe(self.system.build());
        if let Some(test) = &self.test {
            builder = builder.test(test.build());
        }

        if !self.integrator.is_transient() {
            let integrator = self
                .integrator
                .build_static()
                .map_err(AnalysisError::NewStep)?;
            return Ok(ConfiguredAnalysis::Static {
                analysis: builder.build_static_boxed(integrator)?,
                steps: self.steps,
            });
        }

        let integrator = self
            .integrator
            .build_transient()
            .map_err(AnalysisError::NewStep)?;
        let dt = self.dt.ok_or(AnalysisError::Unbound { what: "time step" })?;
        Ok(match self.variable_dt {
            Some(options) => ConfiguredAnalysis::Variable {
                analysis: builder.build_variable_transient(integrator, options)?,
                steps: self.steps,
                dt,
            },
            None => ConfiguredAnalysis::Transient {
                analysis: builder.build_transient_boxed(integrator)?,
                steps: self.steps,
                dt,
            },
        })
    }
}
