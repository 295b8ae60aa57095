//! Nonlinear static and transient solution of an [`sa_model::AnalysisModel`].
//!
//! An analysis couples four parts:
//! - an integrator (load-factor or time stepping, predictor and corrector)
//! - a solution algorithm (how a step iterates to equilibrium)
//! - a convergence test
//! - a linear system of equations from `sa-soe`
//!
//! Assemble them with [`AnalysisBuilder`] or from an [`AnalysisDef`].

pub mod algorithm;
pub mod analysis;
pub mod config;
pub mod convergence;
pub mod error;
pub mod integrator;

pub use algorithm::{
    AnalysisLinks, Broyden, LineSearch, LineSearchParams, Linear, ModifiedNewton,
    NewtonLineSearch, NewtonRaphson, NewtonTangent, PeriodicNewton, SolutionAlgorithm, StepReport,
};
pub use analysis::{
    AnalysisBuilder, AnalysisRecord, StaticAnalysis, TransientAnalysis, VariableDt,
    VariableTransientAnalysis,
};
pub use config::{
    AlgorithmDef, AnalysisDef, ConfiguredAnalysis, IntegratorDef, NumbererDef, SystemDef, TestDef,
};
pub use convergence::{ConvergenceTest, TestKind, TestVerdict, Verbosity};
pub use error::{AnalysisError, AnalysisResult, IntegratorError, IntegratorResult};
pub use integrator::{
    AlphaOs, ArcLength, ArcLength1, CentralDifference, DeterminantSign, DisplacementControl, Hht,
    AsIntegrator, Integrator, LoadControl, MinUnbalDispNorm, Newmark, NewmarkExplicit, NewmarkParams,
    StaticIntegrator, TangentKind, TransientIntegrator,
};
