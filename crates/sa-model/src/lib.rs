//! sa-model: the structure seen by the solution layer.
//!
//! Contains:
//! - element (contribution contract and trial-response view)
//! - elements (springs, lumped mass, dashpot)
//! - load (time series and load patterns)
//! - numbering (plain and reverse Cuthill–McKee equation numbering)
//! - damping (Rayleigh factors)
//! - model (DOF/equation bookkeeping, committed and trial response)
//! - builder (incremental construction with validation)

pub mod builder;
pub mod damping;
pub mod element;
pub mod elements;
pub mod error;
pub mod load;
pub mod model;
pub mod numbering;

pub use builder::ModelBuilder;
pub use damping::RayleighDamping;
pub use element::{Element, ResponseKind, TrialResponse};
pub use error::{ModelError, ModelResult};
pub use load::{LoadPattern, TimeSeries};
pub use model::AnalysisModel;
pub use numbering::Numberer;
