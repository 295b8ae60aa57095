//! YAML description of a spring model plus its analysis.
//!
//! ```yaml
//! dofs: 2
//! fixed: [0]
//! elements:
//!   - { type: Spring, i: 0, j: 1, k: 100.0 }
//! patterns:
//!   - series: { type: Linear, factor: 1.0 }
//!     loads: [{ dof: 1, value: 10.0 }]
//! analysis:
//!   algorithm: { type: NewtonRaphson }
//!   test: { kind: EnergyIncr, tol: 1.0e-10, max_iter: 10 }
//!   integrator: { type: LoadControl, d_lambda: 0.1 }
//!   steps: 10
//! ```

use crate::error::{CliError, CliResult};
use sa_analysis::AnalysisDef;
use sa_core::DofId;
use sa_model::elements::{Dashpot, LumpedMass, Spring, SpringLaw};
use sa_model::{
    AnalysisModel, LoadPattern, ModelBuilder, ModelError, ModelResult, RayleighDamping, TimeSeries,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub dofs: usize,
    #[serde(default)]
    pub fixed: Vec<usize>,
    #[serde(default)]
    pub elements: Vec<ElementDef>,
    #[serde(default)]
    pub patterns: Vec<PatternDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rayleigh: Option<RayleighDef>,
    pub analysis: AnalysisDef,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementDef {
    Spring {
        i: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        j: Option<usize>,
        k: f64,
    },
    CubicSpring {
        i: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        j: Option<usize>,
        k: f64,
        k3: f64,
    },
    BilinearSpring {
        i: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        j: Option<usize>,
        k: f64,
        fy: f64,
        b: f64,
    },
    Mass {
        dof: usize,
        m: f64,
    },
    Dashpot {
        i: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        j: Option<usize>,
        c: f64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SeriesDef {
    Constant {
        #[serde(default = "default_factor")]
        factor: f64,
    },
    Linear {
        #[serde(default = "default_factor")]
        factor: f64,
    },
    Path {
        times: Vec<f64>,
        values: Vec<f64>,
        #[serde(default = "default_factor")]
        factor: f64,
    },
    Sine {
        period: f64,
        #[serde(default)]
        start: f64,
        end: f64,
        #[serde(default = "default_factor")]
        factor: f64,
    },
}

fn default_factor() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadDef {
    pub dof: usize,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternDef {
    pub series: SeriesDef,
    #[serde(default)]
    pub loads: Vec<LoadDef>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayleighDef {
    pub alpha_m: f64,
    pub beta_k: f64,
    pub beta_k0: f64,
    pub beta_kc: f64,
}

impl From<SeriesDef> for TimeSeries {
    fn from(def: SeriesDef) -> Self {
        match def {
            SeriesDef::Constant { factor } => TimeSeries::Constant { factor },
            SeriesDef::Linear { factor } => TimeSeries::Linear { factor },
            SeriesDef::Path {
                times,
                values,
                factor,
            } => TimeSeries::Path {
                times,
                values,
                factor,
            },
            SeriesDef::Sine {
                period,
                start,
                end,
                factor,
            } => TimeSeries::Sine {
                period,
                start,
                end,
                factor,
            },
        }
    }
}

pub fn load_model_file(path: &Path) -> CliResult<ModelFile> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&text)?)
}

impl ModelFile {
    fn dof(&self, index: usize) -> ModelResult<DofId> {
        if index < self.dofs {
            Ok(DofId::from_index(index))
        } else {
            Err(ModelError::InvalidDof {
                dof: DofId::from_index(index),
                num_dofs: self.dofs,
            })
        }
    }

    fn other_end(&self, j: Option<usize>) -> ModelResult<Option<DofId>> {
        j.map(|j| self.dof(j)).transpose()
    }

    pub fn build_model(&self) -> ModelResult<AnalysisModel> {
        let mut builder = ModelBuilder::new();
        builder.add_dofs(self.dofs);
        for &d in &self.fixed {
            builder.fix(self.dof(d)?)?;
        }
        for element in &self.elements {
            match *element {
                ElementDef::Spring { i, j, k } => {
                    builder.add_element(Spring::linear(self.dof(i)?, self.other_end(j)?, k)?);
                }
                ElementDef::CubicSpring { i, j, k, k3 } => {
                    let law = SpringLaw::Cubic { k, k3 };
                    builder.add_element(Spring::new(self.dof(i)?, self.other_end(j)?, law)?);
                }
                ElementDef::BilinearSpring { i, j, k, fy, b } => {
                    let law = SpringLaw::Bilinear { k, fy, b };
                    builder.add_element(Spring::new(self.dof(i)?, self.other_end(j)?, law)?);
                }
                ElementDef::Mass { dof, m } => {
                    builder.add_element(LumpedMass::new(self.dof(dof)?, m)?);
                }
                ElementDef::Dashpot { i, j, c } => {
                    builder.add_element(Dashpot::new(self.dof(i)?, self.other_end(j)?, c)?);
                }
            }
        }
        for pattern in &self.patterns {
            let mut lp = LoadPattern::new(pattern.series.clone().into())?;
            for load in &pattern.loads {
                lp.add_load(self.dof(load.dof)?, load.value);
            }
            builder.add_pattern(lp);
        }
        if let Some(r) = self.rayleigh {
            builder.rayleigh(RayleighDamping {
                alpha_m: r.alpha_m,
                beta_k: r.beta_k,
                beta_k0: r.beta_k0,
                beta_kc: r.beta_kc,
            });
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_DOF: &str = r#"
dofs: 2
fixed: [0]
elements:
  - { type: Spring, i: 0, j: 1, k: 100.0 }
patterns:
  - series: { type: Linear }
    loads: [{ dof: 1, value: 10.0 }]
analysis:
  algorithm: { type: NewtonRaphson }
  test: { kind: EnergyIncr, tol: 1.0e-10, max_iter: 10 }
  integrator: { type: LoadControl, d_lambda: 0.5 }
  steps: 2
"#;

    #[test]
    fn parses_and_runs_two_dof_spring() {
        let file: ModelFile = serde_yaml::from_str(TWO_DOF).unwrap();
        let model = file.build_model().unwrap();
        assert_eq!(model.num_eqn(), 1);

        let mut analysis = file.analysis.build(model).unwrap();
        analysis.run().unwrap();
        let record = analysis.record();
        assert_eq!(record.len(), 2);
        assert!((record.disp[1][1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn unknown_dof_is_rejected() {
        let mut file: ModelFile = serde_yaml::from_str(TWO_DOF).unwrap();
        file.elements.push(ElementDef::Mass { dof: 5, m: 1.0 });
        assert!(matches!(
            file.build_model(),
            Err(ModelError::InvalidDof { num_dofs: 2, .. })
        ));
    }

    #[test]
    fn transient_file_with_mass_and_damping() {
        let yaml = r#"
dofs: 1
elements:
  - { type: Spring, i: 0, k: 39.478 }
  - { type: Mass, dof: 0, m: 1.0 }
  - { type: Dashpot, i: 0, c: 0.1 }
patterns:
  - series: { type: Sine, period: 1.0, end: 2.0 }
    loads: [{ dof: 0, value: 1.0 }]
rayleigh: { alpha_m: 0.01 }
analysis:
  algorithm: { type: Linear }
  integrator: { type: Newmark, gamma: 0.5, beta: 0.25 }
  steps: 20
  dt: 0.01
"#;
        let file: ModelFile = serde_yaml::from_str(yaml).unwrap();
        let model = file.build_model().unwrap();
        assert!(model.rayleigh().is_some());
        let mut analysis = file.analysis.build(model).unwrap();
        analysis.run().unwrap();
        assert!((analysis.model().committed_time() - 0.2).abs() < 1e-9);
    }
}
