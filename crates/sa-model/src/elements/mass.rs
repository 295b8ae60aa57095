//! Lumped nodal mass.

use crate::element::{Element, TrialResponse};
use crate::error::{ModelError, ModelResult};
use nalgebra::{DMatrix, DVector};
use sa_core::DofId;

#[derive(Clone, Debug)]
pub struct LumpedMass {
    dofs: [DofId; 1],
    m: f64,
}

impl LumpedMass {
    pub fn new(dof: DofId, m: f64) -> ModelResult<Self> {
        if !(m >= 0.0 && m.is_finite()) {
            return Err(ModelError::InvalidParameter {
                what: format!("mass must be non-negative, got {m}"),
            });
        }
        Ok(Self { dofs: [dof], m })
    }
}

impl Element for LumpedMass {
    fn name(&self) -> &'static str {
        "LumpedMass"
    }

    fn dofs(&self) -> &[DofId] {
        &self.dofs
    }

    fn update(&mut self, _trial: &TrialResponse<'_>) -> ModelResult<()> {
        Ok(())
    }

    fn tangent_stiff(&self) -> DMatrix<f64> {
        DMatrix::zeros(1, 1)
    }

    fn initial_stiff(&self) -> DMatrix<f64> {
        DMatrix::zeros(1, 1)
    }

    fn mass(&self) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, self.m)
    }

    fn resisting_force(&self) -> DVector<f64> {
        DVector::zeros(1)
    }

    fn commit_state(&mut self) -> ModelResult<()> {
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> ModelResult<()> {
        Ok(())
    }

    fn revert_to_start(&mut self) -> ModelResult<()> {
        Ok(())
    }
}
