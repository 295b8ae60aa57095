//! Linear viscous dashpot.

use crate::element::{Element, TrialResponse};
use crate::error::{ModelError, ModelResult};
use nalgebra::{DMatrix, DVector};
use sa_core::DofId;

#[derive(Clone, Debug)]
pub struct Dashpot {
    dofs: Vec<DofId>,
    c: f64,
}

impl Dashpot {
    /// Dashpot from `i` to `j`; with `j = None` the far end is grounded.
    pub fn new(i: DofId, j: Option<DofId>, c: f64) -> ModelResult<Self> {
        if !(c >= 0.0 && c.is_finite()) {
            return Err(ModelError::InvalidParameter {
                what: format!("damping coefficient must be non-negative, got {c}"),
            });
        }
        let dofs = match j {
            Some(j) => vec![i, j],
            None => vec![i],
        };
        Ok(Self { dofs, c })
    }
}

impl Element for Dashpot {
    fn name(&self) -> &'static str {
        "Dashpot"
    }

    fn dofs(&self) -> &[DofId] {
        &self.dofs
    }

    fn update(&mut self, _trial: &TrialResponse<'_>) -> ModelResult<()> {
        Ok(())
    }

    fn tangent_stiff(&self) -> DMatrix<f64> {
        let n = self.dofs.len();
        DMatrix::zeros(n, n)
    }

    fn initial_stiff(&self) -> DMatrix<f64> {
        self.tangent_stiff()
    }

    fn damp(&self) -> DMatrix<f64> {
        if self.dofs.len() == 2 {
            DMatrix::from_row_slice(2, 2, &[self.c, -self.c, -self.c, self.c])
        } else {
            DMatrix::from_element(1, 1, self.c)
        }
    }

    fn resisting_force(&self) -> DVector<f64> {
        DVector::zeros(self.dofs.len())
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
