//! Dense general storage with an LU solver.

use crate::error::{SoeError, SoeResult};
use crate::graph::DofGraph;
use crate::soe::{Solver, Storage};
use nalgebra::{DMatrix, DVector, Dyn, LU};

/// Dense `n x n` storage; the connectivity pattern is ignored.
#[derive(Clone, Debug)]
pub struct FullGenStorage {
    a: DMatrix<f64>,
}

impl Default for FullGenStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FullGenStorage {
    pub fn new() -> Self {
        Self {
            a: DMatrix::zeros(0, 0),
        }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.a
    }
}

impl Storage for FullGenStorage {
    fn resize(&mut self, graph: &DofGraph) -> SoeResult<()> {
        let n = graph.num_vertices();
        self.a = DMatrix::zeros(n, n);
        Ok(())
    }

    fn size(&self) -> usize {
        self.a.nrows()
    }

    fn zero(&mut self) {
        self.a.fill(0.0);
    }

    fn add(&mut self, row: usize, col: usize, value: f64) -> SoeResult<()> {
        let n = self.a.nrows();
        if row >= n || col >= n {
            return Err(SoeError::OutsidePattern { row, col });
        }
        self.a[(row, col)] += value;
        Ok(())
    }
}

/// Partial-pivoting LU from `nalgebra`.
#[derive(Default)]
pub struct FullGenLu {
    lu: Option<LU<f64, Dyn, Dyn>>,
}

impl FullGenLu {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Solver<FullGenStorage> for FullGenLu {
    fn name(&self) -> &'static str {
        "FullGeneral (LU)"
    }

    fn factor(&mut self, storage: &mut FullGenStorage) -> SoeResult<()> {
        let lu = storage.a.clone().lu();
        if !lu.is_invertible() {
            self.lu = None;
            return Err(SoeError::Singular);
        }
        self.lu = Some(lu);
        Ok(())
    }

    fn substitute(
        &mut self,
        _storage: &FullGenStorage,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> SoeResult<()> {
        let lu = self.lu.as_ref().ok_or(SoeError::Singular)?;
        let sol = lu.solve(b).ok_or(SoeError::Singular)?;
        x.copy_from(&sol);
        Ok(())
    }

    fn determinant(&self, _storage: &FullGenStorage) -> Option<f64> {
        self.lu.as_ref().map(|lu| lu.determinant())
    }
}
