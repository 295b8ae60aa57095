//! Diagonal storage for lumped systems (explicit dynamics).

use crate::error::{SoeError, SoeResult};
use crate::graph::DofGraph;
use crate::soe::{Solver, Storage};
use nalgebra::DVector;

/// Keeps only `A[i, i]`; off-diagonal contributions are dropped.
#[derive(Clone, Debug, Default)]
pub struct DiagonalStorage {
    diag: Vec<f64>,
}

impl DiagonalStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for DiagonalStorage {
    fn resize(&mut self, graph: &DofGraph) -> SoeResult<()> {
        self.diag = vec![0.0; graph.num_vertices()];
        Ok(())
    }

    fn size(&self) -> usize {
        self.diag.len()
    }

    fn zero(&mut self) {
        self.diag.fill(0.0);
    }

    fn add(&mut self, row: usize, col: usize, value: f64) -> SoeResult<()> {
        if row >= self.diag.len() {
            return Err(SoeError::OutsidePattern { row, col });
        }
        if row == col {
            self.diag[row] += value;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct DiagonalSolver;

impl DiagonalSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver<DiagonalStorage> for DiagonalSolver {
    fn name(&self) -> &'static str {
        "Diagonal"
    }

    fn factor(&mut self, storage: &mut DiagonalStorage) -> SoeResult<()> {
        match storage.diag.iter().position(|&d| d == 0.0) {
            Some(row) => Err(SoeError::ZeroPivot { row }),
            None => Ok(()),
        }
    }

    fn substitute(
        &mut self,
        storage: &DiagonalStorage,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> SoeResult<()> {
        for (i, d) in storage.diag.iter().enumerate() {
            x[i] = b[i] / d;
        }
        Ok(())
    }

    fn determinant(&self, storage: &DiagonalStorage) -> Option<f64> {
        Some(storage.diag.iter().product())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soe::{LinearSoe, Soe};
    use nalgebra::DMatrix;

    #[test]
    fn off_diagonal_terms_are_dropped() {
        let mut soe = Soe::new(DiagonalStorage::new(), DiagonalSolver::new());
        soe.set_size(&DofGraph::new(2)).unwrap();
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 5.0, 5.0, 4.0]);
        soe.add_a(&m, &[Some(0), Some(1)], 1.0).unwrap();
        soe.set_b(&DVector::from_vec(vec![2.0, 2.0])).unwrap();
        soe.solve().unwrap();
        assert_eq!(soe.x().as_slice(), &[1.0, 0.5]);
    }

    #[test]
    fn zero_diagonal_is_a_zero_pivot() {
        let mut soe = Soe::new(DiagonalStorage::new(), DiagonalSolver::new());
        soe.set_size(&DofGraph::new(3)).unwrap();
        soe.add_a(&DMatrix::from_element(1, 1, 1.0), &[Some(0)], 1.0)
            .unwrap();
        assert_eq!(soe.solve().unwrap_err(), SoeError::ZeroPivot { row: 1 });
    }
}
