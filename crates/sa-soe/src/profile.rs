//! Profile (skyline) storage with an in-place `L D Lᵀ` solver.

use crate::error::{SoeError, SoeResult};
use crate::graph::DofGraph;
use crate::soe::{Solver, Storage};
use nalgebra::DVector;

/// Column-wise skyline of the upper triangle. Column `j` stores rows
/// `top[j]..=j` contiguously starting at `start[j]`.
#[derive(Clone, Debug, Default)]
pub struct ProfileStorage {
    top: Vec<usize>,
    start: Vec<usize>,
    values: Vec<f64>,
}

impl ProfileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored coefficients.
    pub fn profile_len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        self.start[j] + (i - self.top[j])
    }
}

impl Storage for ProfileStorage {
    fn resize(&mut self, graph: &DofGraph) -> SoeResult<()> {
        self.top = graph.column_tops();
        self.start = Vec::with_capacity(self.top.len());
        let mut offset = 0;
        for (j, &t) in self.top.iter().enumerate() {
            self.start.push(offset);
            offset += j - t + 1;
        }
        self.values = vec![0.0; offset];
        Ok(())
    }

    fn size(&self) -> usize {
        self.top.len()
    }

    fn zero(&mut self) {
        self.values.fill(0.0);
    }

    fn add(&mut self, row: usize, col: usize, value: f64) -> SoeResult<()> {
        if row > col {
            return Ok(());
        }
        if col >= self.top.len() || row < self.top[col] {
            return Err(SoeError::OutsidePattern { row, col });
        }
        let k = self.idx(row, col);
        self.values[k] += value;
        Ok(())
    }
}

/// Active-column `L D Lᵀ` factorization.
///
/// Works for symmetric indefinite matrices without pivoting, so the sign of
/// the determinant (product of `D`) is available to path-following schemes.
pub struct ProfileLdl {
    pivot_tol: f64,
}

impl ProfileLdl {
    pub fn new() -> Self {
        Self { pivot_tol: 1e-300 }
    }
}

impl Default for ProfileLdl {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver<ProfileStorage> for ProfileLdl {
    fn name(&self) -> &'static str {
        "Profile (LDLt)"
    }

    fn factor(&mut self, s: &mut ProfileStorage) -> SoeResult<()> {
        let n = s.top.len();
        for j in 0..n {
            let tj = s.top[j];
            for i in tj..j {
                let m = s.top[i].max(tj);
                let mut g = s.values[s.idx(i, j)];
                for k in m..i {
                    g -= s.values[s.idx(k, i)] * s.values[s.idx(k, j)];
                }
                let ij = s.idx(i, j);
                s.values[ij] = g;
            }
            let mut d = s.values[s.idx(j, j)];
            for i in tj..j {
                let ij = s.idx(i, j);
                let g = s.values[ij];
                let l = g / s.values[s.idx(i, i)];
                s.values[ij] = l;
                d -= l * g;
            }
            if d.abs() <= self.pivot_tol {
                return Err(SoeError::ZeroPivot { row: j });
            }
            let jj = s.idx(j, j);
            s.values[jj] = d;
        }
        Ok(())
    }

    fn substitute(
        &mut self,
        s: &ProfileStorage,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> SoeResult<()> {
        let n = s.top.len();
        x.copy_from(b);
        for j in 0..n {
            let mut v = x[j];
            for i in s.top[j]..j {
                v -= s.values[s.idx(i, j)] * x[i];
            }
            x[j] = v;
        }
        for j in 0..n {
            x[j] /= s.values[s.idx(j, j)];
        }
        for j in (0..n).rev() {
            let xj = x[j];
            for i in s.top[j]..j {
                x[i] -= s.values[s.idx(i, j)] * xj;
            }
        }
        Ok(())
    }

    fn determinant(&self, s: &ProfileStorage) -> Option<f64> {
        Some((0..s.top.len()).map(|j| s.values[s.idx(j, j)]).product())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soe::{LinearSoe, Soe};
    use nalgebra::DMatrix;

    #[test]
    fn skyline_layout_follows_graph() {
        let mut g = DofGraph::new(4);
        g.add_clique(&[Some(0), Some(3)]);
        g.add_clique(&[Some(1), Some(2)]);
        let mut s = ProfileStorage::new();
        s.resize(&g).unwrap();
        // columns hold 1, 1, 2, 4 entries
        assert_eq!(s.profile_len(), 8);
        assert!(s.add(1, 3, 1.0).is_ok());
        assert!(matches!(
            s.add(0, 2, 1.0),
            Err(SoeError::OutsidePattern { row: 0, col: 2 })
        ));
    }

    #[test]
    fn ldl_solves_indefinite_and_reports_negative_determinant() {
        let mut g = DofGraph::new(2);
        g.add_clique(&[Some(0), Some(1)]);
        let mut soe = Soe::new(ProfileStorage::new(), ProfileLdl::new());
        soe.set_size(&g).unwrap();
        let k = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        soe.add_a(&k, &[Some(0), Some(1)], 1.0).unwrap();
        soe.set_b(&DVector::from_vec(vec![3.0, 3.0])).unwrap();
        soe.solve().unwrap();
        assert!((soe.x()[0] - 1.0).abs() < 1e-12);
        assert!((soe.x()[1] - 1.0).abs() < 1e-12);
        assert!((soe.determinant().unwrap() + 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_pivot_is_reported() {
        let mut soe = Soe::new(ProfileStorage::new(), ProfileLdl::new());
        soe.set_size(&DofGraph::new(2)).unwrap();
        soe.add_a(&DMatrix::from_element(1, 1, 1.0), &[Some(0)], 1.0)
            .unwrap();
        let err = soe.solve().unwrap_err();
        assert_eq!(err, SoeError::ZeroPivot { row: 1 });
    }
}
