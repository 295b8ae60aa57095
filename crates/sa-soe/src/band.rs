//! Banded storage: symmetric positive definite (Cholesky) and general (LU
//! without pivoting).

use crate::error::{SoeError, SoeResult};
use crate::graph::DofGraph;
use crate::soe::{Solver, Storage};
use nalgebra::DVector;

/// Upper band of a symmetric matrix, row-wise: entry `(i, j)` with
/// `i <= j <= i + kd` lives at `i * (kd + 1) + (j - i)`.
#[derive(Clone, Debug, Default)]
pub struct BandSpdStorage {
    n: usize,
    kd: usize,
    band: Vec<f64>,
}

impl BandSpdStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn half_bandwidth(&self) -> usize {
        self.kd
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * (self.kd + 1) + (j - i)
    }
}

impl Storage for BandSpdStorage {
    fn resize(&mut self, graph: &DofGraph) -> SoeResult<()> {
        self.n = graph.num_vertices();
        self.kd = graph.half_bandwidth();
        self.band = vec![0.0; self.n * (self.kd + 1)];
        Ok(())
    }

    fn size(&self) -> usize {
        self.n
    }

    fn zero(&mut self) {
        self.band.fill(0.0);
    }

    fn add(&mut self, row: usize, col: usize, value: f64) -> SoeResult<()> {
        if row > col {
            return Ok(());
        }
        if col >= self.n || col - row > self.kd {
            return Err(SoeError::OutsidePattern { row, col });
        }
        let k = self.idx(row, col);
        self.band[k] += value;
        Ok(())
    }
}

/// Band Cholesky `A = Uᵀ U`, factored in place.
#[derive(Default)]
pub struct BandCholesky;

impl BandCholesky {
    pub fn new() -> Self {
        Self
    }
}

impl Solver<BandSpdStorage> for BandCholesky {
    fn name(&self) -> &'static str {
        "BandSPD (Cholesky)"
    }

    fn factor(&mut self, s: &mut BandSpdStorage) -> SoeResult<()> {
        let (n, kd) = (s.n, s.kd);
        for i in 0..n {
            let kmin = i.saturating_sub(kd);
            let mut diag = s.band[s.idx(i, i)];
            for k in kmin..i {
                let u = s.band[s.idx(k, i)];
                diag -= u * u;
            }
            if diag <= 0.0 {
                return Err(SoeError::NotPositiveDefinite {
                    row: i,
                    pivot: diag,
                });
            }
            let uii = diag.sqrt();
            let ii = s.idx(i, i);
            s.band[ii] = uii;
            let jmax = (i + kd).min(n - 1);
            for j in (i + 1)..=jmax {
                let mut v = s.band[s.idx(i, j)];
                for k in j.saturating_sub(kd)..i {
                    v -= s.band[s.idx(k, i)] * s.band[s.idx(k, j)];
                }
                let ij = s.idx(i, j);
                s.band[ij] = v / uii;
            }
        }
        Ok(())
    }

    fn substitute(
        &mut self,
        s: &BandSpdStorage,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> SoeResult<()> {
        let (n, kd) = (s.n, s.kd);
        x.copy_from(b);
        // Uᵀ y = b
        for i in 0..n {
            let mut v = x[i];
            for k in i.saturating_sub(kd)..i {
                v -= s.band[s.idx(k, i)] * x[k];
            }
            x[i] = v / s.band[s.idx(i, i)];
        }
        // U x = y
        for i in (0..n).rev() {
            let mut v = x[i];
            let jmax = (i + kd).min(n.saturating_sub(1));
            for j in (i + 1)..=jmax {
                v -= s.band[s.idx(i, j)] * x[j];
            }
            x[i] = v / s.band[s.idx(i, i)];
        }
        Ok(())
    }

    fn determinant(&self, s: &BandSpdStorage) -> Option<f64> {
        Some((0..s.n).map(|i| s.band[s.idx(i, i)].powi(2)).product())
    }
}

/// Full band of a general matrix: entry `(i, j)` with `|i - j| <= kd`
/// lives at `i * (2 kd + 1) + (j + kd - i)`.
#[derive(Clone, Debug, Default)]
pub struct BandGenStorage {
    n: usize,
    kd: usize,
    band: Vec<f64>,
}

impl BandGenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * (2 * self.kd + 1) + (j + self.kd - i)
    }
}

impl Storage for BandGenStorage {
    fn resize(&mut self, graph: &DofGraph) -> SoeResult<()> {
        self.n = graph.num_vertices();
        self.kd = graph.half_bandwidth();
        self.band = vec![0.0; self.n * (2 * self.kd + 1)];
        Ok(())
    }

    fn size(&self) -> usize {
        self.n
    }

    fn zero(&mut self) {
        self.band.fill(0.0);
    }

    fn add(&mut self, row: usize, col: usize, value: f64) -> SoeResult<()> {
        if row >= self.n || col >= self.n || row.abs_diff(col) > self.kd {
            return Err(SoeError::OutsidePattern { row, col });
        }
        let k = self.idx(row, col);
        self.band[k] += value;
        Ok(())
    }
}

/// Doolittle band LU without pivoting, factored in place.
pub struct BandLu {
    pivot_tol: f64,
}

impl BandLu {
    pub fn new() -> Self {
        Self { pivot_tol: 1e-300 }
    }
}

impl Default for BandLu {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver<BandGenStorage> for BandLu {
    fn name(&self) -> &'static str {
        "BandGeneral (LU)"
    }

    fn factor(&mut self, s: &mut BandGenStorage) -> SoeResult<()> {
        let (n, kd) = (s.n, s.kd);
        for k in 0..n {
            let pivot = s.band[s.idx(k, k)];
            if pivot.abs() <= self.pivot_tol {
                return Err(SoeError::ZeroPivot { row: k });
            }
            let last = (k + kd).min(n - 1);
            for i in (k + 1)..=last {
                let ik = s.idx(i, k);
                let l = s.band[ik] / pivot;
                s.band[ik] = l;
                if l == 0.0 {
                    continue;
                }
                for j in (k + 1)..=last {
                    let kj = s.band[s.idx(k, j)];
                    let ij = s.idx(i, j);
                    s.band[ij] -= l * kj;
                }
            }
        }
        Ok(())
    }

    fn substitute(
        &mut self,
        s: &BandGenStorage,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> SoeResult<()> {
        let (n, kd) = (s.n, s.kd);
        x.copy_from(b);
        for i in 0..n {
            let mut v = x[i];
            for k in i.saturating_sub(kd)..i {
                v -= s.band[s.idx(i, k)] * x[k];
            }
            x[i] = v;
        }
        for i in (0..n).rev() {
            let mut v = x[i];
            let jmax = (i + kd).min(n.saturating_sub(1));
            for j in (i + 1)..=jmax {
                v -= s.band[s.idx(i, j)] * x[j];
            }
            x[i] = v / s.band[s.idx(i, i)];
        }
        Ok(())
    }

    fn determinant(&self, s: &BandGenStorage) -> Option<f64> {
        Some((0..s.n).map(|i| s.band[s.idx(i, i)]).product())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soe::{LinearSoe, Soe};
    use nalgebra::DMatrix;

    fn spring_chain_graph(n: usize) -> DofGraph {
        let mut g = DofGraph::new(n);
        for i in 0..n - 1 {
            g.add_clique(&[Some(i), Some(i + 1)]);
        }
        g
    }

    fn assemble_chain(soe: &mut dyn LinearSoe, n: usize, k: f64) {
        let ke = DMatrix::from_row_slice(2, 2, &[k, -k, -k, k]);
        // ground spring on the first DOF
        soe.add_a(&DMatrix::from_element(1, 1, k), &[Some(0)], 1.0)
            .unwrap();
        for i in 0..n - 1 {
            soe.add_a(&ke, &[Some(i), Some(i + 1)], 1.0).unwrap();
        }
    }

    #[test]
    fn cholesky_matches_chain_solution() {
        let n = 4;
        let mut soe = Soe::new(BandSpdStorage::new(), BandCholesky::new());
        soe.set_size(&spring_chain_graph(n)).unwrap();
        assemble_chain(&mut soe, n, 10.0);
        let mut b = DVector::zeros(n);
        b[n - 1] = 1.0;
        soe.set_b(&b).unwrap();
        soe.solve().unwrap();
        // series springs: u_i = (i + 1) / k
        for i in 0..n {
            assert!((soe.x()[i] - (i as f64 + 1.0) / 10.0).abs() < 1e-12);
        }
    }

    #[test]
    fn cholesky_rejects_indefinite() {
        let mut soe = Soe::new(BandSpdStorage::new(), BandCholesky::new());
        soe.set_size(&DofGraph::new(1)).unwrap();
        soe.add_a(&DMatrix::from_element(1, 1, -1.0), &[Some(0)], 1.0)
            .unwrap();
        let err = soe.solve().unwrap_err();
        assert!(matches!(err, SoeError::NotPositiveDefinite { row: 0, .. }));
    }

    #[test]
    fn out_of_band_entry_is_rejected() {
        let mut soe = Soe::new(BandGenStorage::new(), BandLu::new());
        soe.set_size(&spring_chain_graph(3)).unwrap();
        let ke = DMatrix::from_element(2, 2, 1.0);
        let err = soe.add_a(&ke, &[Some(0), Some(2)], 1.0).unwrap_err();
        assert!(matches!(err, SoeError::OutsidePattern { .. }));
    }

    #[test]
    fn band_lu_solves_unsymmetric() {
        let mut soe = Soe::new(BandGenStorage::new(), BandLu::new());
        soe.set_size(&spring_chain_graph(2)).unwrap();
        let k = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 2.0, 3.0]);
        soe.add_a(&k, &[Some(0), Some(1)], 1.0).unwrap();
        soe.set_b(&DVector::from_vec(vec![1.0, 2.0])).unwrap();
        soe.solve().unwrap();
        assert!((soe.x()[0] - 0.1).abs() < 1e-12);
        assert!((soe.x()[1] - 0.6).abs() < 1e-12);
        assert!((soe.determinant().unwrap() - 10.0).abs() < 1e-12);
    }
}
