//! Compressed sparse row storage (`sprs`) with a sparse direct and an
//! iterative solver.

use crate::error::{SoeError, SoeResult};
use crate::graph::DofGraph;
use crate::soe::{Solver, Storage};
use nalgebra::DVector;
use sprs::CsMat;
use std::collections::{BTreeMap, BTreeSet};

/// CSR matrix whose nonzero pattern is fixed by the connectivity graph.
#[derive(Clone, Debug)]
pub struct SparseGenStorage {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    a: CsMat<f64>,
}

impl Default for SparseGenStorage {
    fn default() -> Self {
        Self {
            indptr: vec![0],
            indices: Vec::new(),
            a: CsMat::zero((0, 0)),
        }
    }
}

impl SparseGenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&self) -> &CsMat<f64> {
        &self.a
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    fn position(&self, row: usize, col: usize) -> Option<usize> {
        let lo = self.indptr[row];
        let hi = self.indptr[row + 1];
        self.indices[lo..hi]
            .binary_search(&col)
            .ok()
            .map(|offset| lo + offset)
    }

    /// `y = A x`
    fn mul_vec(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        for (i, row) in self.a.outer_iterator().enumerate() {
            let mut sum = 0.0;
            for (j, &v) in row.iter() {
                sum += v * x[j];
            }
            y[i] = sum;
        }
    }

    fn diagonal(&self) -> Vec<f64> {
        let n = self.indptr.len() - 1;
        (0..n)
            .map(|i| {
                self.position(i, i)
                    .map_or(0.0, |k| self.a.data()[k])
            })
            .collect()
    }
}

impl Storage for SparseGenStorage {
    fn resize(&mut self, graph: &DofGraph) -> SoeResult<()> {
        let n = graph.num_vertices();
        let (indptr, indices) = graph.csr_pattern();
        let data = vec![0.0; indices.len()];
        self.a = CsMat::new((n, n), indptr.clone(), indices.clone(), data);
        self.indptr = indptr;
        self.indices = indices;
        Ok(())
    }

    fn size(&self) -> usize {
        self.indptr.len() - 1
    }

    fn zero(&mut self) {
        self.a.data_mut().fill(0.0);
    }

    fn add(&mut self, row: usize, col: usize, value: f64) -> SoeResult<()> {
        if row >= self.size() {
            return Err(SoeError::OutsidePattern { row, col });
        }
        let k = self
            .position(row, col)
            .ok_or(SoeError::OutsidePattern { row, col })?;
        self.a.data_mut()[k] += value;
        Ok(())
    }
}

/// Sparse LU with row partial pivoting.
///
/// Rows are eliminated in place in row-wise maps, so the factors only hold
/// the pattern plus fill-in. Pivots are chosen by magnitude within the
/// column being eliminated; columns keep their order.
#[derive(Clone, Debug, Default)]
pub struct SparseLu {
    /// `U` row of the pivot chosen at each step, diagonal first
    upper: Vec<Vec<(usize, f64)>>,
    /// Multipliers applied to each original row, as `(step, m)`
    lower: Vec<Vec<(usize, f64)>>,
    /// Original row used as pivot at each step
    perm: Vec<usize>,
    factored: bool,
}

impl SparseLu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored entries of `L` and `U` after the last factorisation.
    pub fn factor_nnz(&self) -> usize {
        self.upper.iter().map(Vec::len).sum::<usize>()
            + self.lower.iter().map(Vec::len).sum::<usize>()
    }

    fn eliminate(&mut self, storage: &SparseGenStorage) -> SoeResult<()> {
        let n = storage.size();
        let mut rows: Vec<BTreeMap<usize, f64>> = storage
            .a
            .outer_iterator()
            .map(|row| row.iter().map(|(j, &v)| (j, v)).collect())
            .collect();
        let mut col_rows: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for (i, row) in rows.iter().enumerate() {
            for &j in row.keys() {
                col_rows[j].insert(i);
            }
        }
        let mut active = vec![true; n];
        self.upper = Vec::with_capacity(n);
        self.lower = vec![Vec::new(); n];
        self.perm = Vec::with_capacity(n);

        for k in 0..n {
            let candidates: Vec<usize> = col_rows[k]
                .iter()
                .copied()
                .filter(|&r| active[r])
                .collect();
            let pivot = candidates
                .iter()
                .copied()
                .map(|r| (r, rows[r].get(&k).copied().unwrap_or(0.0)))
                .filter(|&(_, v)| v != 0.0)
                .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));
            let Some((p, pivot_value)) = pivot else {
                return Err(SoeError::Singular);
            };
            active[p] = false;
            let pivot_row: Vec<(usize, f64)> =
                std::mem::take(&mut rows[p]).into_iter().collect();

            for r in candidates.into_iter().filter(|&r| r != p) {
                let Some(a_rk) = rows[r].remove(&k) else {
                    continue;
                };
                let m = a_rk / pivot_value;
                self.lower[r].push((k, m));
                for &(c, v) in pivot_row.iter().filter(|(c, _)| *c > k) {
                    *rows[r].entry(c).or_insert(0.0) -= m * v;
                    col_rows[c].insert(r);
                }
            }
            self.upper.push(pivot_row);
            self.perm.push(p);
        }
        Ok(())
    }

    fn permutation_sign(&self) -> f64 {
        let mut seen = vec![false; self.perm.len()];
        let mut sign = 1.0;
        for start in 0..self.perm.len() {
            let mut len = 0;
            let mut i = start;
            while !seen[i] {
                seen[i] = true;
                i = self.perm[i];
                len += 1;
            }
            if len > 0 && len % 2 == 0 {
                sign = -sign;
            }
        }
        sign
    }
}

impl Solver<SparseGenStorage> for SparseLu {
    fn name(&self) -> &'static str {
        "SparseGeneral (LU)"
    }

    fn factor(&mut self, storage: &mut SparseGenStorage) -> SoeResult<()> {
        self.factored = false;
        self.eliminate(storage)?;
        self.factored = true;
        tracing::trace!(
            nnz = storage.nnz(),
            factor_nnz = self.factor_nnz(),
            "sparse LU factored"
        );
        Ok(())
    }

    fn substitute(
        &mut self,
        _storage: &SparseGenStorage,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> SoeResult<()> {
        if !self.factored {
            return Err(SoeError::Singular);
        }
        let n = self.perm.len();
        let mut y = DVector::zeros(n);
        for k in 0..n {
            let r = self.perm[k];
            y[k] = b[r] - self.lower[r].iter().map(|&(j, m)| m * y[j]).sum::<f64>();
        }
        for k in (0..n).rev() {
            let row = &self.upper[k];
            let mut v = y[k];
            let mut diag = 0.0;
            for &(c, u) in row {
                if c == k {
                    diag = u;
                } else {
                    v -= u * x[c];
                }
            }
            x[k] = v / diag;
        }
        Ok(())
    }

    fn determinant(&self, _storage: &SparseGenStorage) -> Option<f64> {
        if !self.factored {
            return None;
        }
        let diag: f64 = self
            .upper
            .iter()
            .enumerate()
            .map(|(k, row)| row.iter().find(|(c, _)| *c == k).map_or(0.0, |&(_, u)| u))
            .product();
        Some(self.permutation_sign() * diag)
    }
}

/// Jacobi-preconditioned conjugate gradients for symmetric positive
/// definite systems.
pub struct PcgSolver {
    /// Relative residual tolerance ‖r‖/‖b‖
    pub tol: f64,
    /// Maximum iterations (0 = number of equations)
    pub max_iter: usize,
    inv_diag: Vec<f64>,
    last_iterations: usize,
}

impl Default for PcgSolver {
    fn default() -> Self {
        Self {
            tol: 1e-12,
            max_iter: 0,
            inv_diag: Vec::new(),
            last_iterations: 0,
        }
    }
}

impl PcgSolver {
    pub fn new(tol: f64, max_iter: usize) -> Self {
        Self {
            tol,
            max_iter,
            ..Self::default()
        }
    }

    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }
}

impl Solver<SparseGenStorage> for PcgSolver {
    fn name(&self) -> &'static str {
        "SparseSPD (Jacobi PCG)"
    }

    fn factor(&mut self, storage: &mut SparseGenStorage) -> SoeResult<()> {
        let diag = storage.diagonal();
        let mut inv = Vec::with_capacity(diag.len());
        for (i, d) in diag.into_iter().enumerate() {
            if d <= 0.0 {
                return Err(SoeError::NotPositiveDefinite { row: i, pivot: d });
            }
            inv.push(1.0 / d);
        }
        self.inv_diag = inv;
        Ok(())
    }

    fn substitute(
        &mut self,
        storage: &SparseGenStorage,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> SoeResult<()> {
        let n = b.len();
        let max_iter = if self.max_iter == 0 {
            n.max(1) * 2
        } else {
            self.max_iter
        };
        x.fill(0.0);
        let b_norm = b.norm();
        if b_norm == 0.0 {
            self.last_iterations = 0;
            return Ok(());
        }

        let inv_diag = self.inv_diag.clone();
        let precondition = |r: &DVector<f64>| -> DVector<f64> {
            DVector::from_iterator(n, r.iter().zip(&inv_diag).map(|(ri, di)| ri * di))
        };

        let mut r = b.clone();
        let mut z = precondition(&r);
        let mut p = z.clone();
        let mut rz = r.dot(&z);
        let mut ap = DVector::zeros(n);

        for iter in 1..=max_iter {
            storage.mul_vec(&p, &mut ap);
            let pap = p.dot(&ap);
            if pap <= 0.0 {
                return Err(SoeError::NotPositiveDefinite {
                    row: iter,
                    pivot: pap,
                });
            }
            let alpha = rz / pap;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &ap, 1.0);

            let res = r.norm() / b_norm;
            if res <= self.tol {
                self.last_iterations = iter;
                tracing::trace!(iterations = iter, residual = res, "pcg converged");
                return Ok(());
            }

            z = precondition(&r);
            let rz_new = r.dot(&z);
            let beta = rz_new / rz;
            rz = rz_new;
            p = &z + &p * beta;
        }

        self.last_iterations = max_iter;
        Err(SoeError::NotConverged {
            iterations: max_iter,
            residual: r.norm() / b_norm,
        })
    }
}
