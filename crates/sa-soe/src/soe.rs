//! System of equations `A x = b` with a storage family and a matching solver.
//!
//! The storage/solver pairing is fixed by the type parameters of [`Soe`]: a
//! solver implements [`Solver<St>`] only for the storage layout it can
//! factor, so an incompatible pairing is rejected by the compiler instead of
//! a runtime check. Callers that must stay solver-agnostic use the
//! object-safe [`LinearSoe`] trait.

use crate::error::{SoeError, SoeResult};
use crate::graph::DofGraph;
use nalgebra::{DMatrix, DVector};
use sa_core::timing::{Phase, Timer};

/// Matrix storage layout for `A`.
pub trait Storage {
    /// Allocate storage for the connectivity in `graph` and zero it.
    fn resize(&mut self, graph: &DofGraph) -> SoeResult<()>;

    fn size(&self) -> usize;

    fn zero(&mut self);

    /// Accumulate `value` into `A[row, col]`.
    ///
    /// Symmetric layouts keep only the upper triangle and ignore `row > col`.
    fn add(&mut self, row: usize, col: usize, value: f64) -> SoeResult<()>;
}

/// Factorization and substitution for one storage layout.
pub trait Solver<St: Storage> {
    fn name(&self) -> &'static str;

    /// Factor `A` in place (or into solver-owned buffers).
    fn factor(&mut self, storage: &mut St) -> SoeResult<()>;

    /// Solve with an existing factorization.
    fn substitute(&mut self, storage: &St, b: &DVector<f64>, x: &mut DVector<f64>)
    -> SoeResult<()>;

    /// Determinant of the last factored matrix, when the factorization
    /// exposes it.
    fn determinant(&self, _storage: &St) -> Option<f64> {
        None
    }
}

/// Solver-agnostic view of an assembled linear system.
pub trait LinearSoe {
    /// Size storage for the active equation pattern.
    fn set_size(&mut self, graph: &DofGraph) -> SoeResult<()>;

    fn num_eqn(&self) -> usize;

    fn zero_a(&mut self);

    fn zero_b(&mut self);

    /// Assemble `factor * m` at the equations in `ids`; `None` entries are
    /// constrained DOFs and are skipped.
    fn add_a(&mut self, m: &DMatrix<f64>, ids: &[Option<usize>], factor: f64) -> SoeResult<()>;

    /// Assemble `factor * v` into `b` at the equations in `ids`.
    fn add_b(&mut self, v: &DVector<f64>, ids: &[Option<usize>], factor: f64) -> SoeResult<()>;

    fn set_b(&mut self, v: &DVector<f64>) -> SoeResult<()>;

    fn set_x(&mut self, v: &DVector<f64>) -> SoeResult<()>;

    fn b(&self) -> &DVector<f64>;

    fn x(&self) -> &DVector<f64>;

    /// Solve `A x = b`, reusing the factorization while `A` is unchanged.
    fn solve(&mut self) -> SoeResult<()>;

    /// Determinant of `A` after the last successful factorization.
    fn determinant(&self) -> Option<f64>;

    fn solver_name(&self) -> &'static str;
}

/// Concrete system pairing a storage layout with a compatible solver.
pub struct Soe<St: Storage, So: Solver<St>> {
    storage: St,
    solver: So,
    b: DVector<f64>,
    x: DVector<f64>,
    sized: bool,
    factored: bool,
}

impl<St: Storage, So: Solver<St>> Soe<St, So> {
    pub fn new(storage: St, solver: So) -> Self {
        Self {
            storage,
            solver,
            b: DVector::zeros(0),
            x: DVector::zeros(0),
            sized: false,
            factored: false,
        }
    }

    pub fn storage(&self) -> &St {
        &self.storage
    }

    pub fn solver(&self) -> &So {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut So {
        &mut self.solver
    }

    fn check_ids(&self, ids: &[Option<usize>], len: usize) -> SoeResult<()> {
        if !self.sized {
            return Err(SoeError::NotSized);
        }
        if ids.len() != len {
            return Err(SoeError::SizeMismatch {
                what: "ID array",
                expected: len,
                actual: ids.len(),
            });
        }
        let n = self.b.len();
        if let Some(&bad) = ids.iter().flatten().find(|&&eq| eq >= n) {
            return Err(SoeError::SizeMismatch {
                what: "equation number",
                expected: n,
                actual: bad,
            });
        }
        Ok(())
    }
}

impl<St: Storage, So: Solver<St>> LinearSoe for Soe<St, So> {
    fn set_size(&mut self, graph: &DofGraph) -> SoeResult<()> {
        self.storage.resize(graph)?;
        let n = graph.num_vertices();
        self.b = DVector::zeros(n);
        self.x = DVector::zeros(n);
        self.sized = true;
        self.factored = false;
        tracing::debug!(num_eqn = n, solver = self.solver.name(), "system sized");
        Ok(())
    }

    fn num_eqn(&self) -> usize {
        self.b.len()
    }

    fn zero_a(&mut self) {
        self.storage.zero();
        self.factored = false;
    }

    fn zero_b(&mut self) {
        self.b.fill(0.0);
    }

    fn add_a(&mut self, m: &DMatrix<f64>, ids: &[Option<usize>], factor: f64) -> SoeResult<()> {
        if factor == 0.0 {
            return Ok(());
        }
        if m.nrows() != m.ncols() {
            return Err(SoeError::SizeMismatch {
                what: "element matrix columns",
                expected: m.nrows(),
                actual: m.ncols(),
            });
        }
        self.check_ids(ids, m.nrows())?;
        self.factored = false;
        for (i, row) in ids.iter().enumerate() {
            let Some(row) = *row else { continue };
            for (j, col) in ids.iter().enumerate() {
                let Some(col) = *col else { continue };
                let value = m[(i, j)];
                if value != 0.0 {
                    self.storage.add(row, col, factor * value)?;
                }
            }
        }
        Ok(())
    }

    fn add_b(&mut self, v: &DVector<f64>, ids: &[Option<usize>], factor: f64) -> SoeResult<()> {
        if factor == 0.0 {
            return Ok(());
        }
        self.check_ids(ids, v.len())?;
        for (i, eq) in ids.iter().enumerate() {
            if let Some(eq) = *eq {
                self.b[eq] += factor * v[i];
            }
        }
        Ok(())
    }

    fn set_b(&mut self, v: &DVector<f64>) -> SoeResult<()> {
        if v.len() != self.b.len() {
            return Err(SoeError::SizeMismatch {
                what: "right-hand side",
                expected: self.b.len(),
                actual: v.len(),
            });
        }
        self.b.copy_from(v);
        Ok(())
    }

    fn set_x(&mut self, v: &DVector<f64>) -> SoeResult<()> {
        if v.len() != self.x.len() {
            return Err(SoeError::SizeMismatch {
                what: "solution vector",
                expected: self.x.len(),
                actual: v.len(),
            });
        }
        self.x.copy_from(v);
        Ok(())
    }

    fn b(&self) -> &DVector<f64> {
        &self.b
    }

    fn x(&self) -> &DVector<f64> {
        &self.x
    }

    fn solve(&mut self) -> SoeResult<()> {
        if !self.sized {
            return Err(SoeError::NotSized);
        }
        let timer = Timer::start();
        if !self.factored {
            self.solver.factor(&mut self.storage)?;
            self.factored = true;
        }
        let result = self
            .solver
            .substitute(&self.storage, &self.b, &mut self.x);
        timer.stop_into(Phase::FactorSolve);
        result
    }

    fn determinant(&self) -> Option<f64> {
        if self.factored {
            self.solver.determinant(&self.storage)
        } else {
            None
        }
    }

    fn solver_name(&self) -> &'static str {
        self.solver.name()
    }
}
