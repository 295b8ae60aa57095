//! Linear system of equations for the structural solution engine.
//!
//! A system is a storage layout for `A` plus the right-hand side `b` and the
//! solution `x`. Each layout comes with the solvers that can factor it:
//!
//! | storage | solvers |
//! |---|---|
//! | [`FullGenStorage`] | [`FullGenLu`] |
//! | [`BandSpdStorage`] | [`BandCholesky`] |
//! | [`BandGenStorage`] | [`BandLu`] |
//! | [`ProfileStorage`] | [`ProfileLdl`] |
//! | [`SparseGenStorage`] | [`SparseLu`], [`PcgSolver`] |
//! | [`DiagonalStorage`] | [`DiagonalSolver`] |
//!
//! # Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use sa_soe::{DofGraph, LinearSoe, ProfileSoe};
//!
//! let mut graph = DofGraph::new(2);
//! graph.add_clique(&[Some(0), Some(1)]);
//!
//! let mut soe = ProfileSoe::default();
//! soe.set_size(&graph).unwrap();
//! let k = DMatrix::from_row_slice(2, 2, &[2.0, -1.0, -1.0, 2.0]);
//! soe.add_a(&k, &[Some(0), Some(1)], 1.0).unwrap();
//! soe.set_b(&DVector::from_vec(vec![1.0, 1.0])).unwrap();
//! soe.solve().unwrap();
//! assert!((soe.x()[0] - 1.0).abs() < 1e-12);
//! ```

pub mod band;
pub mod diagonal;
pub mod error;
pub mod full;
pub mod graph;
pub mod profile;
pub mod soe;
pub mod sparse;

pub use band::{BandCholesky, BandGenStorage, BandLu, BandSpdStorage};
pub use diagonal::{DiagonalSolver, DiagonalStorage};
pub use error::{SoeError, SoeResult};
pub use full::{FullGenLu, FullGenStorage};
pub use graph::DofGraph;
pub use profile::{ProfileLdl, ProfileStorage};
pub use soe::{LinearSoe, Soe, Solver, Storage};
pub use sparse::{PcgSolver, SparseGenStorage, SparseLu};

pub type FullGenSoe = Soe<FullGenStorage, FullGenLu>;
pub type BandSpdSoe = Soe<BandSpdStorage, BandCholesky>;
pub type BandGenSoe = Soe<BandGenStorage, BandLu>;
pub type ProfileSoe = Soe<ProfileStorage, ProfileLdl>;
pub type SparseGenSoe = Soe<SparseGenStorage, SparseLu>;
pub type SparsePcgSoe = Soe<SparseGenStorage, PcgSolver>;
pub type DiagonalSoe = Soe<DiagonalStorage, DiagonalSolver>;

impl<St, So> Default for Soe<St, So>
where
    St: Storage + Default,
    So: Solver<St> + Default,
{
    fn default() -> Self {
        Soe::new(St::default(), So::default())
    }
}
