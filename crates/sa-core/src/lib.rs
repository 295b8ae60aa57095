//! sa-core: shared foundation for the structural solution engine.
//!
//! Contains:
//! - numeric (Real, finiteness checks, norms over equation vectors)
//! - ids (compact IDs for DOFs and elements)
//! - error (shared error types)
//! - timing (opt-in accumulating timers for assembly and solve)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;

pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
