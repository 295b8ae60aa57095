//! Elements used by tests, demos and the CLI.

mod dashpot;
mod mass;
mod spring;

pub use dashpot::Dashpot;
pub use mass::LumpedMass;
pub use spring::{Spring, SpringLaw};
