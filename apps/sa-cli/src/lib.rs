//! Command-line front end: YAML spring models in, JSON histories out.

pub mod error;
pub mod schema;
