//! sysdyn-engine — Dependency analysis, expression evaluation and
//! fixed-step integration of a parsed model.

pub mod compile;
pub mod eval;
pub mod integrate;
pub mod results;

pub use compile::{compile, CompiledModel};
pub use integrate::{run, Method};
pub use results::SimulationResults;
