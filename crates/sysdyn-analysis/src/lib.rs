//! sysdyn-analysis — Causal structure extraction: the signed dependency
//! graph, feedback-loop enumeration and the model structure report.

pub mod graph;
pub mod loops;
pub mod report;

pub use graph::{CausalGraph, Polarity};
pub use loops::{find_loops, FeedbackLoop, LoopPolarity};
pub use report::{structure_report, StructureReport};
