//! sysdyn-common — Shared types and errors used across all sysdyn crates.

pub mod error;
pub mod expr;
pub mod ir;
pub mod names;

// Re-export commonly used types
pub use error::{Result, SdError};
pub use expr::{BinaryOp, Builtin, Expr, UnaryOp};
pub use ir::{ModelIr, SimSpecs, VarKind, Variable};
