//! sysdyn-convert — Source-to-source conversion of a compiled model into a
//! self-contained Python script.

pub mod python;

pub use python::generate_python;
