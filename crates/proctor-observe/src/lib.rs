//! Observability wiring shared by the proctor binaries.

pub mod tracing_setup;
