//! Logging setup shared by the demo binaries and their tests.

pub mod tracing;
