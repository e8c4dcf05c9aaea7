//! Initialization logic for logging that is shared between the binaries and
//! the tests.

pub mod tracing;
