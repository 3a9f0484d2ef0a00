//! Deterministic, pure logic shared by the loop.
//!
//! Core modules must be free of process and filesystem side effects. They
//! operate on in-memory data and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod exit;
pub mod prompt;
pub mod timer;
pub mod types;
