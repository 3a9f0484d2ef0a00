//! Bounded work loop that drives an external task pipeline.
//!
//! Each pass checks an external work queue, asks the agent whether a next task
//! exists, has the agent perform it, and conditionally commits and pushes the
//! result. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (data contracts, exit-reason
//!   selection, output classification, prompt construction, timers).
//! - **[`io`]**: Side-effecting collaborators (child processes, git, config
//!   files, signals). Each sits behind a trait so tests can script it.
//!
//! [`looping`] composes the collaborators into the iteration controller and
//! [`report`] renders its status narrative.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
