//! Side-effecting collaborators used by the loop.

pub mod commit;
pub mod config;
pub mod git;
pub mod process;
pub mod queue;
pub mod run_report;
pub mod signals;
pub mod tasks;
