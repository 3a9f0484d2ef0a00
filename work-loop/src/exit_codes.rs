//! Stable exit codes for the `work-loop` binary.

/// Loop ended because all tasks completed or the queue gated further work.
pub const SUCCESS: i32 = 0;
/// Invalid configuration, or no task source exists.
pub const CONFIG_ERROR: i32 = 1;
/// Iteration budget exhausted or an unexpected error ended the loop.
pub const EXECUTION_ERROR: i32 = 2;
/// Conventional exit code reported for a command that hit its timeout.
pub const TIMEOUT: i32 = 124;
/// Interrupted or terminated by a signal.
pub const INTERRUPTED: i32 = 130;
