//! Queue status collaborator backed by the `tfq` CLI.

use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use crate::core::types::{ExecutionResult, QueueStatus};
use crate::io::config::LoopConfig;
use crate::io::process::{Invocation, ProcessRunner};

/// Reports the current size of the external work queue.
///
/// Implementations must not fail: problems are encoded as an unavailable
/// [`QueueStatus`].
pub trait QueueInspector {
    fn check(&self) -> QueueStatus;
}

/// Inspector that runs `<program> count`.
pub struct TfqQueue<'a, P: ProcessRunner> {
    runner: &'a P,
    program: String,
    workdir: Option<PathBuf>,
}

impl<'a, P: ProcessRunner> TfqQueue<'a, P> {
    pub fn new(runner: &'a P, program: impl Into<String>, workdir: Option<PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
            workdir,
        }
    }

    pub fn from_config(runner: &'a P, cfg: &LoopConfig) -> Self {
        Self::new(runner, cfg.queue_program.clone(), cfg.project_dir())
    }

    fn invocation(&self) -> Invocation {
        Invocation::new(self.program.clone())
            .arg("count")
            .current_dir(self.workdir.clone())
    }
}

impl<P: ProcessRunner> QueueInspector for TfqQueue<'_, P> {
    #[instrument(skip_all, fields(program = %self.program))]
    fn check(&self) -> QueueStatus {
        match self.runner.run(&self.invocation()) {
            Ok(result) => {
                let status = parse_queue_result(&result);
                debug!(count = status.count, available = status.available, "queue checked");
                status
            }
            Err(err) => {
                warn!(err = %err, "queue check failed");
                QueueStatus::unavailable(format!("{err:#}"))
            }
        }
    }
}

/// Interpret the result of `tfq count`.
///
/// Empty output counts as an empty queue. Otherwise the leading run of digits
/// is the count (`"3 items"` reads as 3); output that does not start with a
/// digit makes the reading unavailable.
pub fn parse_queue_result(result: &ExecutionResult) -> QueueStatus {
    if !result.success {
        let reason = result
            .error
            .as_deref()
            .filter(|err| !err.is_empty())
            .map_or_else(|| format!("exit code {}", result.exit_code), str::to_string);
        return QueueStatus::unavailable(format!("queue command failed: {reason}"));
    }
    let output = result.output.as_deref().unwrap_or_default().trim();
    if output.is_empty() {
        return QueueStatus::counted(0);
    }
    let digits = output
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();
    match digits.parse::<u32>() {
        Ok(count) => QueueStatus::counted(count),
        Err(_) => QueueStatus::unavailable(format!("invalid queue count output: {output}")),
    }
}
