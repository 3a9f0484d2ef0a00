//! Terminal classification of a loop run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::{IterationState, QueueStatus};
use crate::exit_codes;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    AllTasksCompleted,
    QueueNotEmpty,
    NoTaskFiles,
    MaxIterationsReached,
    UserInterrupted,
    ConfigError,
    ExecutionError,
}

impl ExitReason {
    /// Process exit code for this reason.
    ///
    /// Exhausting the iteration budget reports an execution error even when
    /// every pass succeeded.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitReason::AllTasksCompleted | ExitReason::QueueNotEmpty => exit_codes::SUCCESS,
            ExitReason::NoTaskFiles | ExitReason::ConfigError => exit_codes::CONFIG_ERROR,
            ExitReason::UserInterrupted => exit_codes::INTERRUPTED,
            ExitReason::MaxIterationsReached | ExitReason::ExecutionError => {
                exit_codes::EXECUTION_ERROR
            }
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExitReason::AllTasksCompleted => "All tasks successfully completed",
            ExitReason::QueueNotEmpty => "Stopped due to queue items",
            ExitReason::NoTaskFiles => "No task files available",
            ExitReason::MaxIterationsReached => "Reached maximum iteration limit",
            ExitReason::UserInterrupted => "Process interrupted by user",
            ExitReason::ConfigError => "Configuration error",
            ExitReason::ExecutionError => "Execution error occurred",
        };
        f.write_str(text)
    }
}

/// Decide whether a finished pass halts the loop, and why.
///
/// Only fields recorded on `iteration` are consulted, in strict priority order:
/// a non-empty queue reading, then task completion, then a missing task source.
/// `None` means the loop continues.
pub fn exit_reason_for(iteration: &IterationState) -> Option<ExitReason> {
    if iteration
        .queue_status
        .as_ref()
        .is_some_and(QueueStatus::has_items)
    {
        return Some(ExitReason::QueueNotEmpty);
    }
    let info = iteration.task_info.as_ref()?;
    if info.all_completed() {
        return Some(ExitReason::AllTasksCompleted);
    }
    if info.no_task_files() {
        return Some(ExitReason::NoTaskFiles);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{TaskInfo, TaskStatus};

    fn task_info(status: TaskStatus) -> TaskInfo {
        TaskInfo {
            status,
            output: String::new(),
        }
    }

    #[test]
    fn exit_code_table() {
        let table = [
            (ExitReason::AllTasksCompleted, 0),
            (ExitReason::QueueNotEmpty, 0),
            (ExitReason::NoTaskFiles, 1),
            (ExitReason::ConfigError, 1),
            (ExitReason::UserInterrupted, 130),
            (ExitReason::MaxIterationsReached, 2),
            (ExitReason::ExecutionError, 2),
        ];
        for (reason, code) in table {
            assert_eq!(reason.exit_code(), code, "{reason:?}");
        }
    }

    #[test]
    fn empty_iteration_continues() {
        assert_eq!(exit_reason_for(&IterationState::new(1, 5)), None);
    }

    #[test]
    fn unavailable_queue_does_not_halt() {
        let mut iteration = IterationState::new(1, 5);
        iteration.queue_status = Some(QueueStatus::unavailable("missing tfq"));
        assert_eq!(exit_reason_for(&iteration), None);
    }

    #[test]
    fn queue_items_take_priority_over_task_info() {
        let mut iteration = IterationState::new(1, 5);
        iteration.queue_status = Some(QueueStatus::counted(3));
        iteration.task_info = Some(task_info(TaskStatus::AllCompleted));
        assert_eq!(exit_reason_for(&iteration), Some(ExitReason::QueueNotEmpty));
    }

    #[test]
    fn task_completion_and_missing_source_halt() {
        let mut iteration = IterationState::new(1, 5);
        iteration.queue_status = Some(QueueStatus::counted(0));

        iteration.task_info = Some(task_info(TaskStatus::AllCompleted));
        assert_eq!(
            exit_reason_for(&iteration),
            Some(ExitReason::AllTasksCompleted)
        );

        iteration.task_info = Some(task_info(TaskStatus::NoTaskFiles));
        assert_eq!(exit_reason_for(&iteration), Some(ExitReason::NoTaskFiles));

        iteration.task_info = Some(task_info(TaskStatus::Available { number: None }));
        assert_eq!(exit_reason_for(&iteration), None);
    }

    #[test]
    fn post_execution_queue_reading_is_ignored() {
        let mut iteration = IterationState::new(1, 5);
        iteration.queue_status = Some(QueueStatus::counted(0));
        iteration.post_queue_status = Some(QueueStatus::counted(4));
        assert_eq!(exit_reason_for(&iteration), None);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ExitReason::MaxIterationsReached).expect("json");
        assert_eq!(json, "\"max_iterations_reached\"");
    }
}
