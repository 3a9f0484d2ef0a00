//! Data contracts between the iteration controller and its collaborators.
//!
//! Collaborators produce these values fresh on every call; the controller
//! records them on the current [`IterationState`] and never mutates them after.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::exit::ExitReason;

/// One reading of the external work queue.
///
/// `count >= 0` with `available = true` is a trustworthy reading. A queue that
/// could not be inspected reports `count = -1` and `available = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub count: i64,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueStatus {
    pub fn counted(count: u32) -> Self {
        Self {
            count: i64::from(count),
            available: true,
            error: None,
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            count: -1,
            available: false,
            error: Some(error.into()),
        }
    }

    /// True when the reading is trustworthy and shows pending items.
    pub fn has_items(&self) -> bool {
        self.available && self.count > 0
    }

    /// True when the reading is trustworthy and the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.available && self.count == 0
    }
}

/// What the task describer reported about the next task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskStatus {
    /// A task is ready, optionally with an identifier extracted from the output.
    Available {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        number: Option<String>,
    },
    /// Every task in the task source is done.
    AllCompleted,
    /// There is no task source at all.
    NoTaskFiles,
}

/// Classified task-describer response plus the raw output for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub status: TaskStatus,
    pub output: String,
}

impl TaskInfo {
    pub fn all_completed(&self) -> bool {
        self.status == TaskStatus::AllCompleted
    }

    pub fn no_task_files(&self) -> bool {
        self.status == TaskStatus::NoTaskFiles
    }

    /// Task identifier, when one was extracted.
    pub fn number(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Available { number } => number.as_deref(),
            TaskStatus::AllCompleted | TaskStatus::NoTaskFiles => None,
        }
    }
}

/// Outcome of one external command run by the task executor or the committer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "duration_ms", with = "millis")]
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn succeeded(output: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: true,
            exit_code: 0,
            output: Some(output.into()),
            error: None,
            duration,
        }
    }

    pub fn failed(exit_code: i32, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            exit_code,
            output: None,
            error: Some(error.into()),
            duration,
        }
    }
}

/// Severity of a status line emitted to the reporting sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
    Running,
    Complete,
    Failed,
}

/// Everything observed during a single loop pass.
///
/// Mutated only by the controller while the pass runs; immutable once appended
/// to the run's iteration list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationState {
    /// Pass index (1-indexed).
    pub current: u32,
    /// Configured iteration budget.
    pub total: u32,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", with = "millis")]
    pub duration: Duration,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_status: Option<QueueStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_info: Option<TaskInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<ExecutionResult>,
    /// Queue reading taken after a successful execution, before committing.
    /// Diagnostic only: exit-reason selection never looks at it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_queue_status: Option<QueueStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_result: Option<ExecutionResult>,
}

impl IterationState {
    pub fn new(current: u32, total: u32) -> Self {
        Self {
            current,
            total,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            success: false,
            task_number: None,
            queue_status: None,
            task_info: None,
            execution_result: None,
            post_queue_status: None,
            commit_result: None,
        }
    }
}

/// Final, immutable summary of one controller run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopResult {
    pub exit_code: i32,
    pub completed_iterations: u32,
    #[serde(rename = "total_duration_ms", with = "millis")]
    pub total_duration: Duration,
    pub exit_reason: ExitReason,
    pub iterations: Vec<IterationState>,
}

impl LoopResult {
    /// Build the summary, deriving the exit code and the successful-pass count.
    pub fn new(
        exit_reason: ExitReason,
        total_duration: Duration,
        iterations: Vec<IterationState>,
    ) -> Self {
        let completed = iterations.iter().filter(|it| it.success).count();
        Self {
            exit_code: exit_reason.exit_code(),
            completed_iterations: u32::try_from(completed).unwrap_or(u32::MAX),
            total_duration,
            exit_reason,
            iterations,
        }
    }

    /// Total runtime divided by successful passes, if there were any.
    pub fn average_duration(&self) -> Option<Duration> {
        if self.completed_iterations == 0 {
            return None;
        }
        Some(self.total_duration / self.completed_iterations)
    }
}

/// Serialize a [`Duration`] as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
