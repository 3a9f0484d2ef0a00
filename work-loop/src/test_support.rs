//! Scripted collaborators and fixtures for tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::types::{
    ExecutionResult, IterationState, QueueStatus, StatusLevel, TaskInfo, TaskStatus,
};
use crate::io::commit::{CommitOptions, Committer};
use crate::io::config::LoopConfig;
use crate::io::process::{Invocation, ProcessRunner};
use crate::io::queue::QueueInspector;
use crate::io::tasks::{TaskExecutor, TaskInspector};
use crate::report::Reporter;

/// Process runner that replays queued results and records every invocation.
///
/// Returns an error once the script is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    results: RefCell<VecDeque<Result<ExecutionResult>>>,
    calls: RefCell<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<Result<ExecutionResult>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        self.calls.borrow_mut().push(invocation.clone());
        self.results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("scripted runner exhausted")))
    }
}

/// Replays responses in order and repeats the last one once exhausted.
///
/// `Err(message)` entries surface as unexpected collaborator errors.
#[derive(Debug)]
struct Script<T: Clone> {
    steps: Vec<Result<T, String>>,
    next: Cell<usize>,
}

impl<T: Clone> Script<T> {
    fn new(steps: Vec<Result<T, String>>) -> Self {
        assert!(!steps.is_empty(), "script needs at least one step");
        Self {
            steps,
            next: Cell::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.next.get()
    }

    fn advance(&self) -> Result<T> {
        let index = self.next.get().min(self.steps.len() - 1);
        self.next.set(self.next.get() + 1);
        self.steps[index].clone().map_err(|message| anyhow!(message))
    }
}

fn ok_steps<T>(steps: Vec<T>) -> Vec<Result<T, String>> {
    steps.into_iter().map(Ok).collect()
}

/// Queue collaborator returning scripted readings.
#[derive(Debug)]
pub struct ScriptedQueue {
    script: Script<QueueStatus>,
}

impl ScriptedQueue {
    pub fn new(readings: Vec<QueueStatus>) -> Self {
        Self {
            script: Script::new(ok_steps(readings)),
        }
    }

    /// Queue that always reports `count` items.
    pub fn constant(count: u32) -> Self {
        Self::new(vec![QueueStatus::counted(count)])
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl QueueInspector for ScriptedQueue {
    fn check(&self) -> QueueStatus {
        // Queue readings are infallible.
        self.script
            .advance()
            .unwrap_or_else(|err| QueueStatus::unavailable(err.to_string()))
    }
}

/// Task-describer collaborator returning scripted classifications.
#[derive(Debug)]
pub struct ScriptedTasks {
    script: Script<TaskInfo>,
}

impl ScriptedTasks {
    pub fn new(infos: Vec<TaskInfo>) -> Self {
        Self {
            script: Script::new(ok_steps(infos)),
        }
    }

    pub fn with_errors(steps: Vec<Result<TaskInfo, String>>) -> Self {
        Self {
            script: Script::new(steps),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl TaskInspector for ScriptedTasks {
    fn next(&self, _cfg: &LoopConfig) -> Result<TaskInfo> {
        self.script.advance()
    }
}

/// Task executor returning scripted results.
#[derive(Debug)]
pub struct ScriptedExecutor {
    script: Script<ExecutionResult>,
}

impl ScriptedExecutor {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            script: Script::new(ok_steps(results)),
        }
    }

    pub fn with_errors(steps: Vec<Result<ExecutionResult, String>>) -> Self {
        Self {
            script: Script::new(steps),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl TaskExecutor for ScriptedExecutor {
    fn run(&self, _cfg: &LoopConfig) -> Result<ExecutionResult> {
        self.script.advance()
    }
}

/// Committer returning scripted results and recording each call's task id.
#[derive(Debug)]
pub struct ScriptedCommitter {
    script: Script<ExecutionResult>,
    calls: RefCell<Vec<(Option<String>, CommitOptions)>>,
}

impl ScriptedCommitter {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            script: Script::new(ok_steps(results)),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Committer that always succeeds.
    pub fn succeeding() -> Self {
        Self::new(vec![exec_ok()])
    }

    /// Task ids passed to each commit call, in order.
    pub fn task_numbers(&self) -> Vec<Option<String>> {
        self.calls.borrow().iter().map(|(task, _)| task.clone()).collect()
    }

    pub fn options(&self) -> Vec<CommitOptions> {
        self.calls.borrow().iter().map(|(_, options)| *options).collect()
    }
}

impl Committer for ScriptedCommitter {
    fn commit(&self, task_number: Option<&str>, options: &CommitOptions) -> Result<ExecutionResult> {
        self.calls
            .borrow_mut()
            .push((task_number.map(str::to_string), *options));
        self.script.advance()
    }
}

/// One event captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    IterationHeader { current: u32, total: u32 },
    Section(String),
    Status(StatusLevel, String),
    IterationSummary { current: u32, success: bool },
}

/// Reporter that records events instead of printing them.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: RefCell<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.borrow().clone()
    }

    /// Messages of every status event at `level`.
    pub fn statuses(&self, level: StatusLevel) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Status(l, message) if *l == level => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sections(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Section(title) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn iteration_header(&self, current: u32, total: u32) {
        self.events
            .borrow_mut()
            .push(ReportEvent::IterationHeader { current, total });
    }

    fn section(&self, title: &str) {
        self.events
            .borrow_mut()
            .push(ReportEvent::Section(title.to_string()));
    }

    fn status(&self, level: StatusLevel, message: &str) {
        self.events
            .borrow_mut()
            .push(ReportEvent::Status(level, message.to_string()));
    }

    fn iteration_summary(&self, iteration: &IterationState) {
        self.events.borrow_mut().push(ReportEvent::IterationSummary {
            current: iteration.current,
            success: iteration.success,
        });
    }
}

/// Task info reporting an available task.
pub fn task_available(number: Option<&str>) -> TaskInfo {
    TaskInfo {
        status: TaskStatus::Available {
            number: number.map(str::to_string),
        },
        output: match number {
            Some(number) => format!("## Next Task: {number}"),
            None => "Next task is ready".to_string(),
        },
    }
}

pub fn task_all_completed() -> TaskInfo {
    TaskInfo {
        status: TaskStatus::AllCompleted,
        output: "All tasks completed!".to_string(),
    }
}

pub fn task_no_files() -> TaskInfo {
    TaskInfo {
        status: TaskStatus::NoTaskFiles,
        output: "No task file found".to_string(),
    }
}

pub fn exec_ok() -> ExecutionResult {
    ExecutionResult::succeeded("done", Duration::from_millis(5))
}

pub fn exec_failed(exit_code: i32) -> ExecutionResult {
    ExecutionResult::failed(exit_code, "agent failed", Duration::from_millis(5))
}

/// Initialize a git repo with a local identity and one commit.
pub fn init_git_repo(root: &Path) {
    let git = |args: &[&str]| {
        let status = Command::new("git")
            .args(args)
            .current_dir(root)
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {} failed", args.join(" "));
    };

    git(&["init"]);
    git(&["config", "user.email", "test@example.com"]);
    git(&["config", "user.name", "test"]);
    git(&["config", "commit.gpgsign", "false"]);
    fs::write(root.join("README.md"), "hi\n").expect("write");
    git(&["add", "README.md"]);
    git(&["commit", "-m", "chore: init"]);
}
