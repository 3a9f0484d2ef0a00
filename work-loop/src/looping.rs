//! Iteration controller for `work-loop`.
//!
//! Each pass runs queue check → task check → execution → conditional commit,
//! and the first pass that hits a halting condition ends the run.

use tracing::{debug, error, info, instrument, warn};

use crate::core::exit::{ExitReason, exit_reason_for};
use crate::core::timer::Timer;
use crate::core::types::{IterationState, LoopResult, StatusLevel};
use crate::io::commit::{CommitOptions, Committer};
use crate::io::config::LoopConfig;
use crate::io::queue::QueueInspector;
use crate::io::signals::InterruptFlag;
use crate::io::tasks::{TaskExecutor, TaskInspector};
use crate::report::Reporter;

const TOTAL_TIMER: &str = "total";

/// Composes the four collaborators into a bounded loop.
///
/// `cfg` must already be validated (`max_iterations` and timeout positive).
pub struct LoopController<'a, Q, T, E, C, R> {
    cfg: &'a LoopConfig,
    queue: &'a Q,
    tasks: &'a T,
    executor: &'a E,
    committer: &'a C,
    reporter: &'a R,
    interrupt: Option<InterruptFlag>,
}

impl<'a, Q, T, E, C, R> LoopController<'a, Q, T, E, C, R>
where
    Q: QueueInspector,
    T: TaskInspector,
    E: TaskExecutor,
    C: Committer,
    R: Reporter,
{
    pub fn new(
        cfg: &'a LoopConfig,
        queue: &'a Q,
        tasks: &'a T,
        executor: &'a E,
        committer: &'a C,
        reporter: &'a R,
    ) -> Self {
        Self {
            cfg,
            queue,
            tasks,
            executor,
            committer,
            reporter,
            interrupt: None,
        }
    }

    /// Stop before the next pass once `flag` is raised.
    pub fn with_interrupt(mut self, flag: InterruptFlag) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(InterruptFlag::is_set)
    }

    /// Run up to `max_iterations` passes and summarize the run.
    #[instrument(skip_all, fields(max_iterations = self.cfg.max_iterations))]
    pub fn execute(&self) -> LoopResult {
        let total = self.cfg.max_iterations;
        let mut timer = Timer::new();
        timer.start(TOTAL_TIMER);

        let mut iterations = Vec::new();
        let mut exit_reason = ExitReason::MaxIterationsReached;
        for current in 1..=total {
            if self.interrupted() {
                self.reporter.status(
                    StatusLevel::Warning,
                    &format!("Interrupted - skipping iteration {current}"),
                );
                exit_reason = ExitReason::UserInterrupted;
                break;
            }

            self.reporter.iteration_header(current, total);
            let iteration = match self.run_pass(&mut timer, current) {
                Ok(iteration) => iteration,
                Err(err) => {
                    error!(iteration = current, err = %format!("{err:#}"), "pass aborted");
                    self.reporter
                        .status(StatusLevel::Error, &format!("Unexpected error: {err:#}"));
                    exit_reason = ExitReason::ExecutionError;
                    break;
                }
            };

            let halt = exit_reason_for(&iteration);
            self.reporter.iteration_summary(&iteration);
            iterations.push(iteration);
            if let Some(reason) = halt {
                debug!(iteration = current, reason = ?reason, "halting");
                exit_reason = reason;
                break;
            }
        }

        if exit_reason == ExitReason::MaxIterationsReached && self.interrupted() {
            exit_reason = ExitReason::UserInterrupted;
        }

        // The total stopwatch is started above, so stop cannot miss.
        let total_duration = timer.stop(TOTAL_TIMER).unwrap_or_default();
        let result = LoopResult::new(exit_reason, total_duration, iterations);
        info!(
            exit_reason = ?result.exit_reason,
            exit_code = result.exit_code,
            completed = result.completed_iterations,
            passes = result.iterations.len(),
            "loop finished"
        );
        result
    }

    fn run_pass(&self, timer: &mut Timer, current: u32) -> anyhow::Result<IterationState> {
        let timer_id = format!("iteration-{current}");
        timer.start(&timer_id);
        let mut iteration = IterationState::new(current, self.cfg.max_iterations);
        if let Err(err) = self.run_steps(&mut iteration) {
            timer.clear(&timer_id);
            return Err(err);
        }
        iteration.duration = timer.stop(&timer_id)?;
        Ok(iteration)
    }

    /// Fill `iteration` step by step, returning early on any short-circuit.
    fn run_steps(&self, iteration: &mut IterationState) -> anyhow::Result<()> {
        let reporter = self.reporter;

        reporter.section("Queue Status Check");
        reporter.status(StatusLevel::Running, "Checking work queue...");
        let queue_status = self.queue.check();
        let queue_has_items = queue_status.has_items();
        if !queue_status.available {
            warn!(error = ?queue_status.error, "queue status unavailable");
            reporter.status(
                StatusLevel::Warning,
                "Could not check queue status (command may not be available)",
            );
        } else if queue_has_items {
            reporter.status(
                StatusLevel::Error,
                &format!("Queue has {} items - HALTING", queue_status.count),
            );
        } else {
            reporter.status(
                StatusLevel::Success,
                &format!("Queue is empty ({} items)", queue_status.count),
            );
        }
        iteration.queue_status = Some(queue_status);
        if queue_has_items {
            return Ok(());
        }

        reporter.section("Task Availability Check");
        reporter.status(StatusLevel::Running, "Checking for available tasks...");
        let task_info = self.tasks.next(self.cfg)?;
        if task_info.all_completed() {
            reporter.status(StatusLevel::Success, "All tasks completed!");
            iteration.task_info = Some(task_info);
            return Ok(());
        }
        if task_info.no_task_files() {
            reporter.status(StatusLevel::Error, "No task files found");
            iteration.task_info = Some(task_info);
            return Ok(());
        }
        match task_info.number() {
            Some(number) => {
                reporter.status(StatusLevel::Success, &format!("Found task number: {number}"));
                iteration.task_number = Some(number.to_string());
            }
            None => reporter.status(
                StatusLevel::Warning,
                "Could not extract task number from output",
            ),
        }
        reporter.status(StatusLevel::Success, "Tasks available - proceeding to execution");
        iteration.task_info = Some(task_info);

        reporter.section("Task Execution");
        reporter.status(StatusLevel::Running, "Executing work-next-task command...");
        let execution = self.executor.run(self.cfg)?;
        let executed = execution.success;
        if executed {
            reporter.status(StatusLevel::Success, "work-next-task completed successfully");
        } else {
            reporter.status(
                StatusLevel::Error,
                &format!("Task execution failed (exit code: {})", execution.exit_code),
            );
            reporter.status(StatusLevel::Warning, "Continuing to next iteration...");
        }
        iteration.execution_result = Some(execution);
        if !executed {
            return Ok(());
        }

        iteration.success = true;
        self.commit_if_clean(iteration)
    }

    /// Re-check the queue and commit only when it is still empty.
    fn commit_if_clean(&self, iteration: &mut IterationState) -> anyhow::Result<()> {
        let reporter = self.reporter;
        if !self.cfg.auto_commit {
            reporter.status(StatusLevel::Info, "Auto-commit disabled - skipping commit");
            return Ok(());
        }

        reporter.section("Post-Execution Queue Check");
        reporter.status(
            StatusLevel::Running,
            "Checking queue status after execution...",
        );
        let post = self.queue.check();
        let clean = post.is_empty();
        if !post.available {
            reporter.status(
                StatusLevel::Warning,
                "Could not check queue status after execution",
            );
        } else if clean {
            reporter.status(
                StatusLevel::Success,
                &format!("Queue still empty ({} items)", post.count),
            );
        } else {
            reporter.status(
                StatusLevel::Error,
                &format!("Queue now has {} items - skipping commit", post.count),
            );
        }
        iteration.post_queue_status = Some(post);
        if !clean {
            return Ok(());
        }

        reporter.section("Auto-Commit & Push");
        reporter.status(
            StatusLevel::Running,
            "Queue empty - committing and pushing changes...",
        );
        match &iteration.task_number {
            Some(number) => reporter.status(
                StatusLevel::Info,
                &format!("Committing with task number: {number}"),
            ),
            None => reporter.status(StatusLevel::Info, "Committing without specific task number"),
        }
        let options = CommitOptions {
            skip_permissions: self.cfg.skip_permissions,
        };
        let commit = self
            .committer
            .commit(iteration.task_number.as_deref(), &options)?;
        if commit.success {
            reporter.status(StatusLevel::Success, "Successfully committed and pushed changes");
        } else {
            warn!(exit_code = commit.exit_code, error = ?commit.error, "commit failed");
            reporter.status(
                StatusLevel::Error,
                &format!("Commit/push failed (exit code: {})", commit.exit_code),
            );
        }
        iteration.commit_result = Some(commit);
        Ok(())
    }
}
