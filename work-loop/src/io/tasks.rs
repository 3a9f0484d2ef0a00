//! Task info and task execution collaborators backed by the agent CLI.
//!
//! The [`TaskInspector`] and [`TaskExecutor`] traits decouple the loop from the
//! agent backend. Tests use scripted implementations that return predetermined
//! results without spawning processes.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::classify_task_output;
use crate::core::prompt::{SlashCommand, agent_args};
use crate::core::types::{ExecutionResult, TaskInfo};
use crate::io::config::LoopConfig;
use crate::io::process::{Invocation, ProcessRunner};

/// Reports whether a next task exists.
pub trait TaskInspector {
    fn next(&self, cfg: &LoopConfig) -> Result<TaskInfo>;
}

/// Runs one task to completion.
pub trait TaskExecutor {
    fn run(&self, cfg: &LoopConfig) -> Result<ExecutionResult>;
}

/// Build the invocation for one agent slash command.
pub fn agent_invocation(program: &str, skip_permissions: bool, command: &SlashCommand) -> Invocation {
    Invocation::new(program).args(agent_args(skip_permissions, command))
}

/// Drives `/show-next-task` and `/work-next-task` through the agent CLI.
pub struct AgentTasks<'a, P: ProcessRunner> {
    runner: &'a P,
    program: String,
}

impl<'a, P: ProcessRunner> AgentTasks<'a, P> {
    pub fn new(runner: &'a P, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub fn from_config(runner: &'a P, cfg: &LoopConfig) -> Self {
        Self::new(runner, cfg.agent_program.clone())
    }
}

impl<P: ProcessRunner> TaskInspector for AgentTasks<'_, P> {
    #[instrument(skip_all, fields(program = %self.program))]
    fn next(&self, cfg: &LoopConfig) -> Result<TaskInfo> {
        let command = SlashCommand::show_next_task(
            cfg.task_number.as_deref(),
            cfg.tasks_directory.as_deref(),
        );
        let result = self
            .runner
            .run(&agent_invocation(&self.program, cfg.skip_permissions, &command))?;
        if !result.success {
            // The output is still classified; sentinels may appear on failure.
            warn!(exit_code = result.exit_code, "show-next-task exited unsuccessfully");
        }
        let info = classify_task_output(result.output.as_deref().unwrap_or_default());
        debug!(status = ?info.status, "task info classified");
        Ok(info)
    }
}

impl<P: ProcessRunner> TaskExecutor for AgentTasks<'_, P> {
    #[instrument(skip_all, fields(program = %self.program))]
    fn run(&self, cfg: &LoopConfig) -> Result<ExecutionResult> {
        let command = SlashCommand::work_next_task(
            cfg.task_number.as_deref(),
            cfg.tasks_directory.as_deref(),
            cfg.project_directory.as_deref(),
        );
        info!(prompt = %command.render(), "starting task execution");
        let result = self
            .runner
            .run(&agent_invocation(&self.program, cfg.skip_permissions, &command))?;
        debug!(
            success = result.success,
            exit_code = result.exit_code,
            duration_ms = result.duration.as_millis() as u64,
            "task execution finished"
        );
        Ok(result)
    }
}
