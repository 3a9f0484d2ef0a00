//! Bounded task automation loop.
//!
//! Checks the work queue, asks the agent for the next task, has it do the
//! work, and commits the result, until a halting condition or the iteration
//! limit is reached.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::debug;

use work_loop::core::exit::ExitReason;
use work_loop::exit_codes;
use work_loop::io::commit::CommitBackend;
use work_loop::io::config::{CliOverrides, ConfigError, resolve_config};
use work_loop::io::process::SystemRunner;
use work_loop::io::queue::TfqQueue;
use work_loop::io::run_report::write_run_report;
use work_loop::io::signals;
use work_loop::io::tasks::AgentTasks;
use work_loop::logging;
use work_loop::looping::LoopController;
use work_loop::report::ConsoleReporter;

#[derive(Debug, Parser)]
#[command(
    name = "work-loop",
    version,
    about = "Repeatedly check the work queue, run the next task with the agent, and commit the result"
)]
struct Cli {
    /// Work on this task instead of the next one.
    task_number: Option<String>,

    /// Directory containing the task files.
    #[arg(short = 'd', long = "tasks-dir", value_name = "DIR")]
    tasks_dir: Option<String>,

    /// Project directory the agent works in.
    #[arg(short = 'p', long = "project-dir", value_name = "DIR")]
    project_dir: Option<String>,

    /// Maximum number of loop passes [default: 20].
    #[arg(short = 'i', long, value_name = "N")]
    iterations: Option<u32>,

    /// Per-command timeout in milliseconds [default: 120000].
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Do not commit and push after successful tasks.
    #[arg(long)]
    no_auto_commit: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Let the agent ask for permissions interactively.
    #[arg(long)]
    no_skip_permissions: bool,

    /// TOML config file applied below CLI flags and environment variables.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the run summary as JSON to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            task_number: self.task_number.clone(),
            tasks_directory: self.tasks_dir.clone(),
            project_directory: self.project_dir.clone(),
            max_iterations: self.iterations,
            timeout_ms: self.timeout,
            no_auto_commit: self.no_auto_commit,
            verbose: self.verbose,
            no_skip_permissions: self.no_skip_permissions,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) if err.downcast_ref::<ConfigError>().is_some() => {
            eprintln!("{} {err:#}", "Configuration Error:".red().bold());
            ExitReason::ConfigError.exit_code()
        }
        Err(err) => {
            eprintln!("{} {err:#}", "Error:".red().bold());
            exit_codes::EXECUTION_ERROR
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref(), &cli.overrides(), |key| {
        env::var(key).ok()
    })?;
    logging::init(cfg.verbose);
    debug!(?cfg, "configuration resolved");

    let interrupt = signals::install()?;
    let runner = SystemRunner::new(cfg.timeout(), cfg.output_limit_bytes);
    let queue = TfqQueue::from_config(&runner, &cfg);
    let tasks = AgentTasks::from_config(&runner, &cfg);
    let committer = CommitBackend::from_config(&runner, &cfg);
    let reporter = ConsoleReporter::new(cfg.queue_program.clone());

    reporter.startup_summary(&cfg);
    let result = LoopController::new(&cfg, &queue, &tasks, &tasks, &committer, &reporter)
        .with_interrupt(interrupt)
        .execute();
    reporter.final_summary(&result);

    if let Some(path) = &cli.report {
        write_run_report(path, &result).context("write run report")?;
    }
    Ok(result.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["work-loop"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.task_number, None);
        assert_eq!(overrides.max_iterations, None);
        assert!(!overrides.no_auto_commit);
        assert!(!overrides.no_skip_permissions);
        assert!(cli.config.is_none());
        assert!(cli.report.is_none());
    }

    #[test]
    fn parse_all_flags() {
        let cli = Cli::parse_from([
            "work-loop",
            "7",
            "-d",
            "docs/tasks",
            "--project-dir",
            "/srv/app",
            "-i",
            "5",
            "--timeout",
            "30000",
            "--no-auto-commit",
            "--verbose",
            "--no-skip-permissions",
            "--report",
            "out/run.json",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.task_number.as_deref(), Some("7"));
        assert_eq!(overrides.tasks_directory.as_deref(), Some("docs/tasks"));
        assert_eq!(overrides.project_directory.as_deref(), Some("/srv/app"));
        assert_eq!(overrides.max_iterations, Some(5));
        assert_eq!(overrides.timeout_ms, Some(30_000));
        assert!(overrides.no_auto_commit);
        assert!(overrides.verbose);
        assert!(overrides.no_skip_permissions);
        assert_eq!(cli.report, Some(PathBuf::from("out/run.json")));
    }

    #[test]
    fn rejects_non_numeric_iterations() {
        assert!(Cli::try_parse_from(["work-loop", "--iterations", "many"]).is_err());
    }
}
