//! Reporting sink for the loop's status narrative.
//!
//! The controller emits events through [`Reporter`]; [`ConsoleReporter`]
//! renders them to stdout. Layout helpers are pure so they can be tested
//! without a terminal.

use chrono::Local;
use colored::{ColoredString, Colorize};

use crate::core::exit::ExitReason;
use crate::core::timer::format_duration;
use crate::core::types::{IterationState, LoopResult, StatusLevel};
use crate::io::config::LoopConfig;

/// Width of box headers and separators, in characters.
pub const WIDTH: usize = 60;

/// Events emitted by the iteration controller. Fire-and-forget.
pub trait Reporter {
    fn iteration_header(&self, current: u32, total: u32);
    fn section(&self, title: &str);
    fn status(&self, level: StatusLevel, message: &str);
    fn iteration_summary(&self, iteration: &IterationState);
}

/// Icon printed in front of a status line.
pub fn icon(level: StatusLevel) -> &'static str {
    match level {
        StatusLevel::Success => "✓",
        StatusLevel::Error => "✗",
        StatusLevel::Warning => "⚠",
        StatusLevel::Info => "ℹ",
        StatusLevel::Running => "⏳",
        StatusLevel::Complete => "✅",
        StatusLevel::Failed => "❌",
    }
}

/// Left and right padding that centers `title` inside a box of `width`.
fn padding(title: &str, width: usize) -> (usize, usize) {
    let inner = width.saturating_sub(2);
    let len = title.chars().count();
    let left = inner.saturating_sub(len) / 2;
    (left, inner.saturating_sub(len + left))
}

/// Top, middle and bottom lines of a box header, without color.
pub fn box_lines(title: &str, width: usize) -> [String; 3] {
    let inner = width.saturating_sub(2);
    let (left, right) = padding(title, width);
    [
        format!("┌{}┐", "─".repeat(inner)),
        format!("│{}{title}{}│", " ".repeat(left), " ".repeat(right)),
        format!("└{}┘", "─".repeat(inner)),
    ]
}

/// Final-summary status line for an exit reason.
pub fn exit_reason_line(reason: ExitReason) -> (StatusLevel, String) {
    let level = match reason {
        ExitReason::AllTasksCompleted => StatusLevel::Success,
        ExitReason::QueueNotEmpty
        | ExitReason::MaxIterationsReached
        | ExitReason::UserInterrupted => StatusLevel::Warning,
        ExitReason::NoTaskFiles | ExitReason::ConfigError | ExitReason::ExecutionError => {
            StatusLevel::Error
        }
    };
    (level, reason.to_string())
}

fn render_box(title: &str, paint: fn(&str) -> ColoredString) -> String {
    let [top, _, bottom] = box_lines(title, WIDTH);
    let (left, right) = padding(title, WIDTH);
    format!(
        "{}\n{}{}{}{}{}\n{}",
        paint(&top),
        paint("│"),
        " ".repeat(left),
        title.bold().white(),
        " ".repeat(right),
        paint("│"),
        paint(&bottom)
    )
}

fn render_status(level: StatusLevel, message: &str) -> String {
    let icon = icon(level);
    let icon = match level {
        StatusLevel::Success | StatusLevel::Complete => icon.green(),
        StatusLevel::Error | StatusLevel::Failed => icon.red(),
        StatusLevel::Warning | StatusLevel::Running => icon.yellow(),
        StatusLevel::Info => icon.blue(),
    };
    format!("  {icon} {message}")
}

fn separator() -> ColoredString {
    "─".repeat(WIDTH).dimmed()
}

fn highlight(text: &str) -> ColoredString {
    text.magenta()
}

/// Colored stdout reporter.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    queue_program: String,
}

impl ConsoleReporter {
    pub fn new(queue_program: impl Into<String>) -> Self {
        Self {
            queue_program: queue_program.into(),
        }
    }

    fn info(&self, message: &str) {
        println!("{}", render_status(StatusLevel::Info, message));
    }

    /// Banner plus the resolved configuration and process flow.
    pub fn startup_summary(&self, cfg: &LoopConfig) {
        println!("{}", render_box("TASK AUTOMATION LOOP", |s| s.cyan()));

        println!("\n{}", "Configuration:".bold());
        self.info(&format!(
            "Max iterations: {}",
            highlight(&cfg.max_iterations.to_string())
        ));
        if let Some(task) = &cfg.task_number {
            self.info(&format!("Target task: {}", highlight(task)));
        }
        if let Some(dir) = &cfg.tasks_directory {
            self.info(&format!("Tasks directory: {}", highlight(dir)));
        }
        if let Some(dir) = &cfg.project_directory {
            self.info(&format!("Project directory: {}", highlight(dir)));
        }
        self.info(&format!(
            "Timeout: {}",
            highlight(&format_duration(cfg.timeout()))
        ));
        if !cfg.auto_commit {
            self.info("Auto-commit disabled");
        }

        println!("\n{}", "Process Flow:".bold());
        self.info("Check work queue status");
        self.info("Verify task availability");
        self.info("Execute work-next-task");
        self.info("Auto-commit on success (if queue empty)");

        println!("\n{}", separator());
    }

    /// Banner, counters, exit reason and next steps.
    pub fn final_summary(&self, result: &LoopResult) {
        println!("\n{}", render_box("LOOP COMPLETED", |s| s.cyan()));

        println!("\n{}", "Summary:".bold());
        self.info(&format!(
            "Completed iterations: {}",
            highlight(&result.completed_iterations.to_string())
        ));
        self.info(&format!(
            "Total runtime: {}",
            highlight(&format_duration(result.total_duration))
        ));
        if let Some(average) = result.average_duration() {
            self.info(&format!(
                "Average per iteration: {}",
                highlight(&format_duration(average))
            ));
        }

        println!("\n{}", "Status:".bold());
        let (level, message) = exit_reason_line(result.exit_reason);
        println!("{}", render_status(level, &message));
        if result.exit_reason == ExitReason::MaxIterationsReached {
            self.info("Some tasks may remain unfinished");
        }

        println!("\n{}", "Next Steps:".bold());
        self.info(&format!(
            "Check task status manually with: {}",
            highlight("/show-next-task")
        ));
        self.info(&format!(
            "Check the queue with: {}",
            highlight(&format!("{} list", self.queue_program))
        ));

        println!("\n{}", separator());
        let finished = Local::now().format("%Y-%m-%d %H:%M:%S");
        println!("{}", format!("Run completed at {finished}").dimmed());
    }
}

impl Reporter for ConsoleReporter {
    fn iteration_header(&self, current: u32, total: u32) {
        println!(
            "\n{}",
            render_box(&format!("ITERATION {current}/{total}"), |s| s.magenta())
        );
    }

    fn section(&self, title: &str) {
        println!("\n{}", format!("▶ {title}").bold().blue());
    }

    fn status(&self, level: StatusLevel, message: &str) {
        println!("{}", render_status(level, message));
    }

    fn iteration_summary(&self, iteration: &IterationState) {
        println!("\n{}", separator());
        let message = format!(
            "Iteration {} completed in {}",
            highlight(&iteration.current.to_string()),
            highlight(&format_duration(iteration.duration))
        );
        println!("{}", render_status(StatusLevel::Success, &message));
    }
}
