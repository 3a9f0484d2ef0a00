//! Slash-command prompts for the agent CLI.
//!
//! A command is built from a name plus ordered argument tokens and rendered
//! into a single prompt string. The prompt travels to the agent as one argv
//! token, so no shell quoting is involved; only the slash-command argument
//! syntax is applied here.

use std::borrow::Cow;

/// Flag that lets the agent run without interactive permission prompts.
pub const SKIP_PERMISSIONS_FLAG: &str = "--dangerously-skip-permissions";

pub const SHOW_NEXT_TASK: &str = "show-next-task";
pub const WORK_NEXT_TASK: &str = "work-next-task";
pub const COMMIT_PUSH: &str = "commit-push";

/// Agent slash command with its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    name: &'static str,
    args: Vec<String>,
}

impl SlashCommand {
    pub fn new(name: &'static str, args: Vec<String>) -> Self {
        Self { name, args }
    }

    /// `/show-next-task [task] [tasks-dir]`, omitting absent values.
    pub fn show_next_task(task_number: Option<&str>, tasks_directory: Option<&str>) -> Self {
        let args = [task_number, tasks_directory]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        Self::new(SHOW_NEXT_TASK, args)
    }

    /// `/work-next-task [task] [tasks-dir] [project-dir]`.
    ///
    /// Arguments are positional: an absent value is sent as an empty placeholder
    /// when a later position is present, and dropped otherwise.
    pub fn work_next_task(
        task_number: Option<&str>,
        tasks_directory: Option<&str>,
        project_directory: Option<&str>,
    ) -> Self {
        let positions = [task_number, tasks_directory, project_directory];
        let used = positions
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1);
        let args = positions[..used]
            .iter()
            .map(|value| value.unwrap_or_default().to_string())
            .collect();
        Self::new(WORK_NEXT_TASK, args)
    }

    /// `/commit-push [task]`.
    pub fn commit_push(task_number: Option<&str>) -> Self {
        Self::new(
            COMMIT_PUSH,
            task_number.into_iter().map(str::to_string).collect(),
        )
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Render as `/name arg ...`.
    pub fn render(&self) -> String {
        let mut buf = format!("/{}", self.name);
        for arg in &self.args {
            buf.push(' ');
            buf.push_str(&quote_arg(arg));
        }
        buf
    }
}

/// Argument tokens for one agent invocation in print mode.
pub fn agent_args(skip_permissions: bool, command: &SlashCommand) -> Vec<String> {
    let mut args = Vec::with_capacity(3);
    if skip_permissions {
        args.push(SKIP_PERMISSIONS_FLAG.to_string());
    }
    args.push("-p".to_string());
    args.push(command.render());
    args
}

fn quote_arg(arg: &str) -> Cow<'_, str> {
    let needs_quotes = arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"');
    if !needs_quotes {
        return Cow::Borrowed(arg);
    }
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    Cow::Owned(format!("\"{escaped}\""))
}
