//! Commit collaborator: records a finished task and pushes it.

use std::time::Instant;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::prompt::SlashCommand;
use crate::core::types::ExecutionResult;
use crate::io::config::{CommitMode, LoopConfig};
use crate::exit_codes;
use crate::io::git::{GitRepo, GitTimeout};
use crate::io::process::ProcessRunner;
use crate::io::tasks::agent_invocation;

/// Per-call options for the commit collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    pub skip_permissions: bool,
}

/// Commits and pushes working-tree changes, optionally tagged with a task id.
pub trait Committer {
    fn commit(&self, task_number: Option<&str>, options: &CommitOptions) -> Result<ExecutionResult>;
}

/// Commit message used by the plain-git backend.
pub fn commit_message(task_number: Option<&str>) -> String {
    match task_number {
        Some(task) => format!("Complete task {task}"),
        None => "Complete automated task".to_string(),
    }
}

/// Asks the agent to run `/commit-push [task]`.
pub struct AgentCommitter<'a, P: ProcessRunner> {
    runner: &'a P,
    program: String,
}

impl<'a, P: ProcessRunner> AgentCommitter<'a, P> {
    pub fn new(runner: &'a P, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl<P: ProcessRunner> Committer for AgentCommitter<'_, P> {
    #[instrument(skip_all, fields(program = %self.program, task = ?task_number))]
    fn commit(&self, task_number: Option<&str>, options: &CommitOptions) -> Result<ExecutionResult> {
        let command = SlashCommand::commit_push(task_number);
        self.runner.run(&agent_invocation(
            &self.program,
            options.skip_permissions,
            &command,
        ))
    }
}

/// Stages everything, commits, and pushes with plain `git`.
pub struct GitCommitter {
    repo: GitRepo,
}

impl GitCommitter {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo }
    }

    fn commit_and_push(&self, task_number: Option<&str>) -> Result<String> {
        self.repo.stage_everything()?;
        if !self.repo.commit_index(&commit_message(task_number))? {
            info!("nothing to commit");
            return Ok("nothing to commit".to_string());
        }
        self.repo.push()
    }
}

impl Committer for GitCommitter {
    #[instrument(skip_all, fields(root = %self.repo.root().display(), task = ?task_number))]
    fn commit(&self, task_number: Option<&str>, _options: &CommitOptions) -> Result<ExecutionResult> {
        let start = Instant::now();
        match self.commit_and_push(task_number) {
            Ok(output) => Ok(ExecutionResult::succeeded(output, start.elapsed())),
            Err(err) => {
                warn!(err = %err, "git commit/push failed");
                let code = if err.is::<GitTimeout>() {
                    exit_codes::TIMEOUT
                } else {
                    1
                };
                Ok(ExecutionResult::failed(code, format!("{err:#}"), start.elapsed()))
            }
        }
    }
}

/// Commit backend selected by [`CommitMode`].
pub enum CommitBackend<'a, P: ProcessRunner> {
    Agent(AgentCommitter<'a, P>),
    Git(GitCommitter),
}

impl<'a, P: ProcessRunner> CommitBackend<'a, P> {
    pub fn from_config(runner: &'a P, cfg: &LoopConfig) -> Self {
        match cfg.commit_mode {
            CommitMode::Agent => Self::Agent(AgentCommitter::new(runner, cfg.agent_program.clone())),
            CommitMode::Git => {
                let workdir = cfg.project_dir().unwrap_or_else(|| ".".into());
                Self::Git(GitCommitter::new(GitRepo::open(workdir, cfg.timeout())))
            }
        }
    }
}

impl<P: ProcessRunner> Committer for CommitBackend<'_, P> {
    fn commit(&self, task_number: Option<&str>, options: &CommitOptions) -> Result<ExecutionResult> {
        match self {
            Self::Agent(committer) => committer.commit(task_number, options),
            Self::Git(committer) => committer.commit(task_number, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prompt::SKIP_PERMISSIONS_FLAG;
    use crate::test_support::{ScriptedRunner, init_git_repo};
    use std::fs;
    use std::time::Duration;

    #[test]
    fn messages_mention_task() {
        assert_eq!(commit_message(Some("5")), "Complete task 5");
        assert_eq!(commit_message(None), "Complete automated task");
    }

    #[test]
    fn agent_commit_honours_skip_permissions() {
        let runner = ScriptedRunner::new(vec![
            Ok(ExecutionResult::succeeded("pushed", Duration::ZERO)),
            Ok(ExecutionResult::succeeded("pushed", Duration::ZERO)),
        ]);
        let committer = AgentCommitter::new(&runner, "agent");

        committer
            .commit(Some("5"), &CommitOptions { skip_permissions: true })
            .expect("commit");
        committer
            .commit(None, &CommitOptions { skip_permissions: false })
            .expect("commit");

        let calls = runner.calls();
        assert_eq!(
            calls[0].args,
            vec![
                SKIP_PERMISSIONS_FLAG.to_string(),
                "-p".to_string(),
                "/commit-push 5".to_string()
            ]
        );
        assert_eq!(
            calls[1].args,
            vec!["-p".to_string(), "/commit-push".to_string()]
        );
    }

    #[test]
    fn backend_follows_commit_mode() {
        let runner = ScriptedRunner::new(Vec::new());
        let agent = CommitBackend::from_config(&runner, &LoopConfig::default());
        assert!(matches!(agent, CommitBackend::Agent(_)));

        let cfg = LoopConfig {
            commit_mode: CommitMode::Git,
            ..LoopConfig::default()
        };
        assert!(matches!(
            CommitBackend::from_config(&runner, &cfg),
            CommitBackend::Git(_)
        ));
    }

    #[test]
    fn git_commit_without_changes_is_a_successful_noop() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_git_repo(temp.path());
        let committer = GitCommitter::new(GitRepo::open(temp.path(), Duration::from_secs(30)));

        let result = committer
            .commit(Some("1"), &CommitOptions { skip_permissions: true })
            .expect("commit");
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("nothing to commit"));
    }

    #[test]
    fn git_push_failure_becomes_failed_result() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_git_repo(temp.path());
        fs::write(temp.path().join("done.txt"), "done\n").expect("write");
        let committer = GitCommitter::new(GitRepo::open(temp.path(), Duration::from_secs(30)));

        let result = committer
            .commit(Some("4"), &CommitOptions { skip_permissions: true })
            .expect("commit");
        assert!(!result.success);
        assert!(result.error.expect("error").contains("git push failed"));

        let log = std::process::Command::new("git")
            .args(["log", "-1", "--format=%s"])
            .current_dir(temp.path())
            .output()
            .expect("git log");
        assert_eq!(String::from_utf8_lossy(&log.stdout).trim(), "Complete task 4");
    }

    #[cfg(unix)]
    #[test]
    fn git_timeout_becomes_timeout_result() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        init_git_repo(temp.path());
        let hook = temp.path().join(".git/hooks/pre-commit");
        fs::create_dir_all(hook.parent().expect("hooks dir")).expect("mkdir hooks");
        fs::write(&hook, "#!/bin/sh\nsleep 5\n").expect("write hook");
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).expect("chmod");
        fs::write(temp.path().join("done.txt"), "done\n").expect("write");
        let committer = GitCommitter::new(GitRepo::open(temp.path(), Duration::from_millis(500)));

        let result = committer
            .commit(Some("2"), &CommitOptions { skip_permissions: true })
            .expect("commit");
        assert!(!result.success);
        assert_eq!(result.exit_code, exit_codes::TIMEOUT);
        assert!(result.error.expect("error").contains("timed out"));
        assert!(result.duration < Duration::from_secs(4));
    }
}
