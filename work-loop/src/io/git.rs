//! Plain `git` backend for the commit collaborator.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::io::process::run_command_with_timeout;

const GIT_OUTPUT_LIMIT: usize = 256 * 1024;

/// A git subcommand was killed after overrunning its timeout.
#[derive(Debug, Error)]
#[error("git {command} timed out after {}ms", timeout.as_millis())]
pub struct GitTimeout {
    pub command: String,
    pub timeout: Duration,
}

/// A repository working tree driven through `git` subprocesses.
///
/// Every subcommand runs with stdin closed, terminal prompts disabled, and
/// the same per-command timeout as the rest of the loop.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
    timeout: Duration,
}

impl GitRepo {
    pub fn open(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `git add -A`.
    pub fn stage_everything(&self) -> Result<()> {
        self.git(&["add", "-A"]).map(drop)
    }

    /// Paths currently staged for commit.
    pub fn staged_paths(&self) -> Result<Vec<String>> {
        let listing = self.git(&["diff", "--cached", "--name-only"])?;
        Ok(listing.lines().map(str::to_string).collect())
    }

    /// Commit the index. Returns `false` without committing when nothing is staged.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn commit_index(&self, message: &str) -> Result<bool> {
        let staged = self.staged_paths()?;
        if staged.is_empty() {
            debug!("index clean");
            return Ok(false);
        }
        debug!(files = staged.len(), "committing index");
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(true)
    }

    /// `git push` to the configured upstream, returning git's progress text.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn push(&self) -> Result<String> {
        self.git_with_stderr(&["push"]).map(|(_, progress)| progress)
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        self.git_with_stderr(args).map(|(stdout, _)| stdout)
    }

    /// Run git and return trimmed (stdout, stderr); non-zero exit is an error
    /// and overrunning the timeout is a [`GitTimeout`].
    fn git_with_stderr(&self, args: &[&str]) -> Result<(String, String)> {
        let rendered = args.join(" ");
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.root)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0");
        let output = run_command_with_timeout(cmd, self.timeout, GIT_OUTPUT_LIMIT)
            .with_context(|| format!("run git {rendered}"))?;
        if output.timed_out {
            warn!(command = %rendered, "git timed out");
            return Err(GitTimeout {
                command: rendered,
                timeout: self.timeout,
            }
            .into());
        }
        let stdout = String::from_utf8_lossy(&output.stdout.bytes).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr.bytes).trim().to_string();
        if !output.status.success() {
            bail!("git {rendered} failed: {stderr}");
        }
        Ok((stdout, stderr))
    }
}
