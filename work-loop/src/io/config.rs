//! Loop configuration: defaults, optional TOML file, CLI flags, environment.
//!
//! Layers apply lowest to highest precedence: built-in defaults, then the
//! config file, then CLI flags, then `WORK_LOOP_*` environment variables.
//! The merged result is validated once before the loop starts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_MAX_ITERATIONS: &str = "WORK_LOOP_MAX_ITERATIONS";
pub const ENV_TASKS_DIR: &str = "WORK_LOOP_TASKS_DIR";
pub const ENV_PROJECT_DIR: &str = "WORK_LOOP_PROJECT_DIR";
pub const ENV_AUTO_COMMIT: &str = "WORK_LOOP_AUTO_COMMIT";
pub const ENV_TIMEOUT_MS: &str = "WORK_LOOP_TIMEOUT_MS";

/// Configuration rejected before the loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a positive number")]
    NotPositive { field: &'static str },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{var} must be a non-negative integer (got '{value}')")]
    InvalidEnv { var: &'static str, value: String },
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// How the commit collaborator records a finished task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Ask the agent to run its `/commit-push` command.
    #[default]
    Agent,
    /// Stage, commit and push with plain `git`.
    Git,
}

/// Fully resolved loop configuration.
///
/// Also the schema of the optional TOML config file; missing keys keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Specific task to work on instead of the next one.
    pub task_number: Option<String>,
    pub tasks_directory: Option<String>,
    /// Directory the queue is inspected in and the agent works against.
    pub project_directory: Option<String>,
    pub max_iterations: u32,
    /// Per-command timeout in milliseconds.
    pub timeout_ms: u64,
    pub auto_commit: bool,
    pub verbose: bool,
    pub skip_permissions: bool,
    /// Agent CLI used for the show, work and commit commands.
    pub agent_program: String,
    /// Queue inspector; invoked as `<queue_program> count`.
    pub queue_program: String,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
    pub commit_mode: CommitMode,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            task_number: None,
            tasks_directory: None,
            project_directory: None,
            max_iterations: 20,
            timeout_ms: 120_000,
            auto_commit: true,
            verbose: false,
            skip_permissions: true,
            agent_program: "claude".to_string(),
            queue_program: "tfq".to_string(),
            output_limit_bytes: 1_000_000,
            commit_mode: CommitMode::Agent,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::NotPositive {
                field: "max_iterations",
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "timeout_ms",
            });
        }
        if self.output_limit_bytes == 0 {
            return Err(ConfigError::NotPositive {
                field: "output_limit_bytes",
            });
        }
        if self.agent_program.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "agent_program",
            });
        }
        if self.queue_program.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "queue_program",
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn project_dir(&self) -> Option<PathBuf> {
        self.project_directory.as_ref().map(PathBuf::from)
    }
}

/// Values supplied on the command line. `None`/`false` leaves lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub task_number: Option<String>,
    pub tasks_directory: Option<String>,
    pub project_directory: Option<String>,
    pub max_iterations: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub no_auto_commit: bool,
    pub verbose: bool,
    pub no_skip_permissions: bool,
}

impl CliOverrides {
    pub fn apply(&self, cfg: &mut LoopConfig) {
        if let Some(task) = non_empty(self.task_number.as_deref()) {
            cfg.task_number = Some(task);
        }
        if let Some(dir) = non_empty(self.tasks_directory.as_deref()) {
            cfg.tasks_directory = Some(dir);
        }
        if let Some(dir) = non_empty(self.project_directory.as_deref()) {
            cfg.project_directory = Some(dir);
        }
        if let Some(max_iterations) = self.max_iterations {
            cfg.max_iterations = max_iterations;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            cfg.timeout_ms = timeout_ms;
        }
        if self.no_auto_commit {
            cfg.auto_commit = false;
        }
        if self.verbose {
            cfg.verbose = true;
        }
        if self.no_skip_permissions {
            cfg.skip_permissions = false;
        }
    }
}

/// Load a TOML config file without validating it.
pub fn load_config_file(path: &Path) -> Result<LoopConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `WORK_LOOP_*` overrides read through `lookup`. Empty values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut LoopConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|value| !value.is_empty());

    if let Some(value) = get(ENV_MAX_ITERATIONS) {
        cfg.max_iterations = parse_env_number(ENV_MAX_ITERATIONS, &value)?;
    }
    if let Some(value) = get(ENV_TASKS_DIR) {
        cfg.tasks_directory = Some(value);
    }
    if let Some(value) = get(ENV_PROJECT_DIR) {
        cfg.project_directory = Some(value);
    }
    if let Some(value) = get(ENV_AUTO_COMMIT) {
        cfg.auto_commit = value.eq_ignore_ascii_case("true");
    }
    if let Some(value) = get(ENV_TIMEOUT_MS) {
        cfg.timeout_ms = parse_env_number(ENV_TIMEOUT_MS, &value)?;
    }
    Ok(())
}

/// Merge every layer and validate the result.
pub fn resolve_config<F>(
    config_file: Option<&Path>,
    cli: &CliOverrides,
    lookup: F,
) -> Result<LoopConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = match config_file {
        Some(path) => load_config_file(path)?,
        None => LoopConfig::default(),
    };
    cli.apply(&mut cfg);
    apply_env_overrides(&mut cfg, lookup)?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse_env_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}
