//! Child process execution with timeouts and bounded output.
//!
//! Commands are described as an [`Invocation`]: a program plus ordered argument
//! tokens handed to the OS verbatim. No shell is involved, so arguments never
//! need quoting.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::ExecutionResult;
use crate::exit_codes;

/// Structured description of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.workdir = dir;
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg:?}")?;
        }
        Ok(())
    }
}

/// Runs invocations to completion.
///
/// Expected failures (non-zero exit, timeout, missing program) are reported as
/// a failed [`ExecutionResult`]; `Err` is reserved for unexpected I/O failures.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult>;
}

/// Runner that spawns real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl SystemRunner {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }
}

impl ProcessRunner for SystemRunner {
    #[instrument(skip_all, fields(program = %invocation.program))]
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        let start = Instant::now();
        let output = match run_command_with_timeout(
            invocation.to_command(),
            self.timeout,
            self.output_limit_bytes,
        ) {
            Ok(output) => output,
            Err(err) if err.is::<SpawnError>() => {
                warn!(err = %err, "command could not be started");
                return Ok(ExecutionResult::failed(
                    -1,
                    format!("{err:#}"),
                    start.elapsed(),
                ));
            }
            Err(err) => return Err(err).with_context(|| format!("run {invocation}")),
        };
        Ok(output.into_result(self.timeout, start.elapsed()))
    }
}

/// The child process could not be spawned at all.
#[derive(Debug)]
struct SpawnError {
    program: String,
    source: std::io::Error,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spawn {}: {}", self.program, self.source)
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Bytes kept from one output pipe plus the count dropped past the limit.
#[derive(Debug, Default)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Captured {
    /// Lossy text with trailing whitespace removed and a truncation marker appended.
    fn text(&self, stream: &str) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).trim_end().to_string();
        if self.dropped > 0 {
            text.push_str(&format!("\n[{stream} truncated {} bytes]", self.dropped));
        }
        text
    }
}

/// Everything observed about one finished (or killed) child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Convert into the result shape shared by every collaborator.
    pub fn into_result(self, timeout: Duration, duration: Duration) -> ExecutionResult {
        let stdout = self.stdout.text("stdout");
        let stderr = self.stderr.text("stderr");

        let (success, exit_code, error) = if self.timed_out {
            let notice = format!("timed out after {}ms", timeout.as_millis());
            let error = if stderr.is_empty() {
                notice
            } else {
                format!("{notice}\n{stderr}")
            };
            (false, exit_codes::TIMEOUT, Some(error))
        } else {
            (
                self.status.success(),
                self.status.code().unwrap_or(-1),
                (!stderr.is_empty()).then_some(stderr),
            )
        };
        ExecutionResult {
            success,
            exit_code,
            output: Some(stdout),
            error,
            duration,
        }
    }
}

/// Spawn `cmd`, wait up to `timeout`, and kill it if it overruns.
///
/// Both pipes are drained on their own threads while the child runs so a chatty
/// child can never block on a full pipe. At most `output_limit_bytes` per pipe
/// are kept; the rest is read and discarded.
///
/// On unix the child leads its own process group and the whole group is killed
/// on timeout. Descendants still holding a pipe once the child has exited are
/// killed when the deadline passes, and readers that never finish are abandoned
/// after a short grace period.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let deadline = Instant::now() + timeout;
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(%program, "spawning");
    let mut child = cmd
        .spawn()
        .map_err(|source| SpawnError { program, source })?;

    let stdout = Drain::start(child.stdout.take(), "stdout", output_limit_bytes)?;
    let stderr = Drain::start(child.stderr.take(), "stderr", output_limit_bytes)?;

    let waited = child.wait_timeout(timeout).context("wait for child")?;
    let timed_out = waited.is_none();
    let status = match waited {
        Some(status) => status,
        None => {
            warn!(timeout_ms = timeout.as_millis() as u64, "child overran timeout, killing");
            kill_group(&child);
            if let Err(err) = child.kill() {
                debug!(%err, "kill after group kill failed");
            }
            child.wait().context("reap killed child")?
        }
    };

    if !timed_out && !(stdout.wait_until(deadline) && stderr.wait_until(deadline)) {
        warn!("descendants still hold output pipes, killing process group");
        kill_group(&child);
    }

    let stdout = stdout.finish()?;
    let stderr = stderr.finish()?;
    if stdout.dropped + stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "child output exceeded limit"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "child finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(%err, pgid, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// How long a reader may keep going once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Reader thread filling a shared buffer from one pipe.
struct Drain {
    stream: &'static str,
    captured: Arc<Mutex<Captured>>,
    handle: thread::JoinHandle<std::io::Result<()>>,
}

impl Drain {
    fn start<R: Read + Send + 'static>(
        pipe: Option<R>,
        stream: &'static str,
        limit: usize,
    ) -> Result<Self> {
        let pipe = pipe.ok_or_else(|| anyhow!("{stream} was not piped"))?;
        let captured = Arc::new(Mutex::new(Captured::default()));
        let sink = Arc::clone(&captured);
        let handle = thread::spawn(move || read_limited(pipe, limit, &sink));
        Ok(Self {
            stream,
            captured,
            handle,
        })
    }

    /// Whether the reader hit end-of-file before `deadline`.
    fn wait_until(&self, deadline: Instant) -> bool {
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(DRAIN_POLL);
        }
        true
    }

    /// Join the reader, or give up on it after [`DRAIN_GRACE`], and take what it read.
    fn finish(self) -> Result<Captured> {
        let stream = self.stream;
        if self.wait_until(Instant::now() + DRAIN_GRACE) {
            self.handle
                .join()
                .map_err(|_| anyhow!("{stream} reader panicked"))?
                .with_context(|| format!("read {stream}"))?;
        } else {
            warn!(stream, "abandoning output reader");
        }
        let mut captured = self.captured.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::take(&mut *captured))
    }
}

fn read_limited<R: Read>(
    mut pipe: R,
    limit: usize,
    sink: &Mutex<Captured>,
) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = sink.lock().unwrap_or_else(PoisonError::into_inner);
        let room = limit.saturating_sub(captured.bytes.len()).min(n);
        captured.bytes.extend_from_slice(&chunk[..room]);
        captured.dropped += n - room;
    }
}
