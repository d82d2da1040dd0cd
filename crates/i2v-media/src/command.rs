//! Child process command builder and runner.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Bytes of stderr kept as the diagnostic of a failed process.
pub const STDERR_TAIL_BYTES: usize = 4096;

/// Builder for a child process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    /// Program name or path
    program: String,
    /// Arguments in order
    args: Vec<String>,
}

impl ProcessCommand {
    /// Create a new command.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add a positional argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple positional arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a named option: `--name value`.
    pub fn option(self, name: &str, value: impl ToString) -> Self {
        self.arg(format!("--{}", name)).arg(value.to_string())
    }

    /// Add a bare flag `--name` when `enabled`.
    pub fn flag(self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.arg(format!("--{}", name))
        } else {
            self
        }
    }

    /// Wrap this command so it runs under `wrapper`.
    ///
    /// The result is `wrapper <wrapper_args...> <program> <args...>`.
    pub fn wrapped_by<I, S>(self, wrapper: impl Into<String>, wrapper_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProcessCommand::new(wrapper)
            .args(wrapper_args)
            .arg(self.program)
            .args(self.args)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        self.args.clone()
    }

    /// Command line for log output.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Runner for child processes with log forwarding and stderr capture.
///
/// Blocks (asynchronously) until the child exits. There is no timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Label used in log lines
    name: String,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new("process")
    }
}

impl ProcessRunner {
    /// Create a new runner.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Run a command to completion.
    ///
    /// A non-zero exit status (or death by signal) is an error carrying the
    /// tail of the captured stderr.
    pub async fn run(&self, cmd: &ProcessCommand) -> MediaResult<()> {
        let program = resolve_program(cmd.program())?;
        debug!(process = %self.name, "Running: {}", cmd.display());

        let mut child = Command::new(&program)
            .args(cmd.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout_task = child.stdout.take().map(|stdout| {
            let name = self.name.clone();
            tokio::spawn(forward_stdout(stdout, name))
        });
        let stderr_task = child.stderr.take().map(|stderr| {
            let name = self.name.clone();
            tokio::spawn(capture_stderr(stderr, name))
        });

        let status = child.wait().await?;

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            return Ok(());
        }

        let message = match status.code() {
            Some(code) => format!("{} exited with status {}", self.name, code),
            None => format!("{} terminated by signal", self.name),
        };
        let stderr = (!stderr_tail.is_empty()).then_some(stderr_tail);
        Err(MediaError::process_failed(message, stderr, status.code()))
    }
}

/// Resolve a program name or path to an executable.
pub fn resolve_program(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::ProgramNotFound(program.to_string()))
}

async fn forward_stdout<R: AsyncRead + Unpin>(stdout: R, name: String) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(process = %name, "{}", line);
    }
}

async fn capture_stderr<R: AsyncRead + Unpin>(stderr: R, name: String) -> String {
    let mut tail = StderrTail::new(STDERR_TAIL_BYTES);
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(process = %name, "{}", line);
        tail.push(line);
    }
    tail.into_string()
}

/// Bounded buffer holding the most recent stderr lines.
#[derive(Debug)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
    max_bytes: usize,
}

impl StderrTail {
    fn new(max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max_bytes,
        }
    }

    fn push(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        while self.bytes > self.max_bytes && self.lines.len() > 1 {
            if let Some(old) = self.lines.pop_front() {
                self.bytes -= old.len() + 1;
            }
        }
    }

    fn into_string(self) -> String {
        let joined = Vec::from(self.lines).join("\n");
        if joined.len() <= self.max_bytes {
            return joined;
        }
        let mut start = joined.len() - self.max_bytes;
        while !joined.is_char_boundary(start) {
            start += 1;
        }
        joined[start..].to_string()
    }
}
