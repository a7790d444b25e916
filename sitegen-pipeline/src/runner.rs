//! External command execution.
//!
//! Every external tool the pipeline drives (generator, npm, firebase) goes
//! through one capability: run a command in a directory, optionally feed it
//! stdin, wait for it under a timeout, and hand back exit code plus captured
//! output. The orchestrator is a fixed sequence of calls against
//! [`CommandRunner`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{PipelineError, Result};

#[cfg(any(test, feature = "test-util"))]
mod scripted;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedRunner;

/// Pipeline stage a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Generate,
    Install,
    Validate,
    Build,
    Deploy,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Generate => write!(f, "generate"),
            Step::Install => write!(f, "install"),
            Step::Validate => write!(f, "validate"),
            Step::Build => write!(f, "build"),
            Step::Deploy => write!(f, "deploy"),
        }
    }
}

/// A single external command to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub step: Step,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(step: Step, program: &str, args: &[&str], cwd: impl Into<PathBuf>) -> Self {
        Self {
            step,
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: cwd.into(),
            stdin: None,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_stdin(mut self, input: String) -> Self {
        self.stdin = Some(input);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line as a human would type it, for logs and errors.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// What a finished command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr, the way a terminal would show both.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }

    /// Turn a non-zero exit into [`PipelineError::CommandFailed`].
    pub fn check(self, invocation: &Invocation) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(PipelineError::CommandFailed {
            step: invocation.step,
            command: invocation.command_line(),
            code: self.code,
            output: self.combined(),
        })
    }
}

/// Runs external commands on behalf of the pipeline.
///
/// Implementations must not return `Err` for a non-zero exit; that is
/// reported through [`CommandOutput::code`] so each caller decides what a
/// failure means for its step.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        // Also resolves `npm.cmd` / `firebase.cmd` shims on Windows.
        let program = which::which(&invocation.program)
            .map_err(|_| PipelineError::ToolNotFound(invocation.program.clone()))?;

        tracing::debug!(
            step = %invocation.step,
            program = %program.display(),
            cwd = %invocation.cwd.display(),
            "Spawning command"
        );

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout also reaches the tools' node children.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| PipelineError::io("failed to spawn command", &program, e))?;
        let pid = child.id();

        if let Some(input) = &invocation.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            let input = input.clone();
            // Must not block reading stdout/stderr below.
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::warn!(error = %e, "Failed to write command stdin");
                }
                // Dropping stdin closes the pipe so the child sees EOF.
            });
        }

        let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(waited) => {
                waited.map_err(|e| PipelineError::io("failed to wait for command", &invocation.cwd, e))?
            }
            Err(_) => {
                // The direct child is already killed on drop.
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                tracing::warn!(
                    step = %invocation.step,
                    timeout_ms = invocation.timeout.as_millis() as u64,
                    "Command timed out"
                );
                return Err(PipelineError::CommandTimedOut {
                    step: invocation.step,
                    command: invocation.command_line(),
                    timeout: invocation.timeout,
                });
            }
        };

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        // ESRCH: every member already exited.
        tracing::debug!(pgid, error = %e, "Could not signal process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}
