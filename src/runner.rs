//! Shell command execution with captured output and timeouts.
//!
//! Every external tool invocation in the setup flow goes through
//! [`CommandRunner`]. The runner never returns an error for the normal
//! failure modes of a command: a non-zero exit, a missing executable, or a
//! timeout all come back as a [`CommandOutcome`] value. Callers decide what
//! an outcome means for their step.

use crate::errors::StepError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Default per-command timeout. There is no global run deadline.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// The observed result of running one command.
///
/// `exit_code` is `-1` when the process was killed by a signal or timed out
/// before exiting. Shells report a missing executable as exit code 127.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutcome {
    /// True when the command ran to completion with exit code 0.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// Last few lines of stderr, for error messages.
    pub fn stderr_tail(&self) -> String {
        let lines: Vec<&str> = self.stderr.trim().lines().collect();
        let start = lines.len().saturating_sub(3);
        lines[start..].join("\n")
    }

    /// Map a failed outcome into the step error taxonomy.
    pub fn to_step_error(&self, command: &str, timeout_secs: u64) -> StepError {
        if self.timed_out {
            StepError::Timeout {
                command: command.to_string(),
                seconds: timeout_secs,
            }
        } else if self.exit_code == 127 {
            StepError::CommandNotFound {
                command: command.to_string(),
            }
        } else {
            StepError::CommandFailed {
                command: command.to_string(),
                exit_code: self.exit_code,
                detail: self.stderr_tail(),
            }
        }
    }
}

/// Runs shell commands in the project directory.
///
/// Cloning is cheap; steps running in parallel each hold a handle.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    working_dir: PathBuf,
    default_timeout: Duration,
}

impl CommandRunner {
    /// Create a runner rooted at the given working directory.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the default per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The configured per-command timeout in seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.default_timeout.as_secs()
    }

    /// The directory commands run in.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run a command with the default timeout.
    pub async fn run(&self, command: &str) -> CommandOutcome {
        self.run_inner(command, &[], self.default_timeout).await
    }

    /// Run a command with extra environment variables.
    pub async fn run_with_env(&self, command: &str, env: &[(String, String)]) -> CommandOutcome {
        self.run_inner(command, env, self.default_timeout).await
    }

    /// Run a command with an explicit timeout.
    pub async fn run_with_timeout(&self, command: &str, timeout: Duration) -> CommandOutcome {
        self.run_inner(command, &[], timeout).await
    }

    /// Check whether an executable is reachable on PATH.
    pub async fn command_exists(&self, name: &str) -> bool {
        self.run(&format!("command -v {}", name)).await.success()
    }

    async fn run_inner(
        &self,
        command: &str,
        env: &[(String, String)],
        run_timeout: Duration,
    ) -> CommandOutcome {
        debug!(command, timeout_secs = run_timeout.as_secs(), "spawning command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                // sh itself is unavailable or unspawnable; report as a value
                // so the runner contract holds.
                return CommandOutcome {
                    exit_code: 127,
                    stdout: String::new(),
                    stderr: format!("failed to spawn shell: {}", e),
                    timed_out: false,
                };
            }
        };

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let waited = timeout(run_timeout, async {
            let stdout_read = async {
                if let Some(ref mut pipe) = stdout_pipe {
                    pipe.read_to_end(&mut stdout_buf).await.ok();
                }
            };
            let stderr_read = async {
                if let Some(ref mut pipe) = stderr_pipe {
                    pipe.read_to_end(&mut stderr_buf).await.ok();
                }
            };
            let (_, _, status) = tokio::join!(stdout_read, stderr_read, child.wait());
            status
        })
        .await;

        match waited {
            Ok(Ok(status)) => {
                let exit_code = status.code().unwrap_or(-1);
                debug!(command, exit_code, "command finished");
                CommandOutcome {
                    exit_code,
                    stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
                    timed_out: false,
                }
            }
            Ok(Err(e)) => CommandOutcome {
                exit_code: -1,
                stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
                stderr: format!("failed to wait for command: {}", e),
                timed_out: false,
            },
            Err(_) => {
                child.kill().await.ok();
                debug!(command, "command timed out and was killed");
                CommandOutcome {
                    exit_code: -1,
                    stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
                    timed_out: true,
                }
            }
        }
    }
}
