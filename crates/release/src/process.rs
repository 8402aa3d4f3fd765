//! Subprocess execution with an explicit timeout.

use crate::config::DEFAULT_COMMAND_TIMEOUT_SECS;
use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Runs external commands with a shared timeout and extra environment.
///
/// A command that outlives the timeout is killed and reported as a
/// [`Error::Command`].
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    envs: Vec<(String, String)>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS))
    }
}

impl CommandRunner {
    /// Creates a runner with the given per-command timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            envs: Vec::new(),
        }
    }

    /// Adds an environment variable set on every child process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `program` with `args`, optionally inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] if the program cannot be started, exits
    /// unsuccessfully, or exceeds the timeout.
    pub async fn run(&self, program: &str, args: &[&str], dir: Option<&Path>) -> Result<CommandOutput> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let start_time = Instant::now();
        debug!(command = %command_line, dir = ?dir, "Running command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        let directory = dir.map(Path::to_path_buf);
        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(io_error)) => {
                return Err(Error::command(
                    command_line,
                    format!("failed to execute: {io_error}"),
                    directory,
                ));
            }
            Err(_elapsed) => {
                warn!(command = %command_line, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(Error::command(
                    command_line,
                    format!("timed out after {} seconds", self.timeout.as_secs()),
                    directory,
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let duration_ms = start_time.elapsed().as_millis();

        if output.status.success() {
            debug!(command = %command_line, duration_ms, "Command completed");
            Ok(CommandOutput { stdout, stderr })
        } else {
            debug!(command = %command_line, status = %output.status, stderr = %stderr.trim(), "Command failed");
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            Err(Error::command(
                command_line,
                format!("exited with {}: {detail}", output.status),
                directory,
            ))
        }
    }
}
