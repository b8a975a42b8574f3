//! External command execution
//!
//! Runs one program to completion, capturing stdout, stderr and the exit
//! code. An optional wall-clock limit kills the child when it fires.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Command execution errors
#[derive(Debug, Error)]
pub enum CommandError {
    /// Program not found in PATH (or at the configured location)
    #[error("Program not found: {0}")]
    NotFound(String),

    /// Failed to start or wait for the program
    #[error("Failed to execute {program}: {source}")]
    Execution {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Wall-clock limit exceeded; the child has been killed
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

/// A program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished program
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// First non-empty stderr line, if any
    pub fn first_stderr_line(&self) -> Option<&str> {
        self.stderr.lines().map(str::trim).find(|line| !line.is_empty())
    }
}

/// Run `spec` to completion
///
/// With `timeout`, the child is killed when the limit elapses and
/// [`CommandError::TimedOut`] is returned. Without it the call waits
/// indefinitely.
pub async fn run(spec: &CommandSpec, timeout: Option<Duration>) -> Result<CommandOutput, CommandError> {
    tracing::debug!(command = %spec, "Spawning external command");

    let child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::NotFound(spec.program.clone())
            } else {
                CommandError::Execution {
                    program: spec.program.clone(),
                    source: e,
                }
            }
        })?;

    let wait = child.wait_with_output();
    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(result) => result,
            Err(_) => {
                // Dropping the wait future drops the child, which kills it
                tracing::warn!(command = %spec, timeout_secs = limit.as_secs(), "External command timed out");
                return Err(CommandError::TimedOut {
                    program: spec.program.clone(),
                    timeout: limit,
                });
            }
        },
        None => wait.await,
    }
    .map_err(|e| CommandError::Execution {
        program: spec.program.clone(),
        source: e,
    })?;

    let result = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    tracing::debug!(
        program = %spec.program,
        code = ?result.code,
        stderr_bytes = result.stderr.len(),
        "External command finished"
    );

    Ok(result)
}

/// Whether `program` can be started at all
pub async fn is_available(program: &str, probe_args: &[&str]) -> bool {
    let spec = CommandSpec::new(program, probe_args.iter().map(|a| a.to_string()).collect());
    matches!(run(&spec, Some(Duration::from_secs(30))).await, Ok(output) if output.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_arguments() {
        let spec = CommandSpec::new("ffmpeg", vec!["-y".into(), "-i".into(), "in.mp4".into()]);
        assert_eq!(spec.to_string(), "ffmpeg -y -i in.mp4");
    }

    #[test]
    fn test_first_stderr_line_skips_blank_lines() {
        let output = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "\n  \nin.mp4: No such file or directory\nmore\n".into(),
        };
        assert!(!output.success());
        assert_eq!(output.first_stderr_line(), Some("in.mp4: No such file or directory"));
    }

    #[tokio::test]
    async fn test_missing_program_reports_not_found() {
        let spec = CommandSpec::new("stemdeck-definitely-not-a-program", vec![]);
        let result = run(&spec, None).await;
        assert!(matches!(result, Err(CommandError::NotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let spec = CommandSpec::new(
            "sh",
            vec!["-c".into(), "echo out; echo err >&2; exit 3".into()],
        );
        let output = run(&spec, None).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let spec = CommandSpec::new("sh", vec!["-c".into(), "sleep 10".into()]);
        let started = std::time::Instant::now();
        let result = run(&spec, Some(Duration::from_millis(200))).await;
        assert!(matches!(result, Err(CommandError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
