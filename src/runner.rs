//! External process execution
//!
//! Every provisioning step and most checks shell out to `docker`, `kind` or
//! `kubectl` and consume their text output. The trait keeps that boundary
//! injectable so the engine is testable without the real tools.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Options for a single external invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOpts {
    /// Working directory for the child process
    pub dir: Option<PathBuf>,
    /// Deadline after which the child is killed
    pub timeout: Option<Duration>,
}

impl RunOpts {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            timeout: None,
        }
    }
}

/// Process execution failure. Carries the captured combined output so
/// callers can surface tool diagnostics verbatim.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{program} {}: {}\n{output}", args.join(" "), match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    })]
    Failed {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
        output: String,
    },

    #[error("{program}: timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    /// Exit code of the child, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunError::Failed { code, .. } => *code,
            _ => None,
        }
    }

    /// Combined output captured before the failure.
    pub fn output(&self) -> &str {
        match self {
            RunError::Failed { output, .. } => output,
            _ => "",
        }
    }
}

pub type RunResult = std::result::Result<String, RunError>;

/// Seam for invoking external command-line tools.
///
/// Implementations return trimmed combined stdout+stderr on a zero exit and
/// a `RunError` wrapping the captured output otherwise.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], opts: RunOpts) -> RunResult;
}

/// Runs real child processes via tokio.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str], opts: RunOpts) -> RunResult {
        debug!(program, ?args, "exec");

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // If the caller's future is dropped (ctrl-c, select), the child
            // must not outlive it.
            .kill_on_drop(true);
        if let Some(dir) = &opts.dir {
            cmd.current_dir(dir);
        }

        let wait = async {
            cmd.output().await.map_err(|e| RunError::Spawn {
                program: program.to_string(),
                source: e,
            })
        };

        let output = match opts.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, wait).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(RunError::TimedOut {
                        program: program.to_string(),
                        timeout,
                    })
                }
            },
            None => wait.await?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_string();

        if output.status.success() {
            Ok(combined)
        } else {
            Err(RunError::Failed {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                code: output.status.code(),
                output: combined,
            })
        }
    }
}
