//! Stage process driver
//!
//! Runs one external engine to completion. stdin is inherited; stdout and
//! stderr are read line by line, logged as they arrive and accumulated.
//! The driver never fails: every problem is folded into `StageOutput`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Exit code reported when the process could not run or was killed by a signal
pub const NO_EXIT_CODE: i32 = -1;

/// Fully resolved engine invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited parent environment
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
}

/// Everything observed about one engine run
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

impl StageOutput {
    /// True iff the process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn not_run(error: String) -> Self {
        Self {
            exit_code: NO_EXIT_CODE,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Most useful single-line description of a failed run
    pub fn failure_summary(&self) -> String {
        let base = self
            .error
            .clone()
            .unwrap_or_else(|| format!("Process exited with code {}", self.exit_code));
        match self.stderr.lines().rev().find(|line| !line.trim().is_empty()) {
            Some(last) => format!("{} ({})", base, last.trim()),
            None => base,
        }
    }
}

/// Launches engine processes for a named pipeline stage
#[derive(Debug, Clone)]
pub struct StageDriver {
    stage: &'static str,
}

impl StageDriver {
    pub fn new(stage: &'static str) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Run `command` and wait for it to exit
    ///
    /// No timeout is applied: a hung engine blocks the caller.
    pub async fn run(&self, command: &StageCommand) -> StageOutput {
        tracing::info!(
            stage = self.stage,
            program = %command.program,
            args = ?command.args,
            working_dir = ?command.working_dir,
            "Spawning stage process"
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("Failed to spawn {}: {}", command.program, e);
                tracing::error!(stage = self.stage, error = %e, "{}", message);
                return StageOutput::not_run(message);
            }
        };

        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| collect_lines(pipe, self.stage, false));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| collect_lines(pipe, self.stage, true));

        let status = child.wait().await;

        let stdout = join_lines(stdout_task).await;
        let stderr = join_lines(stderr_task).await;

        let (exit_code, error) = match status {
            Ok(status) => match status.code() {
                Some(0) => (0, None),
                Some(code) => (code, Some(format!("Process exited with code {}", code))),
                None => (
                    NO_EXIT_CODE,
                    Some("Process terminated by signal".to_string()),
                ),
            },
            Err(e) => (
                NO_EXIT_CODE,
                Some(format!("Failed to wait for {}: {}", command.program, e)),
            ),
        };

        if exit_code == 0 {
            tracing::info!(stage = self.stage, "Stage process exited successfully");
        } else {
            tracing::error!(
                stage = self.stage,
                exit_code,
                error = error.as_deref().unwrap_or(""),
                "Stage process failed"
            );
        }

        StageOutput {
            exit_code,
            stdout,
            stderr,
            error,
        }
    }
}

/// Read `pipe` to EOF, one line at a time
///
/// Lines are decoded lossily: engines may print bytes that are not UTF-8,
/// and a bad line must not hide the marker lines after it.
fn collect_lines<R>(pipe: R, stage: &'static str, is_stderr: bool) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = String::new();
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']);
                    if is_stderr {
                        tracing::warn!(stage, "[stderr] {}", line);
                    } else {
                        tracing::info!(stage, "[stdout] {}", line);
                    }
                    collected.push_str(line);
                    collected.push('\n');
                }
                Err(e) => {
                    tracing::warn!(stage, error = %e, "Stopped reading stage output");
                    break;
                }
            }
        }
        collected
    })
}

async fn join_lines(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

/// Paths reported on marker lines, in emission order
///
/// A marker may appear anywhere in a line; the path is the trimmed remainder.
pub fn parse_marker_paths(stdout: &str, marker: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .filter_map(|line| {
            let (_, rest) = line.split_once(marker)?;
            let path = rest.trim();
            (!path.is_empty()).then(|| Path::new(path).to_path_buf())
        })
        .collect()
}
