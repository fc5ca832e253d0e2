// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Non-interactive variant: plain subprocess with piped stdio.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::ansi::strip_ansi;
use crate::args::build_args;
use crate::config::PermissionMode;

use super::{CliProbe, RunError, RunOptions, RunResult, Runner, EXIT_CODE_UNKNOWN};

pub(super) async fn run(runner: &Runner, options: &RunOptions) -> Result<RunResult, RunError> {
    // A fallback from interactive always runs with autonomous arguments so
    // the CLI never blocks on a question nobody can answer.
    let args = build_args(options, PermissionMode::Autonomous);
    let started = Instant::now();
    let timeout = options.timeout.unwrap_or(runner.tuning.run_timeout);

    let mut child = spawn_child(runner, &args, options)?;
    debug!(pid = child.id(), "spawned copilot subprocess");
    let stdout_drain = PipeDrain::start(child.stdout.take());
    let stderr_drain = PipeDrain::start(child.stderr.take());

    let exited = tokio::select! {
        status = child.wait() => {
            Some(status.map_err(|e| RunError::Runtime { detail: e.to_string() })?)
        }
        _ = tokio::time::sleep(timeout) => None,
    };

    let Some(status) = exited else {
        info!(timeout_ms = timeout.as_millis() as u64, "run timed out; escalating");
        terminate_then_kill(&mut child, runner).await;
        let stdout = stdout_drain.finish(runner.tuning.kill_grace).await;
        let stderr = stderr_drain.finish(runner.tuning.kill_grace).await;
        let combined = strip_ansi(&format!("{stdout}{stderr}"));
        return Ok(RunResult {
            output: format!(
                "{}\n\n[TIMEOUT: Process killed after {}ms]",
                combined.trim(),
                timeout.as_millis()
            ),
            session_id: options.resume_session_id.clone(),
            exit_code: EXIT_CODE_UNKNOWN,
            duration_ms: started.elapsed().as_millis() as u64,
            needs_input: None,
            pending_question: None,
        });
    };

    // A grandchild that inherited the pipes can hold them open after the
    // child exits, so the drains share what is left of the run deadline.
    let remaining = timeout.saturating_sub(started.elapsed());
    let stdout = stdout_drain.finish(remaining).await;
    let stderr = stderr_drain.finish(remaining).await;

    // Stderr often carries the useful detail when stdout is empty.
    let raw = if stdout.is_empty() { stderr.as_str() } else { stdout.as_str() };
    let session_id = runner
        .extractor
        .extract(&stdout)
        .or_else(|| runner.extractor.extract(&stderr))
        .or_else(|| options.resume_session_id.clone());

    Ok(RunResult {
        output: Runner::shape_output(raw),
        session_id,
        exit_code: status.code().unwrap_or(EXIT_CODE_UNKNOWN),
        duration_ms: started.elapsed().as_millis() as u64,
        needs_input: None,
        pending_question: None,
    })
}

/// Probe the CLI with `--version`; failures are reported, never raised.
pub(super) async fn probe_version(runner: &Runner) -> CliProbe {
    let path = runner.launch.program.clone();
    let mut command = Command::new(&runner.launch.program);
    command
        .args(&runner.launch.arg_prefix)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let probe = async {
        let output = command.output().await.map_err(|e| e.to_string())?;
        let text = strip_ansi(&String::from_utf8_lossy(&output.stdout))
            + &strip_ansi(&String::from_utf8_lossy(&output.stderr));
        if output.status.success() {
            Ok(text.trim().lines().next().unwrap_or_default().to_owned())
        } else {
            Err(format!(
                "Copilot CLI exited with code {}: {}",
                output.status.code().unwrap_or(EXIT_CODE_UNKNOWN),
                text.trim()
            ))
        }
    };

    match tokio::time::timeout(std::time::Duration::from_secs(10), probe).await {
        Ok(Ok(version)) => {
            CliProbe { available: true, version: Some(version), path, error: None }
        }
        Ok(Err(error)) => CliProbe { available: false, version: None, path, error: Some(error) },
        Err(_elapsed) => CliProbe {
            available: false,
            version: None,
            path,
            error: Some("timeout checking Copilot CLI".to_owned()),
        },
    }
}

fn spawn_child(
    runner: &Runner,
    args: &[String],
    options: &RunOptions,
) -> Result<Child, RunError> {
    let mut command = Command::new(&runner.launch.program);
    command
        .args(&runner.launch.arg_prefix)
        .args(args)
        .env("NO_COLOR", "1")
        .env("TERM", "dumb")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    if let Some(ref cwd) = options.cwd {
        command.current_dir(cwd);
    }
    command.spawn().map_err(|e| RunError::Spawn {
        path: runner.launch.program.clone(),
        detail: e.to_string(),
    })
}

/// SIGTERM the process group, then SIGKILL it after the grace window.
/// The child is its own group leader, so spawned descendants that would
/// otherwise outlive it get the same signals.
async fn terminate_then_kill(child: &mut Child, runner: &Runner) {
    signal_group(child, Signal::SIGTERM);
    if tokio::time::timeout(runner.tuning.kill_grace, child.wait()).await.is_err() {
        signal_group(child, Signal::SIGKILL);
        let _ = child.kill().await;
    }
}

fn signal_group(child: &Child, signal: Signal) {
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(-(pid as i32)), signal);
    }
}

/// Accumulates a pipe into a shared buffer as bytes arrive, so the run can
/// take a snapshot without waiting for end of stream.
struct PipeDrain {
    data: Arc<Mutex<String>>,
    task: Option<JoinHandle<()>>,
}

impl PipeDrain {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncReadExt + Unpin + Send + 'static,
    {
        let data = Arc::new(Mutex::new(String::new()));
        let task = pipe.map(|mut reader| {
            let sink = Arc::clone(&data);
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => sink.lock().push_str(&String::from_utf8_lossy(&chunk[..n])),
                    }
                }
            })
        });
        Self { data, task }
    }

    /// Wait up to `budget` for end of stream, then return whatever has
    /// arrived. A descendant holding the write end open cannot stall the
    /// run past the budget.
    async fn finish(mut self, budget: Duration) -> String {
        if let Some(mut handle) = self.task.take() {
            if tokio::time::timeout(budget, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        std::mem::take(&mut *self.data.lock())
    }
}

#[cfg(test)]
#[path = "autonomous_tests.rs"]
mod tests;
