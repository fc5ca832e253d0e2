// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive variant: the CLI runs under a pseudo-terminal so its
//! permission prompts surface. Output is watched for quiescence; once the
//! stream settles on a question, the run parks on the pending-input
//! registry until an answer arrives and is typed back into the terminal.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ansi::strip_ansi;
use crate::args::build_args;
use crate::config::PermissionMode;
use crate::pending::InputError;
use crate::pty::PtyChild;

use super::{RunError, RunOptions, RunResult, Runner, EXIT_CODE_UNKNOWN};

/// Tracks whether the output stream has gone quiet: unchanged length across
/// `threshold` consecutive observations.
pub(crate) struct QuiescenceWatch {
    threshold: u32,
    last_len: usize,
    stable: u32,
}

impl QuiescenceWatch {
    pub(crate) fn new(threshold: u32) -> Self {
        Self { threshold: threshold.max(1), last_len: 0, stable: 0 }
    }

    /// Record the current output length. True once the length has held
    /// steady for the configured number of observations.
    pub(crate) fn observe(&mut self, len: usize) -> bool {
        if len == self.last_len {
            self.stable = self.stable.saturating_add(1);
        } else {
            self.last_len = len;
            self.stable = 0;
        }
        self.stable >= self.threshold
    }

    /// Forget accumulated stability, e.g. after typing an answer.
    pub(crate) fn reset(&mut self) {
        self.stable = 0;
    }
}

enum RunEnd {
    Exited(i32),
    DeadlineHit,
    AnswerFailed,
}

pub(super) async fn run(runner: &Runner, options: &RunOptions) -> Result<RunResult, RunError> {
    let args = build_args(options, PermissionMode::Interactive);
    let argv = runner.launch.argv(&args);
    let started = Instant::now();
    let timeout = options.timeout.unwrap_or(runner.tuning.run_timeout);

    // Key for the pending-input registry; resumed runs keep their id so an
    // operator can answer under the id they already know.
    let session_key = options
        .resume_session_id
        .clone()
        .unwrap_or_else(|| format!("pty-{}", Uuid::new_v4()));

    let child = PtyChild::spawn(
        &argv,
        runner.tuning.cols,
        runner.tuning.rows,
        options.cwd.as_deref(),
    )
    .map_err(|e| RunError::Spawn { path: runner.launch.program.clone(), detail: format!("{e:#}") })?;
    debug!(session = %session_key, "spawned copilot under pty");

    let mut buffer = String::new();
    let mut read_buf = vec![0u8; 8192];
    let mut ticker = tokio::time::interval(runner.tuning.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut watch = QuiescenceWatch::new(runner.tuning.stable_polls);

    // Answers come back through a task parked on the registry; `waiting`
    // gates detection so one question is in flight at a time.
    let (answer_tx, mut answer_rx) = mpsc::channel::<Result<String, InputError>>(1);
    let mut waiting = false;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let end = loop {
        tokio::select! {
            read = child.read_chunk(&mut read_buf) => {
                match read {
                    Ok(0) => {
                        // End of stream only means the slave side closed; a
                        // child that detached from the terminal may still be
                        // running, so the reap shares the run deadline.
                        let remaining = timeout.saturating_sub(started.elapsed());
                        match tokio::time::timeout(remaining, child.wait_exit()).await {
                            Ok(status) => {
                                let code = status.map(|s| s.normalized_code());
                                break RunEnd::Exited(code.unwrap_or(EXIT_CODE_UNKNOWN));
                            }
                            Err(_elapsed) => break RunEnd::DeadlineHit,
                        }
                    }
                    Ok(n) => {
                        buffer.push_str(&String::from_utf8_lossy(&read_buf[..n]));
                    }
                    Err(e) => {
                        runner.registry.cancel(&session_key);
                        child.shutdown(runner.tuning.kill_grace).await;
                        return Err(RunError::Runtime { detail: e.to_string() });
                    }
                }
            }
            _ = ticker.tick(), if !waiting => {
                if watch.observe(buffer.len()) {
                    let clean = strip_ansi(&buffer);
                    if let Some((rule, question)) = runner.detector.detect_with_rule(&clean) {
                        info!(session = %session_key, rule, %question, "question detected");
                        waiting = true;
                        let registry = runner.registry.clone();
                        let key = session_key.clone();
                        let tx = answer_tx.clone();
                        tokio::spawn(async move {
                            let outcome =
                                registry.wait_for_input(&key, &question, timeout).await;
                            let _ = tx.send(outcome).await;
                        });
                    }
                }
            }
            Some(outcome) = answer_rx.recv(), if waiting => {
                waiting = false;
                match outcome {
                    Ok(answer) => {
                        debug!(session = %session_key, "typing answer into pty");
                        let line = format!("{answer}\n");
                        if let Err(e) = child.write_all(line.as_bytes()).await {
                            runner.registry.cancel(&session_key);
                            child.shutdown(runner.tuning.kill_grace).await;
                            return Err(RunError::Runtime { detail: e.to_string() });
                        }
                        watch.reset();
                    }
                    // A newer registration took over this session key; the
                    // replacement waiter now owns the answer.
                    Err(InputError::Superseded) => {
                        watch.reset();
                    }
                    Err(e @ (InputError::Cancelled | InputError::TimedOut { .. })) => {
                        warn!(session = %session_key, error = %e, "wait ended without answer; terminating");
                        break RunEnd::AnswerFailed;
                    }
                }
            }
            _ = &mut deadline => {
                info!(session = %session_key, timeout_ms = timeout.as_millis() as u64, "run timed out");
                break RunEnd::DeadlineHit;
            }
        }
    };

    // Snapshot before draining so the caller can see what was unanswered.
    let unanswered = runner.registry.get_pending(&session_key);
    runner.registry.cancel(&session_key);

    let (exit_code, output) = match end {
        RunEnd::Exited(code) => (code, Runner::shape_output(&buffer)),
        RunEnd::AnswerFailed => {
            child.shutdown(runner.tuning.kill_grace).await;
            (EXIT_CODE_UNKNOWN, Runner::shape_output(&buffer))
        }
        RunEnd::DeadlineHit => {
            child.shutdown(runner.tuning.kill_grace).await;
            let clean = strip_ansi(&buffer);
            (
                EXIT_CODE_UNKNOWN,
                format!(
                    "{}\n\n[TIMEOUT: Process killed after {}ms]",
                    clean.trim(),
                    timeout.as_millis()
                ),
            )
        }
    };

    let session_id =
        runner.shape_session_id(&buffer, options).or(Some(session_key));

    Ok(RunResult {
        output,
        session_id,
        exit_code,
        duration_ms: started.elapsed().as_millis() as u64,
        needs_input: unanswered.as_ref().map(|_| true),
        pending_question: unanswered.map(|p| p.question),
    })
}

#[cfg(test)]
#[path = "interactive_tests.rs"]
mod tests;
