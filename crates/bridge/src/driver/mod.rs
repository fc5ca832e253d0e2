// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process driver: owns the lifecycle of one Copilot CLI invocation.
//!
//! Two variants share one argument-construction and result-shaping
//! contract: autonomous (plain subprocess, everything pre-approved) and
//! interactive (pseudo-terminal, permission questions relayed through the
//! pending-input registry).

pub mod autonomous;
pub mod extract;
pub mod interactive;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ansi::strip_ansi;
use crate::config::{Config, PermissionMode};
use crate::detect::QuestionDetector;
use crate::locate::LaunchCommand;
use crate::pending::PendingInputRegistry;

use extract::SessionIdExtractor;

/// Sentinel exit code reported when the real code is unavailable (process
/// killed, or it never reported one). Distinct from any real exit code the
/// CLI produces.
pub const EXIT_CODE_UNKNOWN: i32 = -1;

/// Exit status of the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Exit code with the unavailable case normalized to the sentinel.
    pub fn normalized_code(&self) -> i32 {
        self.code.unwrap_or(EXIT_CODE_UNKNOWN)
    }
}

/// Caller-supplied configuration for one run. Read-only for the run's
/// duration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub prompt: String,
    pub model: Option<String>,
    pub allow_tools: Vec<String>,
    pub allow_all_tools: bool,
    pub add_dirs: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub resume_session_id: Option<String>,
    pub no_ask_user: bool,
    pub permission_mode: Option<PermissionMode>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: None,
            allow_tools: Vec::new(),
            allow_all_tools: true,
            add_dirs: Vec::new(),
            cwd: None,
            timeout: None,
            resume_session_id: None,
            no_ask_user: true,
            permission_mode: None,
        }
    }
}

/// The sole artifact returned to the caller for one invocation. Immutable
/// once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub output: String,
    pub session_id: Option<String>,
    pub exit_code: i32,
    pub duration_ms: u64,
    /// Set when the run ended while a question was still pending.
    pub needs_input: Option<bool>,
    pub pending_question: Option<String>,
}

/// Failures that prevent producing any [`RunResult`]. Timeouts and
/// non-zero exits are not errors; they fold into a well-formed result.
#[derive(Debug)]
pub enum RunError {
    /// The executable could not be launched at all.
    Spawn { path: String, detail: String },
    /// An OS-level failure after launch.
    Runtime { detail: String },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { path, detail } => {
                write!(f, "failed to spawn Copilot CLI at '{path}': {detail}")
            }
            Self::Runtime { detail } => write!(f, "Copilot CLI process error: {detail}"),
        }
    }
}

impl std::error::Error for RunError {}

/// Driver tuning derived from [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    pub run_timeout: Duration,
    pub kill_grace: Duration,
    pub poll_interval: Duration,
    pub stable_polls: u32,
    pub cols: u16,
    pub rows: u16,
}

impl Tuning {
    pub fn from_config(config: &Config) -> Self {
        Self {
            run_timeout: config.run_timeout(),
            kill_grace: config.kill_grace(),
            poll_interval: config.poll_interval(),
            stable_polls: config.stable_polls(),
            cols: config.cols,
            rows: config.rows,
        }
    }
}

/// Availability probe outcome for the underlying CLI.
#[derive(Debug, Clone, Serialize)]
pub struct CliProbe {
    pub available: bool,
    pub version: Option<String>,
    pub path: String,
    pub error: Option<String>,
}

/// One driver instance; cheap to share behind the server state.
pub struct Runner {
    launch: LaunchCommand,
    registry: Arc<PendingInputRegistry>,
    detector: QuestionDetector,
    extractor: SessionIdExtractor,
    tuning: Tuning,
    default_mode: PermissionMode,
    /// Constructor-time capability flag: whether this runtime can back a
    /// run with a pseudo-terminal.
    pty_available: bool,
}

impl Runner {
    pub fn new(
        launch: LaunchCommand,
        registry: Arc<PendingInputRegistry>,
        tuning: Tuning,
        default_mode: PermissionMode,
        pty_available: bool,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            launch,
            registry,
            detector: QuestionDetector::new()?,
            extractor: SessionIdExtractor::new()?,
            tuning,
            default_mode,
            pty_available,
        })
    }

    pub fn registry(&self) -> &Arc<PendingInputRegistry> {
        &self.registry
    }

    pub fn launch(&self) -> &LaunchCommand {
        &self.launch
    }

    fn resolve_mode(&self, options: &RunOptions) -> PermissionMode {
        options.permission_mode.unwrap_or(self.default_mode)
    }

    /// Run one Copilot CLI invocation to completion.
    pub async fn run(&self, options: &RunOptions) -> Result<RunResult, RunError> {
        match self.resolve_mode(options) {
            PermissionMode::Interactive if self.pty_available => {
                interactive::run(self, options).await
            }
            PermissionMode::Interactive => {
                warn!("pseudo-terminal unavailable; falling back to autonomous mode");
                autonomous::run(self, options).await
            }
            PermissionMode::Autonomous => autonomous::run(self, options).await,
        }
    }

    /// Probe the CLI with `--version` under a short budget.
    pub async fn check_available(&self) -> CliProbe {
        autonomous::probe_version(self).await
    }

    /// Mine the output for a session-log UUID, else fall back to the resume id.
    fn shape_session_id(&self, output: &str, options: &RunOptions) -> Option<String> {
        self.extractor.extract(output).or_else(|| options.resume_session_id.clone())
    }

    /// Normalize and trim accumulated output for the result.
    fn shape_output(raw: &str) -> String {
        let clean = strip_ansi(raw);
        let trimmed = clean.trim();
        if trimmed.is_empty() {
            "(no output)".to_owned()
        } else {
            trimmed.to_owned()
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("launch", &self.launch)
            .field("default_mode", &self.default_mode)
            .field("pty_available", &self.pty_available)
            .finish()
    }
}
