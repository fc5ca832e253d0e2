// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// How tool permissions are handled for a run.
///
/// - `Autonomous`: every tool is pre-approved and the CLI never blocks on a
///   question.
/// - `Interactive`: the CLI runs under a pseudo-terminal and its permission
///   questions are relayed to the caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    #[default]
    Autonomous,
    Interactive,
}

impl PermissionMode {
    /// Total parse: anything other than `interactive` (case-insensitive)
    /// falls back to `Autonomous`. Malformed settings must not crash mode
    /// selection.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("interactive") {
            Self::Interactive
        } else {
            Self::Autonomous
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::Interactive => "interactive",
        }
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stdio bridge exposing the Copilot CLI as remotely invocable tools.
#[derive(Debug, Parser)]
#[command(name = "copilot-bridge", version, about)]
pub struct Config {
    /// Default permission mode (autonomous or interactive).
    #[arg(long, env = "COPILOT_PERMISSION_MODE", default_value = "autonomous")]
    pub permission_mode: String,

    /// Path to the Copilot CLI executable (skips discovery).
    #[arg(long, env = "COPILOT_CLI_PATH")]
    pub copilot_path: Option<PathBuf>,

    /// Node runtime used to launch shebang-script installs of the CLI.
    #[arg(long, env = "COPILOT_NODE_PATH")]
    pub node_path: Option<PathBuf>,

    /// Directory for session metadata persistence.
    #[arg(long, env = "COPILOT_SESSIONS_DIR")]
    pub sessions_dir: Option<PathBuf>,

    /// Terminal columns for interactive runs.
    #[arg(long, env = "COPILOT_COLS", default_value = "120")]
    pub cols: u16,

    /// Terminal rows for interactive runs.
    #[arg(long, env = "COPILOT_ROWS", default_value = "40")]
    pub rows: u16,

    /// Log format (json or text).
    #[arg(long, env = "COPILOT_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "COPILOT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    // -- Duration overrides (skip from CLI; set in Config::test()) --------
    /// Overall run timeout in ms.
    #[clap(skip)]
    pub run_timeout_ms: Option<u64>,
    /// Grace window between terminate and kill in ms.
    #[clap(skip)]
    pub kill_grace_ms: Option<u64>,
    /// Interactive output poll interval in ms.
    #[clap(skip)]
    pub poll_interval_ms: Option<u64>,
    /// Consecutive unchanged polls before the detector runs.
    #[clap(skip)]
    pub stable_polls: Option<u32>,
}

impl Config {
    /// Process-wide default mode; a per-call override wins over this.
    pub fn default_mode(&self) -> PermissionMode {
        PermissionMode::parse(&self.permission_mode)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms.unwrap_or(300_000))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms.unwrap_or(5_000))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(250))
    }

    /// Quiescence threshold: with the default 250ms poll, 4 unchanged polls
    /// is roughly one second of output silence.
    pub fn stable_polls(&self) -> u32 {
        self.stable_polls.unwrap_or(4)
    }

    /// Config with defaults for tests, bypassing CLI parsing.
    pub fn test() -> Self {
        Self {
            permission_mode: "autonomous".to_owned(),
            copilot_path: None,
            node_path: None,
            sessions_dir: None,
            cols: 120,
            rows: 40,
            log_format: "text".to_owned(),
            log_level: "info".to_owned(),
            run_timeout_ms: None,
            kill_grace_ms: None,
            poll_interval_ms: None,
            stable_polls: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
