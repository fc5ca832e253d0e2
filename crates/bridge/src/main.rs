// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use copilot_bridge::config::Config;
use copilot_bridge::driver::{Runner, Tuning};
use copilot_bridge::locate::{find_copilot_path, resolve_launch};
use copilot_bridge::pending::PendingInputRegistry;
use copilot_bridge::server::{serve, ServerState};
use copilot_bridge::store::SessionStore;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout is reserved for the protocol.
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let copilot_path = find_copilot_path(&config);
    let launch = resolve_launch(&copilot_path, &config);
    info!(program = %launch.program, "copilot launch resolved");

    let registry = Arc::new(PendingInputRegistry::new());
    let runner = Runner::new(
        launch,
        registry,
        Tuning::from_config(&config),
        config.default_mode(),
        cfg!(unix),
    )?;

    let sessions_dir = config.sessions_dir.clone().unwrap_or_else(default_sessions_dir);
    let store = SessionStore::open(&sessions_dir);

    let state = Arc::new(ServerState::new(runner, store));
    serve(state).await
}

fn default_sessions_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".copilot-bridge")
}
