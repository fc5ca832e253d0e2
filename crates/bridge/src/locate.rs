// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery of the Copilot CLI executable and of how to launch it.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::Config;

/// Fully resolved launch recipe: `program` is executed with `arg_prefix`
/// prepended to the run's own arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub arg_prefix: Vec<String>,
}

impl LaunchCommand {
    /// Assemble the final argv: prefix first, then the run's arguments.
    pub fn argv(&self, args: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(1 + self.arg_prefix.len() + args.len());
        argv.push(self.program.clone());
        argv.extend(self.arg_prefix.iter().cloned());
        argv.extend(args.iter().cloned());
        argv
    }
}

const KNOWN_PATHS: &[&str] =
    &["/opt/homebrew/bin/copilot", "/usr/local/bin/copilot", "/usr/bin/copilot"];

/// Locate the Copilot CLI executable.
///
/// Order: explicit config/env override, well-known install paths, `which`,
/// the gh-managed install dir, then plain `copilot` as a last resort (the
/// spawn will fail with a useful error if even that is absent).
pub fn find_copilot_path(config: &Config) -> PathBuf {
    if let Some(ref path) = config.copilot_path {
        if path.exists() {
            return path.clone();
        }
        debug!(path = %path.display(), "configured copilot path does not exist; discovering");
    }

    for candidate in KNOWN_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            return path.to_path_buf();
        }
    }

    if let Some(path) = which_copilot() {
        return path;
    }

    if let Ok(home) = std::env::var("HOME") {
        let gh_path = Path::new(&home).join(".local/share/gh/copilot");
        if gh_path.exists() {
            return gh_path;
        }
    }

    PathBuf::from("copilot")
}

fn which_copilot() -> Option<PathBuf> {
    let output = Command::new("which").arg("copilot").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let found = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    if found.is_empty() {
        return None;
    }
    let path = PathBuf::from(found);
    path.exists().then_some(path)
}

/// Decide how to launch the located executable.
///
/// npm installs of the CLI are node shebang scripts; under a restricted
/// PATH the `#!/usr/bin/env node` line fails with ENOENT, so those are
/// launched through a node runtime with the script as the first argument.
/// Native binaries launch directly.
pub fn resolve_launch(copilot_path: &Path, config: &Config) -> LaunchCommand {
    let path_str = copilot_path.to_string_lossy().into_owned();
    if is_node_script(copilot_path) {
        LaunchCommand { program: node_runtime(config), arg_prefix: vec![path_str] }
    } else {
        LaunchCommand { program: path_str, arg_prefix: Vec::new() }
    }
}

/// True when the file's first line is a shebang naming `node`.
fn is_node_script(path: &Path) -> bool {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return false;
    };
    let first_line = contents.lines().next().unwrap_or_default();
    first_line.starts_with("#!")
        && first_line.split(|c: char| !c.is_alphanumeric()).any(|word| word == "node")
}

fn node_runtime(config: &Config) -> String {
    match config.node_path {
        Some(ref path) => path.to_string_lossy().into_owned(),
        None => "node".to_owned(),
    }
}

#[cfg(test)]
#[path = "locate_tests.rs"]
mod tests;
