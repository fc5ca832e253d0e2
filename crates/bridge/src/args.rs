// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Copilot CLI argument construction.

use crate::config::PermissionMode;
use crate::driver::RunOptions;

/// Build the CLI argument list for one run. The caller appends this after
/// the resolved launch command and its prefix.
pub fn build_args(options: &RunOptions, mode: PermissionMode) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(ref session_id) = options.resume_session_id {
        args.push("--resume".to_owned());
        args.push(session_id.clone());
    }
    args.push("-p".to_owned());
    args.push(options.prompt.clone());

    // Silent mode: response only, no usage statistics.
    args.push("-s".to_owned());

    if let Some(ref model) = options.model {
        args.push("--model".to_owned());
        args.push(model.clone());
    }

    match mode {
        PermissionMode::Autonomous => {
            if options.allow_all_tools {
                args.push("--allow-all-tools".to_owned());
            }
            for tool in &options.allow_tools {
                args.push("--allow-tool".to_owned());
                args.push(tool.clone());
            }
            if options.no_ask_user {
                args.push("--no-ask-user".to_owned());
            }
        }
        PermissionMode::Interactive => {
            // Allow-listed tools only; ask_user stays enabled so the CLI
            // can put questions to the terminal.
            for tool in &options.allow_tools {
                args.push("--allow-tool".to_owned());
                args.push(tool.clone());
            }
        }
    }

    // The CLI has no --cwd flag; grant directory access instead.
    if let Some(ref cwd) = options.cwd {
        let cwd = cwd.to_string_lossy().into_owned();
        if !options.add_dirs.contains(&cwd) {
            args.push("--add-dir".to_owned());
            args.push(cwd);
        }
    }
    for dir in &options.add_dirs {
        args.push("--add-dir".to_owned());
        args.push(dir.clone());
    }

    // Keep the host project's instruction files out of delegated runs.
    args.push("--no-custom-instructions".to_owned());
    args.push("--no-color".to_owned());
    args.push("--no-alt-screen".to_owned());

    args
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
