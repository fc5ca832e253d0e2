// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::{Config, PermissionMode};

#[yare::parameterized(
    interactive = { "interactive", PermissionMode::Interactive },
    interactive_upper = { "INTERACTIVE", PermissionMode::Interactive },
    interactive_mixed = { "Interactive", PermissionMode::Interactive },
    interactive_padded = { "  interactive ", PermissionMode::Interactive },
    autonomous = { "autonomous", PermissionMode::Autonomous },
    empty = { "", PermissionMode::Autonomous },
    garbage = { "yolo-mode", PermissionMode::Autonomous },
)]
fn permission_mode_parse(input: &str, expected: PermissionMode) {
    assert_eq!(PermissionMode::parse(input), expected);
}

#[test]
fn default_mode_is_autonomous() {
    let config = Config::test();
    assert_eq!(config.default_mode(), PermissionMode::Autonomous);
}

#[test]
fn malformed_default_mode_falls_back() {
    let mut config = Config::test();
    config.permission_mode = "???".to_owned();
    assert_eq!(config.default_mode(), PermissionMode::Autonomous);
}

#[test]
fn duration_defaults() {
    let config = Config::test();
    assert_eq!(config.run_timeout().as_millis(), 300_000);
    assert_eq!(config.kill_grace().as_millis(), 5_000);
    assert_eq!(config.poll_interval().as_millis(), 250);
    assert_eq!(config.stable_polls(), 4);
}

#[test]
fn duration_overrides() {
    let mut config = Config::test();
    config.run_timeout_ms = Some(100);
    config.kill_grace_ms = Some(10);
    config.poll_interval_ms = Some(25);
    config.stable_polls = Some(2);
    assert_eq!(config.run_timeout().as_millis(), 100);
    assert_eq!(config.kill_grace().as_millis(), 10);
    assert_eq!(config.poll_interval().as_millis(), 25);
    assert_eq!(config.stable_polls(), 2);
}

#[test]
#[serial_test::serial]
fn parses_mode_from_environment() {
    std::env::set_var("COPILOT_PERMISSION_MODE", "Interactive");
    let config = Config::parse_from(["copilot-bridge"]);
    assert_eq!(config.default_mode(), PermissionMode::Interactive);
    std::env::remove_var("COPILOT_PERMISSION_MODE");

    let config = Config::parse_from(["copilot-bridge"]);
    assert_eq!(config.default_mode(), PermissionMode::Autonomous);
}
