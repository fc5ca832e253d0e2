// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalization of raw terminal output.

use std::sync::OnceLock;

use regex::Regex;

/// Covers CSI and two-byte escape sequences as emitted by the agent CLI
/// (colors, cursor movement, erase). Not a full vt parser.
const ESCAPE_PATTERN: &str =
    r"[\u{1b}\u{9b}][\[()#;?]*(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-ORZcf-nqry=><]";

fn escape_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ESCAPE_PATTERN).ok()).as_ref()
}

/// Strip terminal escape sequences, preserving all other characters and
/// their order. Pure and total; unknown bytes pass through untouched.
pub fn strip_ansi(text: &str) -> String {
    match escape_re() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_owned(),
    }
}

#[cfg(test)]
#[path = "ansi_tests.rs"]
mod tests;
