// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier extraction from accumulated CLI output.

use std::sync::OnceLock;

use regex::Regex;

const UUID_PATTERN: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

/// Whether `value` is exactly a UUID-shaped identifier.
pub fn is_uuid(value: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("(?i)^{UUID_PATTERN}$")).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

/// Mines CLI output for the session identifier the CLI logs about itself.
pub struct SessionIdExtractor {
    patterns: Vec<Regex>,
}

impl SessionIdExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let patterns = vec![
            Regex::new(&format!(r"(?i)session id[:\s]+({UUID_PATTERN})"))?,
            Regex::new(&format!(r"(?i)session[_-]state/({UUID_PATTERN})"))?,
        ];
        Ok(Self { patterns })
    }

    /// First UUID found via the session-log patterns, byte-identical to how
    /// it appeared in the output.
    pub fn extract(&self, output: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(output))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
    }
}

impl std::fmt::Debug for SessionIdExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdExtractor").field("patterns", &self.patterns.len()).finish()
    }
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
