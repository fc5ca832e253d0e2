// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heuristic detection of permission questions in normalized CLI output.
//!
//! The agent CLI asks for confirmation in free text, so this is approximate
//! parsing by construction: genuine prompts can be missed and ordinary
//! output ending in a question mark can fire. Only the trailing non-blank
//! line is ever considered a candidate, which keeps question marks in
//! historical output from triggering on later unrelated writes.

use regex::Regex;

/// One ordered match rule. Rules are data so each can be exercised on its
/// own, independent of live process output.
pub struct QuestionRule {
    pub name: &'static str,
    pattern: Regex,
}

impl QuestionRule {
    fn compile(name: &'static str, pattern: &str) -> anyhow::Result<Self> {
        Ok(Self { name, pattern: Regex::new(pattern)? })
    }

    /// Whether a single trimmed line matches this rule.
    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }
}

impl std::fmt::Debug for QuestionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Ordered rule set; first match wins.
#[derive(Debug)]
pub struct QuestionDetector {
    rules: Vec<QuestionRule>,
}

impl QuestionDetector {
    pub fn new() -> anyhow::Result<Self> {
        let rules = vec![
            // Trailing yes/no indicator: "... ? [Y/n]", "(y/N)" and case variants.
            QuestionRule::compile("yes_no_suffix", r"(?i)\?\s*(?:\[y/n\]|\(y/n\))\s*$")?,
            // Explicit permission-request verb, line ends in a question mark.
            QuestionRule::compile(
                "permission_verb",
                r"(?i)\b(?:allow|permit|do you want|would you like|shall i|can i|may i)\b.*\?\s*$",
            )?,
            // Mutating-action verb, line ends in a question mark.
            QuestionRule::compile(
                "mutating_verb",
                r"(?i)\b(?:modify|edit|write|delete|remove|execute|run|create)\b.*\?\s*$",
            )?,
        ];
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[QuestionRule] {
        &self.rules
    }

    /// Return the trailing line of `output` when it reads like an unanswered
    /// yes/no or permission prompt. `output` is expected to be normalized
    /// (escape sequences already stripped).
    pub fn detect(&self, output: &str) -> Option<String> {
        let line = output.lines().rev().find(|l| !l.trim().is_empty())?;
        let candidate = line.trim();
        self.rules.iter().find(|rule| rule.matches(candidate)).map(|_| candidate.to_owned())
    }

    /// Like [`detect`](Self::detect), also naming the rule that fired.
    pub fn detect_with_rule(&self, output: &str) -> Option<(&'static str, String)> {
        let line = output.lines().rev().find(|l| !l.trim().is_empty())?;
        let candidate = line.trim();
        self.rules
            .iter()
            .find(|rule| rule.matches(candidate))
            .map(|rule| (rule.name, candidate.to_owned()))
    }
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod tests;
