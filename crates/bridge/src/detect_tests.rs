// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::QuestionDetector;

fn detector() -> QuestionDetector {
    QuestionDetector::new().expect("rules compile")
}

#[yare::parameterized(
    bracket_upper = { "Allow file write? [Y/n]", "yes_no_suffix" },
    bracket_lower = { "Allow file write? [y/N]", "yes_no_suffix" },
    paren_lower = { "Proceed? (y/n)", "yes_no_suffix" },
    paren_upper = { "Proceed? (Y/N)", "yes_no_suffix" },
    trailing_space = { "Allow file write? (y/N)   ", "yes_no_suffix" },
    allow_verb = { "Allow access to /etc/hosts?", "permission_verb" },
    do_you_want = { "Do you want me to continue?", "permission_verb" },
    would_you_like = { "Would you like to apply the patch?", "permission_verb" },
    shall_i = { "Shall I proceed with the change?", "permission_verb" },
    may_i = { "May I read this directory?", "permission_verb" },
    modify_verb = { "Okay to modify src/main.rs?", "mutating_verb" },
    delete_verb = { "This will delete 3 files. Continue to remove them?", "mutating_verb" },
    execute_verb = { "Execute `git push --force`?", "mutating_verb" },
)]
fn matches_prompt(line: &str, expected_rule: &str) {
    let output = format!("some earlier output\n{line}");
    let (rule, question) = detector().detect_with_rule(&output).expect("should match");
    assert_eq!(rule, expected_rule);
    assert_eq!(question, line.trim());
}

#[yare::parameterized(
    plain_statement = { "Done. 3 files changed." },
    question_without_verbs = { "What is the meaning of this value?" },
    indicator_mid_line = { "Allow? [y/N] was answered already, moving on" },
    empty = { "" },
)]
fn ignores_non_prompts(line: &str) {
    assert_eq!(detector().detect(line), None);
}

#[test]
fn only_trailing_line_is_considered() {
    // A question mark in historical output must not fire on later output.
    let output = "Allow file write? (y/N)\ny\nwrote 3 files\nall done";
    assert_eq!(detector().detect(output), None);
}

#[test]
fn trailing_blank_lines_are_skipped() {
    let output = "working...\nAllow file write? (y/N)\n\n   \n";
    assert_eq!(detector().detect(output).as_deref(), Some("Allow file write? (y/N)"));
}

#[test]
fn first_matching_rule_wins() {
    // Matches both yes_no_suffix and permission_verb; rule order decides.
    let output = "Do you want to proceed? (y/N)";
    let (rule, _) = detector().detect_with_rule(output).expect("should match");
    assert_eq!(rule, "yes_no_suffix");
}

#[test]
fn rules_are_exposed_in_order() {
    let det = detector();
    let names: Vec<&str> = det.rules().iter().map(|r| r.name).collect();
    assert_eq!(names, ["yes_no_suffix", "permission_verb", "mutating_verb"]);
}

#[test]
fn individual_rule_matching() {
    let det = detector();
    let yes_no = &det.rules()[0];
    assert!(yes_no.matches("Continue? [y/N]"));
    assert!(!yes_no.matches("Continue?"));
}
