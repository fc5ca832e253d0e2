// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use super::{list_cli_sessions, SessionStore};

#[test]
fn register_then_reopen_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SessionStore::open(dir.path());
    store.register("abc-123", "fix the parser", Some("gpt-5"), Some(Path::new("/tmp/work")));

    let reopened = SessionStore::open(dir.path());
    let meta = reopened.get("abc-123").unwrap();
    assert_eq!(meta.session_id, "abc-123");
    assert_eq!(meta.initial_prompt, "fix the parser");
    assert_eq!(meta.model.as_deref(), Some("gpt-5"));
    assert_eq!(meta.cwd.as_deref(), Some("/tmp/work"));
    assert_eq!(meta.created_at_ms, meta.last_used_at_ms);
}

#[test]
fn registering_a_known_session_keeps_its_first_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SessionStore::open(dir.path());
    store.register("s1", "first prompt", None, None);
    store.register("s1", "second prompt", None, None);
    assert_eq!(store.get("s1").unwrap().initial_prompt, "first prompt");
    assert_eq!(store.list().len(), 1);
}

#[test]
fn long_prompts_are_truncated_with_ellipsis() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SessionStore::open(dir.path());
    let long = "x".repeat(500);
    store.register("s1", &long, None, None);
    let stored = &store.get("s1").unwrap().initial_prompt;
    assert_eq!(stored.chars().count(), 203);
    assert!(stored.ends_with("..."));
}

#[test]
fn corrupt_index_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sessions.json"), "{not json").unwrap();
    let store = SessionStore::open(dir.path());
    assert!(store.list().is_empty());
}

#[test]
fn touch_is_a_noop_for_unknown_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SessionStore::open(dir.path());
    store.touch("ghost");
    assert!(store.list().is_empty());
    assert!(!dir.path().join("sessions.json").exists());
}

#[test]
fn cli_sessions_keeps_only_uuid_directories() {
    let dir = tempfile::tempdir().unwrap();
    let keep = "123e4567-e89b-42d3-a456-426614174000";
    std::fs::create_dir(dir.path().join(keep)).unwrap();
    std::fs::create_dir(dir.path().join("not-a-session")).unwrap();
    std::fs::write(dir.path().join("stray.log"), "x").unwrap();

    let found = list_cli_sessions(dir.path());
    assert_eq!(found, vec![keep.to_owned()]);
}

#[test]
fn missing_state_dir_lists_nothing() {
    assert!(list_cli_sessions(Path::new("/nonexistent/copilot-state")).is_empty());
}
