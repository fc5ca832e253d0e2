// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local record of sessions started through this bridge.
//!
//! The store is advisory: the CLI owns the real session state under
//! `~/.copilot/session-state`, this file only remembers which of those
//! sessions we created and what they were for. Load and save are
//! best-effort; a corrupt or missing file means an empty store, never a
//! failed run.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::driver::extract::is_uuid;
use crate::pending::now_ms;

const STORE_FILE: &str = "sessions.json";

/// What we remember about one session we started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub created_at_ms: u64,
    pub last_used_at_ms: u64,
    /// First prompt of the session, truncated for display.
    pub initial_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

const PROMPT_PREVIEW_LEN: usize = 200;

fn preview(prompt: &str) -> String {
    if prompt.chars().count() <= PROMPT_PREVIEW_LEN {
        prompt.to_owned()
    } else {
        let cut: String = prompt.chars().take(PROMPT_PREVIEW_LEN).collect();
        format!("{cut}...")
    }
}

/// On-disk session index, keyed by session id.
pub struct SessionStore {
    path: PathBuf,
    sessions: IndexMap<String, SessionMetadata>,
}

impl SessionStore {
    /// Open the store under `dir`, reading any existing index.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(STORE_FILE);
        let sessions = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<SessionMetadata>>(&contents) {
                Ok(list) => list.into_iter().map(|m| (m.session_id.clone(), m)).collect(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable session index; starting empty");
                    IndexMap::new()
                }
            },
            Err(_) => IndexMap::new(),
        };
        debug!(path = %path.display(), count = sessions.len(), "session store opened");
        Self { path, sessions }
    }

    /// Record a newly observed session, or refresh it if already known.
    pub fn register(
        &mut self,
        session_id: &str,
        prompt: &str,
        model: Option<&str>,
        cwd: Option<&Path>,
    ) {
        let now = now_ms();
        match self.sessions.get_mut(session_id) {
            Some(existing) => existing.last_used_at_ms = now,
            None => {
                self.sessions.insert(
                    session_id.to_owned(),
                    SessionMetadata {
                        session_id: session_id.to_owned(),
                        created_at_ms: now,
                        last_used_at_ms: now,
                        initial_prompt: preview(prompt),
                        model: model.map(str::to_owned),
                        cwd: cwd.map(|p| p.display().to_string()),
                    },
                );
            }
        }
        self.save();
    }

    /// Bump the last-used timestamp of a known session.
    pub fn touch(&mut self, session_id: &str) {
        if let Some(meta) = self.sessions.get_mut(session_id) {
            meta.last_used_at_ms = now_ms();
            self.save();
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionMetadata> {
        self.sessions.get(session_id)
    }

    /// All known sessions, most recently used first.
    pub fn list(&self) -> Vec<SessionMetadata> {
        let mut list: Vec<SessionMetadata> = self.sessions.values().cloned().collect();
        list.sort_by(|a, b| b.last_used_at_ms.cmp(&a.last_used_at_ms));
        list
    }

    fn save(&self) {
        let list: Vec<&SessionMetadata> = self.sessions.values().collect();
        let contents = match serde_json::to_string_pretty(&list) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "session index not serializable");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&self.path, contents) {
            warn!(path = %self.path.display(), error = %e, "session index not saved");
        }
    }
}

/// Session ids the CLI itself has on disk, newest first by modification
/// time. These exist whether or not this bridge started them.
pub fn list_cli_sessions(state_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(state_dir) else {
        return Vec::new();
    };
    let mut found: Vec<(std::time::SystemTime, String)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_uuid(&name) {
                return None;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            Some((modified, name))
        })
        .collect();
    found.sort_by(|a, b| b.0.cmp(&a.0));
    found.into_iter().map(|(_, name)| name).collect()
}

/// Default location of the CLI's own session state.
pub fn cli_state_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".copilot")
        .join("session-state")
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
