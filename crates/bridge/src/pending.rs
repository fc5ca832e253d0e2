// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide table of questions waiting for an externally supplied
//! answer, at most one live entry per session.
//!
//! The registry is constructed once by the entry point and shared by
//! reference; there is no hidden singleton. All table operations are
//! synchronous critical sections — only the caller of
//! [`PendingInputRegistry::wait_for_input`] suspends, on its own channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Why a wait settled without an answer. Callers discriminate: a superseded
/// question is expected control flow, a timeout or cancellation is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// A newer question for the same session replaced this one.
    Superseded,
    /// The wait was explicitly cancelled.
    Cancelled,
    /// No answer arrived within the allotted window.
    TimedOut { session_id: String, waited: Duration },
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Superseded => f.write_str("superseded by a newer input request"),
            Self::Cancelled => f.write_str("input cancelled"),
            Self::TimedOut { session_id, waited } => {
                write!(f, "input timeout after {}ms for session {session_id}", waited.as_millis())
            }
        }
    }
}

impl std::error::Error for InputError {}

/// Read-only view of one registered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    pub session_id: String,
    pub question: String,
    pub detected_at_ms: u64,
}

struct PendingEntry {
    question: String,
    detected_at_ms: u64,
    /// Identity of this registration; guards the timeout path against
    /// removing a newer entry stored under the same key.
    token: u64,
    answer_tx: oneshot::Sender<Result<String, InputError>>,
}

/// Table of pending questions keyed by session identifier, in registration
/// order.
pub struct PendingInputRegistry {
    table: Mutex<IndexMap<String, PendingEntry>>,
    next_token: AtomicU64,
}

impl Default for PendingInputRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingInputRegistry {
    pub fn new() -> Self {
        Self { table: Mutex::new(IndexMap::new()), next_token: AtomicU64::new(0) }
    }

    /// Register a question and wait for its answer.
    ///
    /// An existing entry for `session_id` is rejected with
    /// [`InputError::Superseded`] before the new entry is stored; the
    /// supersede-then-insert step is one critical section, so two
    /// near-simultaneous detections can never leave two resolvable entries.
    ///
    /// Settles by exactly one of: a matching [`provide_input`] call, a
    /// [`cancel`] call, or expiry of `timeout`.
    ///
    /// [`provide_input`]: Self::provide_input
    /// [`cancel`]: Self::cancel
    pub async fn wait_for_input(
        &self,
        session_id: &str,
        question: &str,
        timeout: Duration,
    ) -> Result<String, InputError> {
        let (answer_tx, mut answer_rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        {
            let mut table = self.table.lock();
            if let Some(old) = table.shift_remove(session_id) {
                let _ = old.answer_tx.send(Err(InputError::Superseded));
            }
            table.insert(
                session_id.to_owned(),
                PendingEntry {
                    question: question.to_owned(),
                    detected_at_ms: now_ms(),
                    token,
                    answer_tx,
                },
            );
        }

        match tokio::time::timeout(timeout, &mut answer_rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without settlement; treat as cancellation.
            Ok(Err(_closed)) => Err(InputError::Cancelled),
            Err(_elapsed) => {
                // An answer may have raced the timer; prefer it.
                if let Ok(outcome) = answer_rx.try_recv() {
                    return outcome;
                }
                let mut table = self.table.lock();
                if table.get(session_id).is_some_and(|e| e.token == token) {
                    table.shift_remove(session_id);
                }
                Err(InputError::TimedOut { session_id: session_id.to_owned(), waited: timeout })
            }
        }
    }

    /// Resolve the waiter for `session_id` with `answer`. Returns `false`
    /// (no side effect) when nothing is pending for that session.
    ///
    /// The entry is removed before the waiter can observe the outcome.
    pub fn provide_input(&self, session_id: &str, answer: &str) -> bool {
        let Some(entry) = self.table.lock().shift_remove(session_id) else {
            return false;
        };
        let _ = entry.answer_tx.send(Ok(answer.to_owned()));
        true
    }

    /// Reject and remove the waiter for `session_id`. Returns `false` when
    /// nothing is pending.
    pub fn cancel(&self, session_id: &str) -> bool {
        let Some(entry) = self.table.lock().shift_remove(session_id) else {
            return false;
        };
        let _ = entry.answer_tx.send(Err(InputError::Cancelled));
        true
    }

    /// Read-only lookup, no side effects.
    pub fn get_pending(&self, session_id: &str) -> Option<PendingQuestion> {
        self.table.lock().get(session_id).map(|entry| PendingQuestion {
            session_id: session_id.to_owned(),
            question: entry.question.clone(),
            detected_at_ms: entry.detected_at_ms,
        })
    }

    /// All pending questions in registration order.
    pub fn list_pending(&self) -> Vec<PendingQuestion> {
        self.table
            .lock()
            .iter()
            .map(|(session_id, entry)| PendingQuestion {
                session_id: session_id.clone(),
                question: entry.question.clone(),
                detected_at_ms: entry.detected_at_ms,
            })
            .collect()
    }
}

impl std::fmt::Debug for PendingInputRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingInputRegistry").field("pending", &self.table.lock().len()).finish()
    }
}

/// Milliseconds since the Unix epoch; clock errors collapse to zero.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
