// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::{InputError, PendingInputRegistry};

const WAIT: Duration = Duration::from_secs(300);

#[tokio::test]
async fn registers_and_provides_input() {
    let registry = Arc::new(PendingInputRegistry::new());

    let waiter = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.wait_for_input("s1", "Allow file modification?", WAIT).await })
    };

    // Wait for the entry to become visible.
    while registry.get_pending("s1").is_none() {
        tokio::task::yield_now().await;
    }
    let pending = registry.get_pending("s1").expect("pending entry");
    assert_eq!(pending.question, "Allow file modification?");

    assert!(registry.provide_input("s1", "yes"));
    assert_eq!(waiter.await.expect("join"), Ok("yes".to_owned()));
    assert!(registry.get_pending("s1").is_none());
}

#[tokio::test]
async fn provide_without_registration_is_a_noop() {
    let registry = PendingInputRegistry::new();
    assert!(!registry.provide_input("nonexistent", "yes"));
    assert!(registry.list_pending().is_empty());
}

#[tokio::test]
async fn lists_pending_in_registration_order() {
    let registry = Arc::new(PendingInputRegistry::new());

    for (session, question) in [("s1", "Question 1?"), ("s2", "Question 2?")] {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.wait_for_input(session, question, WAIT).await });
    }
    while registry.list_pending().len() < 2 {
        tokio::task::yield_now().await;
    }

    let list = registry.list_pending();
    assert_eq!(list[0].session_id, "s1");
    assert_eq!(list[0].question, "Question 1?");
    assert_eq!(list[1].session_id, "s2");
    assert_eq!(list[1].question, "Question 2?");
}

#[tokio::test]
async fn cancel_rejects_and_removes() {
    let registry = Arc::new(PendingInputRegistry::new());

    let waiter = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.wait_for_input("s1", "Allow?", WAIT).await })
    };
    while registry.get_pending("s1").is_none() {
        tokio::task::yield_now().await;
    }

    assert!(registry.cancel("s1"));
    assert_eq!(waiter.await.expect("join"), Err(InputError::Cancelled));
    assert!(registry.get_pending("s1").is_none());
}

#[tokio::test]
async fn cancel_on_absent_session_returns_false() {
    let registry = PendingInputRegistry::new();
    assert!(!registry.cancel("missing"));
}

#[tokio::test]
async fn second_wait_supersedes_first() {
    let registry = Arc::new(PendingInputRegistry::new());

    let first = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.wait_for_input("s1", "Q1", WAIT).await })
    };
    while registry.get_pending("s1").is_none() {
        tokio::task::yield_now().await;
    }

    let second = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.wait_for_input("s1", "Q2", WAIT).await })
    };

    // The first waiter rejects with a superseded signal before the second
    // entry is observable.
    assert_eq!(first.await.expect("join"), Err(InputError::Superseded));

    while registry.get_pending("s1").map(|p| p.question) != Some("Q2".to_owned()) {
        tokio::task::yield_now().await;
    }

    assert!(registry.provide_input("s1", "ok"));
    assert_eq!(second.await.expect("join"), Ok("ok".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn times_out_at_the_deadline_and_not_before() {
    let registry = Arc::new(PendingInputRegistry::new());

    let waiter = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            registry.wait_for_input("s1", "Allow?", Duration::from_millis(500)).await
        })
    };
    while registry.get_pending("s1").is_none() {
        tokio::task::yield_now().await;
    }

    // Just before the deadline the wait must still be unsettled.
    tokio::time::advance(Duration::from_millis(499)).await;
    assert!(!waiter.is_finished());
    assert!(registry.get_pending("s1").is_some());

    tokio::time::advance(Duration::from_millis(2)).await;
    let outcome = waiter.await.expect("join");
    assert_eq!(
        outcome,
        Err(InputError::TimedOut {
            session_id: "s1".to_owned(),
            waited: Duration::from_millis(500)
        })
    );
    assert!(registry.get_pending("s1").is_none());
}

#[tokio::test(start_paused = true)]
async fn stale_timeout_does_not_remove_newer_entry() {
    let registry = Arc::new(PendingInputRegistry::new());

    let first = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            registry.wait_for_input("s1", "Q1", Duration::from_millis(100)).await
        })
    };
    while registry.get_pending("s1").is_none() {
        tokio::task::yield_now().await;
    }

    // Supersede with a longer-lived second question.
    let second = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            registry.wait_for_input("s1", "Q2", Duration::from_secs(60)).await
        })
    };
    assert_eq!(first.await.expect("join"), Err(InputError::Superseded));

    // Let the first question's timer fire; Q2 must survive it.
    tokio::time::advance(Duration::from_millis(200)).await;
    assert_eq!(registry.get_pending("s1").map(|p| p.question), Some("Q2".to_owned()));

    assert!(registry.provide_input("s1", "fine"));
    assert_eq!(second.await.expect("join"), Ok("fine".to_owned()));
}

#[tokio::test]
async fn timeout_message_names_budget_and_session() {
    let err = InputError::TimedOut {
        session_id: "abc".to_owned(),
        waited: Duration::from_millis(250),
    };
    assert_eq!(err.to_string(), "input timeout after 250ms for session abc");
}
