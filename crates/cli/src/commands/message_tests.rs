// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use railyard_core::{FakeClock, SequentialIdGen};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Store {
    Store::with_clock_and_ids(
        dir.path(),
        "acme",
        "railyard",
        "main",
        Box::new(FakeClock::new(1_000)),
        Box::new(SequentialIdGen::new("id")),
    )
    .unwrap()
}

#[test]
fn send_then_inbox_then_ack() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    send(
        &store,
        SendArgs {
            from: "e1".to_string(),
            to: "e2".to_string(),
            subject: "merge_conflict".to_string(),
            body: "need a hand".to_string(),
            priority: CliPriority::Urgent,
            thread: None,
            car: None,
        },
        OutputFormat::Text,
    )
    .unwrap();

    inbox(
        &store,
        InboxArgs {
            agent: "e2".to_string(),
        },
        OutputFormat::Text,
    )
    .unwrap();

    let msgs = store.inbox("e2").unwrap();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].subject, "merge_conflict");
    assert!(!msgs[0].acknowledged);

    ack(
        &store,
        AckArgs {
            id: msgs[0].id.to_string(),
            agent: None,
        },
    )
    .unwrap();

    assert!(store.inbox("e2").unwrap().is_empty());
}

#[test]
fn broadcast_ack_requires_agent() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    send(
        &store,
        SendArgs {
            from: "supervisor".to_string(),
            to: railyard_core::BROADCAST_RECIPIENT.to_string(),
            subject: "pause".to_string(),
            body: "pausing all engines".to_string(),
            priority: CliPriority::Normal,
            thread: None,
            car: None,
        },
        OutputFormat::Text,
    )
    .unwrap();

    let msg = store.inbox("e1").unwrap().remove(0);

    ack(
        &store,
        AckArgs {
            id: msg.id.to_string(),
            agent: Some("e1".to_string()),
        },
    )
    .unwrap();

    assert!(store.inbox("e1").unwrap().is_empty());
    assert!(!store.inbox("e2").unwrap().is_empty());
}

#[test]
fn thread_lists_every_message_sharing_a_thread_id() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    send(
        &store,
        SendArgs {
            from: "e1".to_string(),
            to: "e2".to_string(),
            subject: "question".to_string(),
            body: "first".to_string(),
            priority: CliPriority::Normal,
            thread: Some("t1".to_string()),
            car: None,
        },
        OutputFormat::Text,
    )
    .unwrap();
    send(
        &store,
        SendArgs {
            from: "e2".to_string(),
            to: "e1".to_string(),
            subject: "re: question".to_string(),
            body: "second".to_string(),
            priority: CliPriority::Normal,
            thread: Some("t1".to_string()),
            car: None,
        },
        OutputFormat::Text,
    )
    .unwrap();

    thread(
        &store,
        ThreadArgs {
            id: "t1".to_string(),
        },
        OutputFormat::Text,
    )
    .unwrap();

    assert_eq!(
        store.thread(&railyard_core::ThreadId::new("t1")).unwrap().len(),
        2
    );
}
