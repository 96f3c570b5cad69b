//! `message send|ack|thread` and `inbox` (spec §4.3, §6.2).

use crate::prelude::*;

#[test]
fn direct_message_appears_in_recipient_inbox_until_acked() {
    let store = Store::empty();
    let sent = store
        .railyard()
        .args(&[
            "-o", "json", "message", "send", "--from", "engine-1", "--to", "engine-2",
            "--subject", "heads up", "hello there",
        ])
        .passes()
        .stdout_json();
    let id = sent["id"].as_str().unwrap().to_string();

    store
        .railyard()
        .args(&["inbox", "--agent", "engine-2"])
        .passes()
        .stdout_has("heads up");

    store.railyard().args(&["message", "ack", &id]).passes();

    store
        .railyard()
        .args(&["inbox", "--agent", "engine-2"])
        .passes()
        .stdout_lacks("heads up");
}

#[test]
fn broadcast_is_delivered_to_every_recipient_independently() {
    let store = Store::empty();
    store
        .railyard()
        .args(&[
            "message", "send", "--from", "supervisor", "--to", "*",
            "--subject", "pause", "pausing for maintenance",
        ])
        .passes();

    store
        .railyard()
        .args(&["inbox", "--agent", "engine-1"])
        .passes()
        .stdout_has("pause");
    store
        .railyard()
        .args(&["inbox", "--agent", "engine-2"])
        .passes()
        .stdout_has("pause");
}

#[test]
fn broadcast_ack_is_per_recipient_not_global() {
    let store = Store::empty();
    let sent = store
        .railyard()
        .args(&["-o", "json", "message", "send", "--from", "supervisor", "--to", "*", "--subject", "pause", "body"])
        .passes()
        .stdout_json();
    let id = sent["id"].as_str().unwrap().to_string();

    store
        .railyard()
        .args(&["message", "ack", &id, "--agent", "engine-1"])
        .passes();

    store
        .railyard()
        .args(&["inbox", "--agent", "engine-1"])
        .passes()
        .stdout_lacks("pause");
    store
        .railyard()
        .args(&["inbox", "--agent", "engine-2"])
        .passes()
        .stdout_has("pause");
}

#[test]
fn thread_collects_every_message_sharing_a_thread_id() {
    let store = Store::empty();
    store
        .railyard()
        .args(&["message", "send", "--from", "a", "--to", "b", "--subject", "q1", "--thread", "t-1", "first"])
        .passes();
    store
        .railyard()
        .args(&["message", "send", "--from", "b", "--to", "a", "--subject", "re: q1", "--thread", "t-1", "second"])
        .passes();
    store
        .railyard()
        .args(&["message", "send", "--from", "c", "--to", "a", "--subject", "unrelated", "--thread", "t-2", "third"])
        .passes();

    let stdout = store.railyard().args(&["message", "thread", "t-1"]).passes().stdout();
    assert!(stdout.contains("q1"));
    assert!(stdout.contains("re: q1"));
    assert!(!stdout.contains("unrelated"));
}
