//! `car dep add|list|remove` and `car ready` (spec §4.1, scenario 2).

use crate::prelude::*;

fn create(store: &Store, title: &str) -> String {
    store
        .railyard()
        .args(&["-o", "json", "car", "create", "--title", title, "--track", "backend"])
        .passes()
        .stdout_json()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn ready_returns_only_unblocked_items() {
    let store = Store::empty();
    let a = create(&store, "A");
    let b = create(&store, "B");

    store
        .railyard()
        .args(&["car", "dep", "add", &b, "--blocked-by", &a])
        .passes();

    let ready = store
        .railyard()
        .args(&["-o", "json", "car", "ready", "--track", "backend"])
        .passes()
        .stdout_json();
    let ids: Vec<&str> = ready.as_array().unwrap().iter().map(|v| v["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![a.as_str()]);
}

#[test]
fn ready_includes_dependent_once_blocker_is_done() {
    let store = Store::empty();
    let a = create(&store, "A");
    let b = create(&store, "B");
    store
        .railyard()
        .args(&["car", "dep", "add", &b, "--blocked-by", &a])
        .passes();

    // Drive A straight to done without going through the engine loop: the
    // status-transition chain open -> claimed -> in_progress -> done.
    store.railyard().args(&["car", "update", &a, "--status", "claimed"]).passes();
    store.railyard().args(&["car", "update", &a, "--status", "in_progress"]).passes();
    store.railyard().args(&["car", "update", &a, "--status", "done"]).passes();

    let ready = store
        .railyard()
        .args(&["-o", "json", "car", "ready", "--track", "backend"])
        .passes()
        .stdout_json();
    let ids: Vec<&str> = ready.as_array().unwrap().iter().map(|v| v["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![b.as_str()]);
}

#[test]
fn add_dep_rejects_a_cycle() {
    let store = Store::empty();
    let a = create(&store, "A");
    let b = create(&store, "B");

    store.railyard().args(&["car", "dep", "add", &b, "--blocked-by", &a]).passes();
    // a -> blocked_by -> b would close the loop a -> b -> a.
    store
        .railyard()
        .args(&["car", "dep", "add", &a, "--blocked-by", &b])
        .fails()
        .stderr_has("cycle");
}

#[test]
fn remove_dep_unblocks_a_ready_item() {
    let store = Store::empty();
    let a = create(&store, "A");
    let b = create(&store, "B");
    store.railyard().args(&["car", "dep", "add", &b, "--blocked-by", &a]).passes();

    store
        .railyard()
        .args(&["car", "dep", "remove", &b, "--blocked-by", &a])
        .passes();

    let ready = store
        .railyard()
        .args(&["-o", "json", "car", "ready", "--track", "backend"])
        .passes()
        .stdout_json();
    let ids: Vec<&str> = ready.as_array().unwrap().iter().map(|v| v["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&a.as_str()));
    assert!(ids.contains(&b.as_str()));
}
