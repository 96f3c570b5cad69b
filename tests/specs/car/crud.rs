//! `car create|list|show|update|publish` (spec §4.1, §6.2).

use crate::prelude::*;

#[test]
fn create_derives_branch_and_default_status() {
    let store = Store::empty();
    let json = store
        .railyard()
        .args(&["-o", "json", "car", "create", "--title", "wire up retries", "--track", "backend"])
        .passes()
        .stdout_json();

    assert_eq!(json["status"], "open");
    assert_eq!(json["priority"], 2);
    assert_eq!(json["track"], "backend");
    assert_eq!(json["branch"], "railyard/acme/backend/".to_string() + json["id"].as_str().unwrap());
}

#[test]
fn create_rejects_out_of_range_priority() {
    let store = Store::empty();
    store
        .railyard()
        .args(&["car", "create", "--title", "x", "--track", "backend", "--priority", "9"])
        .fails()
        .stderr_has("priority");
}

#[test]
fn create_without_track_or_parent_is_rejected() {
    let store = Store::empty();
    store
        .railyard()
        .args(&["car", "create", "--title", "x"])
        .fails()
        .stderr_has("--track");
}

#[test]
fn create_draft_inherits_track_from_parent_and_stays_draft() {
    let store = Store::empty();
    let epic = store
        .railyard()
        .args(&["-o", "json", "car", "create", "--title", "epic", "--track", "backend", "--type", "epic", "--draft"])
        .passes()
        .stdout_json();
    let epic_id = epic["id"].as_str().unwrap();

    let child = store
        .railyard()
        .args(&["-o", "json", "car", "create", "--title", "child", "--parent", epic_id])
        .passes()
        .stdout_json();

    assert_eq!(child["status"], "draft");
    assert_eq!(child["track"], "backend");
}

#[test]
fn publish_recursive_opens_draft_descendants() {
    let store = Store::empty();
    let epic = store
        .railyard()
        .args(&["-o", "json", "car", "create", "--title", "epic", "--track", "backend", "--type", "epic", "--draft"])
        .passes()
        .stdout_json();
    let epic_id = epic["id"].as_str().unwrap().to_string();

    let child = store
        .railyard()
        .args(&["-o", "json", "car", "create", "--title", "child", "--parent", &epic_id])
        .passes()
        .stdout_json();
    let child_id = child["id"].as_str().unwrap().to_string();

    store
        .railyard()
        .args(&["car", "publish", &epic_id, "--recursive"])
        .passes();

    let reloaded = store
        .railyard()
        .args(&["-o", "json", "car", "show", &child_id])
        .passes()
        .stdout_json();
    assert_eq!(reloaded["status"], "open");
}

#[test]
fn update_rejects_an_invalid_status_transition() {
    let store = Store::empty();
    let item = store
        .railyard()
        .args(&["-o", "json", "car", "create", "--title", "x", "--track", "backend"])
        .passes()
        .stdout_json();
    let id = item["id"].as_str().unwrap();

    // open -> done is not a valid direct transition (spec §4.1).
    store
        .railyard()
        .args(&["car", "update", id, "--status", "done"])
        .fails();
}

#[test]
fn cancel_is_idempotent() {
    let store = Store::empty();
    let item = store
        .railyard()
        .args(&["-o", "json", "car", "create", "--title", "x", "--track", "backend"])
        .passes()
        .stdout_json();
    let id = item["id"].as_str().unwrap();

    store.railyard().args(&["car", "update", id, "--status", "cancelled"]).passes();
    // Second call is a no-op, not an error (spec §8 round-trip laws).
    store.railyard().args(&["car", "update", id, "--status", "cancelled"]).passes();
}

#[test]
fn list_filters_by_track_and_status() {
    let store = Store::empty();
    store.railyard().args(&["car", "create", "--title", "backend work", "--track", "backend"]).passes();
    store.railyard().args(&["car", "create", "--title", "frontend work", "--track", "frontend"]).passes();

    store
        .railyard()
        .args(&["car", "list", "--track", "backend"])
        .passes()
        .stdout_has("backend work")
        .stdout_lacks("frontend work");
}
