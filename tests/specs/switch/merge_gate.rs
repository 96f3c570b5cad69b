//! `switch` (spec §4.8 Merge Gate, §8 idempotence law).

use crate::prelude::*;

fn create_car(store: &Store, repo: &Repo) -> (String, String) {
    let item = store
        .railyard()
        .pwd(repo.path())
        .args(&["-o", "json", "car", "create", "--title", "ship it", "--track", "backend"])
        .passes()
        .stdout_json();
    let id = item["id"].as_str().unwrap().to_string();
    let branch = item["branch"].as_str().unwrap().to_string();
    (id, branch)
}

#[test]
fn switch_fast_forwards_the_base_branch() {
    let repo = Repo::init();
    let store = Store::empty();
    let (id, branch) = create_car(&store, &repo);

    repo.checkout_new_branch(&branch);
    repo.commit_file("feature.txt", "added\n");
    repo.checkout("main");

    store
        .railyard()
        .pwd(repo.path())
        .args(&["switch", &id])
        .passes()
        .stdout_has("merged into main");

    assert!(repo.file_in_branch("main", "feature.txt"));
}

#[test]
fn switch_is_idempotent_once_already_merged() {
    let repo = Repo::init();
    let store = Store::empty();
    let (id, branch) = create_car(&store, &repo);

    repo.checkout_new_branch(&branch);
    repo.commit_file("feature.txt", "added\n");
    repo.checkout("main");

    store.railyard().pwd(repo.path()).args(&["switch", &id]).passes();
    store
        .railyard()
        .pwd(repo.path())
        .args(&["switch", &id])
        .passes()
        .stdout_has("already merged");
}

#[test]
fn switch_dry_run_never_moves_the_base_branch() {
    let repo = Repo::init();
    let store = Store::empty();
    let (id, branch) = create_car(&store, &repo);

    repo.checkout_new_branch(&branch);
    repo.commit_file("feature.txt", "added\n");
    repo.checkout("main");

    store
        .railyard()
        .pwd(repo.path())
        .args(&["switch", &id, "--dry-run"])
        .passes();

    assert!(!repo.file_in_branch("main", "feature.txt"));
}

#[test]
fn switch_reports_a_conflict_when_base_has_diverged() {
    let repo = Repo::init();
    let store = Store::empty();
    let (id, branch) = create_car(&store, &repo);

    repo.checkout_new_branch(&branch);
    repo.commit_file("feature.txt", "added\n");
    repo.checkout("main");
    // main moves on independently of the car's branch after it was cut.
    repo.commit_file("unrelated.txt", "unrelated\n");

    store
        .railyard()
        .pwd(repo.path())
        .args(&["switch", &id])
        .fails()
        .stderr_has("merge conflict");
}
