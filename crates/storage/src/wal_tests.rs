// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use railyard_core::Track;
use std::io::Write as _;

fn track_event(name: &str) -> Event {
    Event::TrackSeeded {
        track: Track::new(name, "rust"),
    }
}

#[test]
fn append_then_flush_persists_entries_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    let mut wal = Wal::open(&path, 0).unwrap();
    let seq = wal.append(&track_event("backend")).unwrap();
    assert_eq!(seq, 1);
    assert!(wal.needs_flush());

    wal.flush().unwrap();
    assert!(!wal.needs_flush());

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("\"seq\":1"));
}

#[test]
fn next_unprocessed_returns_entries_in_order_then_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&track_event("backend")).unwrap();
    wal.append(&track_event("frontend")).unwrap();

    let first = wal.next_unprocessed().unwrap().expect("first entry");
    assert_eq!(first.seq, 1);
    wal.mark_processed(first.seq);

    let second = wal.next_unprocessed().unwrap().expect("second entry");
    assert_eq!(second.seq, 2);
    wal.mark_processed(second.seq);

    assert!(wal.next_unprocessed().unwrap().is_none());
    assert_eq!(wal.processed_seq(), 2);
}

#[test]
fn reopen_resumes_from_the_processed_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&track_event("backend")).unwrap();
        wal.append(&track_event("frontend")).unwrap();
        wal.flush().unwrap();
    }

    // Simulate a snapshot having checkpointed past the first entry.
    let mut wal = Wal::open(&path, 1).unwrap();
    assert_eq!(wal.write_seq(), 2);
    let entry = wal.next_unprocessed().unwrap().expect("unprocessed entry");
    assert_eq!(entry.seq, 2);
}

#[test]
fn entries_after_filters_by_sequence_without_consuming_the_read_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&track_event("backend")).unwrap();
    wal.append(&track_event("frontend")).unwrap();
    wal.append(&track_event("infra")).unwrap();
    wal.flush().unwrap();

    let after = wal.entries_after(1).unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].seq, 2);
    assert_eq!(after[1].seq, 3);

    assert!(wal.entries_after(3).unwrap().is_empty());
}

#[test]
fn truncate_before_drops_earlier_entries_and_keeps_the_rest_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&track_event("backend")).unwrap();
    wal.append(&track_event("frontend")).unwrap();
    wal.append(&track_event("infra")).unwrap();
    wal.flush().unwrap();
    wal.mark_processed(2);

    wal.truncate_before(2).unwrap();

    let remaining = wal.entries_after(0).unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].seq, 2);
    assert_eq!(remaining[1].seq, 3);

    let entry = wal.next_unprocessed().unwrap().expect("entry past checkpoint");
    assert_eq!(entry.seq, 3);
}

#[test]
fn corrupt_trailing_entry_is_rotated_to_bak_and_valid_entries_survive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&track_event("backend")).unwrap();
        wal.flush().unwrap();
    }

    // Append a line that won't parse as a WalRecord at all.
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"not json at all\n").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 1);

    let bak = crate::snapshot::rotate_bak_path(&path);
    assert!(bak.exists(), "corrupt wal should be rotated to a .bak file");

    let cleaned = std::fs::read_to_string(&path).unwrap();
    assert_eq!(cleaned.lines().count(), 1);
}

#[test]
fn needs_flush_is_false_for_an_empty_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let wal = Wal::open(&path, 0).unwrap();
    assert!(!wal.needs_flush());
}
