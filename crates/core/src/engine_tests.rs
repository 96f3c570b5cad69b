// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn register_starts_in_starting_status_with_no_car() {
    let e = Engine::register(EngineId::new("e1"), "backend", 1_000);
    assert_eq!(e.status, EngineStatus::Starting);
    assert!(e.current_car.is_none());
    assert_eq!(e.last_activity, 1_000);
}

#[test]
fn engine_is_dead_past_threshold() {
    let e = Engine::register(EngineId::new("e1"), "backend", 0);
    assert!(!e.is_dead_at(DEAD_ENGINE_THRESHOLD_MS));
    assert!(e.is_dead_at(DEAD_ENGINE_THRESHOLD_MS + 1));
}

#[test]
fn engine_not_dead_immediately_after_heartbeat() {
    let mut e = Engine::register(EngineId::new("e1"), "backend", 0);
    e.last_activity = 25_000;
    assert!(!e.is_dead_at(30_000));
}

#[test]
fn status_display_matches_wire_form() {
    assert_eq!(EngineStatus::Working.to_string(), "working");
    let json = serde_json::to_string(&EngineStatus::Paused).unwrap();
    assert_eq!(json, "\"paused\"");
}
