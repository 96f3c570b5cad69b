// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;

use super::{emit, OutputFormat};

#[derive(Debug, Clone, Serialize)]
struct FakeEntry {
    name: String,
    detail: String,
}

#[test]
fn emit_json_does_not_invoke_text_renderer() {
    let entry = FakeEntry {
        name: "a".into(),
        detail: "d1".into(),
    };
    let mut called = false;
    emit(OutputFormat::Json, &entry, |_| called = true);
    assert!(!called);
}

#[test]
fn emit_text_invokes_renderer_with_value() {
    let entry = FakeEntry {
        name: "x".into(),
        detail: "y".into(),
    };
    let mut seen = None;
    emit(OutputFormat::Text, &entry, |e| seen = Some(e.name.clone()));
    assert_eq!(seen, Some("x".to_string()));
}

#[test]
fn output_format_default_is_text() {
    assert_eq!(OutputFormat::default(), OutputFormat::Text);
}
