// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{directory_upserted, session_status, task_reordered, test_ts};
use serde_json::json;

#[test]
fn serializes_with_kebab_type_tag() {
    let event = directory_upserted("d1", "/p");
    let v = serde_json::to_value(&event).unwrap();
    assert_eq!(v["type"], "directory-upserted");
    assert_eq!(v["directory"]["directoryId"], "d1");
}

#[test]
fn round_trips_through_json() {
    let event = session_status("c1", "needs-input", true);
    let json = serde_json::to_string(&event).unwrap();
    let back: ObservedEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn kind_matches_wire_tag() {
    let event = task_reordered(vec![]);
    let v = serde_json::to_value(&event).unwrap();
    assert_eq!(v["type"], event.kind());
}

#[test]
fn ts_accessor_covers_all_variants() {
    let events = vec![
        directory_upserted("d1", "/p"),
        session_status("c1", "running", true),
        task_reordered(vec![]),
    ];
    for event in events {
        assert_eq!(event.ts(), test_ts());
    }
}

#[test]
fn unknown_type_tag_fails_deserialization() {
    let v = json!({"type": "directory-exploded", "ts": test_ts().to_rfc3339()});
    assert!(serde_json::from_value::<ObservedEvent>(v).is_err());
}

// ── session-status payload ───────────────────────────────────────────────────

#[test]
fn session_status_payload_parses() {
    let v = json!({
        "runtimeStatus": "running",
        "live": true,
        "statusModel": {"phase": "working", "activityHint": "Editing files"},
    });
    let payload = SessionStatusPayload::parse(&v).unwrap();
    assert_eq!(payload.runtime_status, RuntimeStatus::Running);
    assert!(payload.live);
    assert_eq!(
        payload.status_model.unwrap().activity_hint.as_deref(),
        Some("Editing files")
    );
}

#[test]
fn session_status_payload_with_controller() {
    let v = json!({
        "runtimeStatus": "running",
        "live": true,
        "controller": {
            "controllerId": "B",
            "controllerType": "agent",
            "claimedAt": "2026-01-15T12:00:00Z",
        },
    });
    let payload = SessionStatusPayload::parse(&v).unwrap();
    assert_eq!(payload.controller.unwrap().controller_id, "B");
}

#[test]
fn session_status_payload_rejects_missing_live() {
    let v = json!({"runtimeStatus": "running"});
    assert!(SessionStatusPayload::parse(&v).is_none());
}
