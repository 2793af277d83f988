// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn runtime_status_parses_kebab_case() {
    assert_eq!(
        RuntimeStatus::parse(&json!("needs-input")),
        Some(RuntimeStatus::NeedsInput)
    );
    assert_eq!(RuntimeStatus::parse(&json!("sleeping")), None);
    assert_eq!(RuntimeStatus::parse(&json!(1)), None);
}

#[test]
fn controller_parses_complete_record() {
    let v = json!({
        "controllerId": "cli-1",
        "controllerType": "human",
        "controllerLabel": "alice's terminal",
        "claimedAt": "2026-01-15T12:00:00Z",
    });
    let controller = Controller::parse(&v).unwrap();
    assert_eq!(controller.controller_id, "cli-1");
    assert_eq!(controller.controller_type, ControllerType::Human);
    assert_eq!(controller.controller_label.as_deref(), Some("alice's terminal"));
}

#[test]
fn controller_label_is_nullable() {
    let v = json!({
        "controllerId": "agent-1",
        "controllerType": "agent",
        "controllerLabel": null,
        "claimedAt": "2026-01-15T12:00:00Z",
    });
    let controller = Controller::parse(&v).unwrap();
    assert_eq!(controller.controller_label, None);
}

#[test]
fn controller_rejects_unknown_type() {
    let v = json!({
        "controllerId": "x",
        "controllerType": "robot",
        "claimedAt": "2026-01-15T12:00:00Z",
    });
    assert!(Controller::parse(&v).is_none());
}

#[test]
fn status_model_parse_and_serialize_agree() {
    let model = StatusModel {
        phase: Phase::Thinking,
        activity_hint: Some("Running tests".into()),
        attention_reason: None,
    };
    let v = serde_json::to_value(&model).unwrap();
    assert_eq!(v["phase"], "thinking");
    assert_eq!(StatusModel::parse(&v), Some(model));
}

#[test]
fn session_serializes_flattened_scope() {
    let session = Session {
        session_id: SessionId::new("s1"),
        scope: Scope::new("t1", "u1", "w1"),
        worktree_id: None,
        status: RuntimeStatus::Running,
        status_model: StatusModel::idle(),
        latest_cursor: 42,
        process_id: Some(1234),
        attached_clients: 1,
        event_subscribers: 2,
        started_at: "2026-01-15T12:00:00Z".parse().unwrap(),
        last_event_at: None,
        last_exit: None,
        exited_at: None,
        live: true,
        launch_command: vec!["codex".into()],
        controller: None,
        telemetry: None,
    };
    let v = serde_json::to_value(&session).unwrap();
    assert_eq!(v["sessionId"], "s1");
    assert_eq!(v["tenantId"], "t1");
    assert_eq!(v["latestCursor"], 42);
    assert!(v.get("lastExit").is_none());
}
