// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn provider_events_serialize_with_dotted_tags() {
    let event = ProviderEvent::ToolCallStarted {
        call_id: "c1".into(),
        name: "ping".into(),
    };
    let v = serde_json::to_value(&event).unwrap();
    assert_eq!(v["type"], "tool.call.started");
    assert_eq!(v["name"], "ping");
}

#[test]
fn turn_finished_round_trips() {
    let event = ProviderEvent::TurnFinished {
        finish_reason: "stop".into(),
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: ProviderEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn tool_result_carries_arbitrary_json() {
    let event = ProviderEvent::ToolResultEmitted {
        call_id: "c1".into(),
        result: json!({"nested": {"x": 1}}),
    };
    let v = serde_json::to_value(&event).unwrap();
    assert_eq!(v["result"]["nested"]["x"], 1);
}

#[test]
fn session_status_serializes_kebab_case() {
    assert_eq!(
        serde_json::to_value(SessionStatus::ToolCalling).unwrap(),
        json!("tool-calling")
    );
    assert_eq!(SessionStatus::ToolCalling.as_str(), "tool-calling");
}

#[test]
fn ui_mode_serializes_lowercase() {
    assert_eq!(serde_json::to_value(UiMode::Seamless).unwrap(), json!("seamless"));
}
