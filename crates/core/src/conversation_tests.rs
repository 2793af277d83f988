// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::session::Phase;
use crate::test_support::conversation_json;
use serde_json::json;

#[test]
fn parses_complete_record() {
    let conv = Conversation::parse(&conversation_json("c1", "d1", "Alpha")).unwrap();
    assert_eq!(conv.conversation_id, "c1");
    assert_eq!(conv.directory_id, "d1");
    assert_eq!(conv.title, "Alpha");
    assert_eq!(conv.runtime_status, RuntimeStatus::Running);
    assert!(conv.runtime_live);
}

#[test]
fn empty_title_is_valid() {
    let conv = Conversation::parse(&conversation_json("c1", "d1", "")).unwrap();
    assert_eq!(conv.title, "");
}

#[test]
fn missing_adapter_state_defaults_to_empty_object() {
    let mut v = conversation_json("c1", "d1", "x");
    v.as_object_mut().unwrap().remove("adapterState");
    let conv = Conversation::parse(&v).unwrap();
    assert_eq!(conv.adapter_state, json!({}));
}

#[test]
fn non_object_adapter_state_fails_the_parse() {
    let mut v = conversation_json("c1", "d1", "x");
    v["adapterState"] = json!("opaque");
    assert!(Conversation::parse(&v).is_none());
}

#[test]
fn parses_status_model_when_present() {
    let mut v = conversation_json("c1", "d1", "x");
    v["runtimeStatusModel"] = json!({
        "phase": "needs-input",
        "attentionReason": "permission prompt",
    });
    let conv = Conversation::parse(&v).unwrap();
    let model = conv.runtime_status_model.unwrap();
    assert_eq!(model.phase, Phase::NeedsInput);
    assert_eq!(model.attention_reason.as_deref(), Some("permission prompt"));
}

#[test]
fn invalid_phase_fails_the_parse() {
    let mut v = conversation_json("c1", "d1", "x");
    v["runtimeStatusModel"] = json!({"phase": "sleeping"});
    assert!(Conversation::parse(&v).is_none());
}
