// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn parses_scope_from_record_fields() {
    let v = json!({"tenantId": "t1", "userId": "u1", "workspaceId": "w1"});
    let scope = Scope::parse(&v).unwrap();
    assert_eq!(scope, Scope::new("t1", "u1", "w1"));
}

#[test]
fn rejects_missing_or_empty_components() {
    assert!(Scope::parse(&json!({"tenantId": "t1", "userId": "u1"})).is_none());
    assert!(Scope::parse(&json!({"tenantId": "", "userId": "u1", "workspaceId": "w1"})).is_none());
    assert!(Scope::parse(&json!("not-an-object")).is_none());
}

#[test]
fn serializes_camel_case() {
    let scope = Scope::new("t1", "u1", "w1");
    let v = serde_json::to_value(&scope).unwrap();
    assert_eq!(v, json!({"tenantId": "t1", "userId": "u1", "workspaceId": "w1"}));
}

#[test]
fn display_joins_components() {
    assert_eq!(Scope::new("t", "u", "w").to_string(), "t/u/w");
}
