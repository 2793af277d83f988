// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn map(v: serde_json::Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

// ── Required fields ──────────────────────────────────────────────────────────

#[test]
fn req_id_rejects_empty_and_missing() {
    let m = map(json!({"a": "x", "b": ""}));
    assert_eq!(req_id(&m, "a").as_deref(), Some("x"));
    assert_eq!(req_id(&m, "b"), None);
    assert_eq!(req_id(&m, "c"), None);
}

#[test]
fn req_str_accepts_empty() {
    let m = map(json!({"title": ""}));
    assert_eq!(req_str(&m, "title").as_deref(), Some(""));
}

#[test]
fn req_str_rejects_non_string() {
    let m = map(json!({"title": 7}));
    assert_eq!(req_str(&m, "title"), None);
}

// ── Optional fields: absent vs null vs invalid ───────────────────────────────

#[test]
fn opt_str_absent_and_null_are_none() {
    let m = map(json!({"b": null}));
    assert_eq!(opt_str(&m, "a"), Some(None));
    assert_eq!(opt_str(&m, "b"), Some(None));
}

#[test]
fn opt_str_wrong_type_is_a_parse_failure() {
    let m = map(json!({"a": 42}));
    assert_eq!(opt_str(&m, "a"), None);
}

#[test]
fn opt_bool_defaults_when_absent() {
    let m = map(json!({}));
    assert_eq!(opt_bool(&m, "live", false), Some(false));
    assert_eq!(opt_bool(&m, "live", true), Some(true));
}

#[test]
fn opt_u64_rejects_negative() {
    let m = map(json!({"n": -1}));
    assert_eq!(opt_u64(&m, "n"), None);
}

// ── Timestamps ───────────────────────────────────────────────────────────────

#[test]
fn parses_iso8601_utc() {
    let m = map(json!({"at": "2026-01-15T12:00:00Z"}));
    let ts = req_ts(&m, "at").unwrap();
    assert_eq!(ts.to_rfc3339(), "2026-01-15T12:00:00+00:00");
}

#[test]
fn parses_offset_timestamps_into_utc() {
    let m = map(json!({"at": "2026-01-15T14:00:00+02:00"}));
    let ts = req_ts(&m, "at").unwrap();
    assert_eq!(ts.to_rfc3339(), "2026-01-15T12:00:00+00:00");
}

#[test]
fn rejects_malformed_timestamp() {
    let m = map(json!({"at": "yesterday"}));
    assert_eq!(req_ts(&m, "at"), None);
    assert_eq!(opt_ts(&m, "at"), None);
}

#[test]
fn opt_ts_absent_is_none() {
    let m = map(json!({}));
    assert_eq!(opt_ts(&m, "at"), Some(None));
}
