// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for total record parsers.
//!
//! Every record type has a `parse(value) -> Option<Record>` that rejects
//! non-object inputs, checks each required field for the right primitive
//! shape, and normalizes legacy aliases. Optional fields distinguish
//! `absent`, explicit `null`, and `invalid`: only the first two are
//! accepted for nullable fields; a present wrong-typed value fails the
//! whole parse. Parsers never panic — the caller decides whether to drop
//! (list elements) or escalate (single-record results).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Required string field (may be empty).
pub fn req_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)?.as_str().map(str::to_owned)
}

/// Required non-empty string field (identifiers).
pub fn req_id(map: &Map<String, Value>, key: &str) -> Option<String> {
    let s = map.get(key)?.as_str()?;
    if s.is_empty() {
        return None;
    }
    Some(s.to_owned())
}

/// Optional string field. Absent and `null` both parse to `None`;
/// a present non-string value is a parse failure.
pub fn opt_str(map: &Map<String, Value>, key: &str) -> Option<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => None,
    }
}

/// Optional non-empty identifier field.
pub fn opt_id(map: &Map<String, Value>, key: &str) -> Option<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) if !s.is_empty() => Some(Some(s.clone())),
        Some(_) => None,
    }
}

/// Required boolean field.
pub fn req_bool(map: &Map<String, Value>, key: &str) -> Option<bool> {
    map.get(key)?.as_bool()
}

/// Optional boolean field with a default for absent/null.
pub fn opt_bool(map: &Map<String, Value>, key: &str, default: bool) -> Option<bool> {
    match map.get(key) {
        None | Some(Value::Null) => Some(default),
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => None,
    }
}

/// Required non-negative integer field.
pub fn req_u64(map: &Map<String, Value>, key: &str) -> Option<u64> {
    map.get(key)?.as_u64()
}

/// Optional non-negative integer field.
pub fn opt_u64(map: &Map<String, Value>, key: &str) -> Option<Option<u64>> {
    match map.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(v) => v.as_u64().map(Some),
    }
}

/// Required ISO-8601 UTC timestamp field.
pub fn req_ts(map: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    parse_ts(map.get(key)?)
}

/// Optional ISO-8601 UTC timestamp field.
pub fn opt_ts(map: &Map<String, Value>, key: &str) -> Option<Option<DateTime<Utc>>> {
    match map.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(v) => parse_ts(v).map(Some),
    }
}

/// Parse a `Value` as an ISO-8601 UTC timestamp.
pub fn parse_ts(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
