// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::directory_json;
use serde_json::json;

#[test]
fn parses_complete_record() {
    let dir = Directory::parse(&directory_json("d1", "/work/project")).unwrap();
    assert_eq!(dir.directory_id, "d1");
    assert_eq!(dir.path, "/work/project");
    assert!(dir.created_at.is_some());
    assert!(!dir.is_archived());
}

#[test]
fn rejects_non_object_input() {
    assert!(Directory::parse(&json!(null)).is_none());
    assert!(Directory::parse(&json!([1, 2])).is_none());
    assert!(Directory::parse(&json!("d1")).is_none());
}

#[test]
fn rejects_missing_path() {
    let mut v = directory_json("d1", "/p");
    v.as_object_mut().unwrap().remove("path");
    assert!(Directory::parse(&v).is_none());
}

#[test]
fn null_created_at_is_accepted() {
    let mut v = directory_json("d1", "/p");
    v["createdAt"] = json!(null);
    let dir = Directory::parse(&v).unwrap();
    assert_eq!(dir.created_at, None);
}

#[test]
fn wrong_typed_archived_at_fails_the_parse() {
    let mut v = directory_json("d1", "/p");
    v["archivedAt"] = json!(123);
    assert!(Directory::parse(&v).is_none());
}

#[test]
fn round_trips_through_serde() {
    let dir = Directory::parse(&directory_json("d1", "/p")).unwrap();
    let back = Directory::parse(&serde_json::to_value(&dir).unwrap()).unwrap();
    assert_eq!(back, dir);
}
