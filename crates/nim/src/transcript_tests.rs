// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn push_and_iterate_in_order() {
    let mut t = Transcript::new(10);
    t.push(Speaker::User, "hi");
    t.push(Speaker::Assistant, "hello");

    let texts: Vec<&str> = t.lines().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["hi", "hello"]);
    assert_eq!(t.len(), 2);
}

#[test]
fn overflow_evicts_oldest() {
    let mut t = Transcript::new(3);
    for i in 0..5 {
        t.push(Speaker::System, format!("line {i}"));
    }

    assert_eq!(t.len(), 3);
    let texts: Vec<&str> = t.lines().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
}

#[test]
fn clear_empties() {
    let mut t = Transcript::new(3);
    t.push(Speaker::User, "x");
    t.clear();
    assert!(t.is_empty());
}

#[test]
fn zero_capacity_drops_everything() {
    let mut t = Transcript::new(0);
    t.push(Speaker::User, "x");
    assert!(t.is_empty());
}
