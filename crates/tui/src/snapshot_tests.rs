// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::test_support::{conversation_created, task_created};
use harness_sync::reduce::reduce;

#[test]
fn capture_shares_sub_map_identity() {
    let state = SyncedState::new();
    let state = reduce(&state, &conversation_created("c1", "d1", "x")).state;
    let ui = UiState::default();

    let a = RenderSnapshot::capture(&state, &ui);
    let b = RenderSnapshot::capture(&state, &ui);

    assert!(Arc::ptr_eq(&a.conversations, &b.conversations));
    assert!(Arc::ptr_eq(&a.tasks, &b.tasks));
}

#[test]
fn capture_tracks_only_touched_sub_maps() {
    let state = reduce(
        &SyncedState::new(),
        &conversation_created("c1", "d1", "x"),
    )
    .state;
    let ui = UiState::default();
    let before = RenderSnapshot::capture(&state, &ui);

    let next = reduce(&state, &task_created("t1", "a", 0)).state;
    let after = RenderSnapshot::capture(&next, &ui);

    assert!(Arc::ptr_eq(&before.conversations, &after.conversations));
    assert!(!Arc::ptr_eq(&before.tasks, &after.tasks));
}

#[test]
fn ui_state_rides_along() {
    let mut ui = UiState::default();
    ui.active_conversation_id = Some("c1".into());
    ui.process_usage = Some(ProcessUsage {
        cpu_percent: 3.5,
        memory_bytes: 1024,
    });

    let snapshot = RenderSnapshot::capture(&SyncedState::new(), &ui);
    assert_eq!(snapshot.active_conversation_id.as_deref(), Some("c1"));
    assert_eq!(snapshot.process_usage.unwrap().memory_bytes, 1024);
}
