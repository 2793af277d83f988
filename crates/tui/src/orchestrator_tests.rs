// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::overlay::{OverlayFrame, Rect};
use harness_core::test_support::conversation_created;
use std::sync::Arc;

struct CountingRail(usize);

impl LeftRail for CountingRail {
    fn render(&mut self, _layout: &Layout, snapshot: &RenderSnapshot) -> Vec<String> {
        self.0 += 1;
        snapshot
            .conversations
            .values()
            .map(|c| format!("* {}", c.conversation_id))
            .collect()
    }
}

struct EmptyPane;

impl RightPane for EmptyPane {
    fn render(&mut self, ctx: RightPaneCtx<'_>) -> Vec<String> {
        vec![format!("home={}", ctx.home_pane_active)]
    }
}

#[derive(Default)]
struct CapturingFlush {
    frames: Arc<parking_lot::Mutex<Vec<Frame>>>,
}

impl FlushRender for CapturingFlush {
    fn flush(&mut self, frame: Frame) {
        self.frames.lock().push(frame);
    }
}

fn layout() -> Layout {
    Layout {
        cols: 80,
        rows: 4,
        left_width: 20,
    }
}

fn orchestrator(
    store: Arc<harness_sync::SyncedStore>,
) -> (
    RenderOrchestrator<CountingRail, EmptyPane, CapturingFlush>,
    Arc<parking_lot::Mutex<Vec<Frame>>>,
) {
    let flush = CapturingFlush::default();
    let frames = Arc::clone(&flush.frames);
    let ui = Arc::new(parking_lot::Mutex::new(UiState::default()));
    let orch = RenderOrchestrator::new(store, ui, CountingRail(0), EmptyPane, flush, |_| {
        Some(PaneFocus {
            home_pane_active: true,
            project_pane_active: false,
        })
    });
    (orch, frames)
}

#[test]
fn first_tick_renders_then_clean_ticks_skip() {
    let store = Arc::new(harness_sync::SyncedStore::new());
    let (mut orch, frames) = orchestrator(store);

    assert_eq!(orch.tick(layout()), TickOutcome::Rendered);
    assert_eq!(orch.tick(layout()), TickOutcome::Skipped);
    assert_eq!(frames.lock().len(), 1);
}

#[test]
fn store_notification_sets_the_dirty_flag() {
    let store = Arc::new(harness_sync::SyncedStore::new());
    let (mut orch, frames) = orchestrator(Arc::clone(&store));
    orch.tick(layout());

    store.apply_observed("sub", 1, &conversation_created("c1", "d1", "x"));

    assert!(orch.is_dirty());
    assert_eq!(orch.tick(layout()), TickOutcome::Rendered);
    let frames = frames.lock();
    assert!(frames[1].left_rows.iter().any(|r| r.contains("c1")));
}

#[test]
fn shutdown_stops_rendering() {
    let store = Arc::new(harness_sync::SyncedStore::new());
    let (mut orch, frames) = orchestrator(store);

    orch.begin_shutdown();
    orch.mark_dirty();
    assert_eq!(orch.tick(layout()), TickOutcome::Skipped);
    assert!(frames.lock().is_empty());
}

#[test]
fn failed_selection_preparation_clears_dirty() {
    let store = Arc::new(harness_sync::SyncedStore::new());
    let ui = Arc::new(parking_lot::Mutex::new(UiState::default()));
    let mut orch = RenderOrchestrator::new(
        store,
        ui,
        CountingRail(0),
        EmptyPane,
        CapturingFlush::default(),
        |_| None,
    );

    assert_eq!(orch.tick(layout()), TickOutcome::NoSelection);
    assert_eq!(orch.tick(layout()), TickOutcome::Skipped);
}

// ── Row diff ─────────────────────────────────────────────────────────────────

fn frame(rows: Vec<&str>) -> Frame {
    Frame {
        layout: Layout {
            cols: 40,
            rows: rows.len() as u16,
            left_width: 4,
        },
        left_rows: vec![],
        right_rows: rows.into_iter().map(String::from).collect(),
        overlay: None,
    }
}

#[test]
fn row_diff_reports_only_changed_rows() {
    let mut diff = RowDiff::new();

    let first = diff.compose(&frame(vec!["a", "b", "c"]));
    assert_eq!(first.len(), 3);

    let second = diff.compose(&frame(vec!["a", "B", "c"]));
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].0, 1);
    assert!(second[0].1.contains('B'));

    let third = diff.compose(&frame(vec!["a", "B", "c"]));
    assert!(third.is_empty());
}

#[test]
fn shrinking_screen_blanks_stale_rows() {
    let mut diff = RowDiff::new();
    diff.compose(&frame(vec!["a", "b", "c"]));
    let changed = diff.compose(&frame(vec!["a", "b"]));
    assert!(changed.iter().any(|(i, row)| *i == 2 && row.is_empty()));
}

#[test]
fn overlay_is_spliced_into_the_composed_rows() {
    let mut diff = RowDiff::new();
    let mut f = frame(vec!["................", "................"]);
    f.overlay = Some(OverlayFrame {
        rect: Rect::new(6, 0, 4, 1),
        rows: vec!["MENU".into()],
    });

    let rows = diff.compose(&f);
    let row0 = &rows[0].1;
    assert!(row0.contains("MENU"));
    // Overlay covers only its rect
    assert!(rows[1].1.starts_with("    ...."));
}

#[test]
fn left_and_right_rows_compose_side_by_side() {
    let mut diff = RowDiff::new();
    let f = Frame {
        layout: Layout {
            cols: 20,
            rows: 1,
            left_width: 6,
        },
        left_rows: vec!["rail".into()],
        right_rows: vec!["pane".into()],
        overlay: None,
    };
    let rows = diff.compose(&f);
    assert_eq!(rows[0].1, "rail  pane");
}
