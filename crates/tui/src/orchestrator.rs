// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-threaded cooperative render pipeline.
//!
//! The contract: a store notification sets the dirty flag; a tick with
//! the flag clear (or while shutting down) does nothing; otherwise the
//! pipeline captures one snapshot, renders both panes from it, and
//! hands everything to the flush, which composes rows, applies at most
//! one modal overlay, and writes only rows that changed. No store reads
//! happen between the snapshot capture and the flush.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use harness_sync::SyncedStore;
use parking_lot::Mutex;

use crate::overlay::OverlayFrame;
use crate::snapshot::{RenderSnapshot, UiState};

/// Terminal geometry for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub cols: u16,
    pub rows: u16,
    pub left_width: u16,
}

/// Inputs for the right pane renderer.
pub struct RightPaneCtx<'a> {
    pub layout: &'a Layout,
    pub home_pane_active: bool,
    pub project_pane_active: bool,
    pub active_directory_id: Option<&'a str>,
    pub snapshot: &'a RenderSnapshot,
}

/// Left rail renderer seam (conversation/task rail).
pub trait LeftRail {
    fn render(&mut self, layout: &Layout, snapshot: &RenderSnapshot) -> Vec<String>;
}

/// Right pane renderer seam (home/project/conversation panes).
pub trait RightPane {
    fn render(&mut self, ctx: RightPaneCtx<'_>) -> Vec<String>;
}

/// Composed output of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub layout: Layout,
    pub left_rows: Vec<String>,
    pub right_rows: Vec<String>,
    pub overlay: Option<OverlayFrame>,
}

/// Transport-specific flush: compose, overlay, diff, write.
pub trait FlushRender {
    fn flush(&mut self, frame: Frame);
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Clean or shutting down; nothing rendered.
    Skipped,
    /// No selection could be prepared; dirty flag cleared.
    NoSelection,
    Rendered,
}

/// Orchestrates ticks for one UI client.
pub struct RenderOrchestrator<L, R, F> {
    dirty: Arc<AtomicBool>,
    shutting_down: AtomicBool,
    store: Arc<SyncedStore>,
    ui: Arc<Mutex<UiState>>,
    left_rail: L,
    right_pane: R,
    flush: F,
    /// Selection preparation seam; `None` aborts the tick.
    prepare: Box<dyn FnMut(&UiState) -> Option<PaneFocus> + Send>,
    overlay: Option<OverlayFrame>,
    _store_subscription: harness_sync::StoreSubscription,
}

/// Which pane owns focus, produced by selection preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneFocus {
    pub home_pane_active: bool,
    pub project_pane_active: bool,
}

impl<L: LeftRail, R: RightPane, F: FlushRender> RenderOrchestrator<L, R, F> {
    pub fn new(
        store: Arc<SyncedStore>,
        ui: Arc<Mutex<UiState>>,
        left_rail: L,
        right_pane: R,
        flush: F,
        prepare: impl FnMut(&UiState) -> Option<PaneFocus> + Send + 'static,
    ) -> Self {
        let dirty = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&dirty);
        // Every store notification marks the next tick dirty
        let subscription = store.subscribe(move |_| {
            flag.store(true, Ordering::Release);
        });

        Self {
            dirty,
            shutting_down: AtomicBool::new(false),
            store,
            ui,
            left_rail,
            right_pane,
            flush,
            prepare: Box::new(prepare),
            overlay: None,
            _store_subscription: subscription,
        }
    }

    /// Mark the next tick dirty (input, resize, overlay changes).
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    /// Replace the modal overlay (at most one).
    pub fn set_overlay(&mut self, overlay: Option<OverlayFrame>) {
        self.overlay = overlay;
        self.mark_dirty();
    }

    /// Run one cooperative tick.
    pub fn tick(&mut self, layout: Layout) -> TickOutcome {
        if self.shutting_down.load(Ordering::Acquire)
            || !self.dirty.swap(false, Ordering::AcqRel)
        {
            return TickOutcome::Skipped;
        }

        let ui = self.ui.lock().clone();
        let Some(focus) = (self.prepare)(&ui) else {
            return TickOutcome::NoSelection;
        };

        // One identity-stable capture; everything below reads only this
        let snapshot = RenderSnapshot::capture(&self.store.get_state(), &ui);

        let left_rows = self.left_rail.render(&layout, &snapshot);
        let right_rows = self.right_pane.render(RightPaneCtx {
            layout: &layout,
            home_pane_active: focus.home_pane_active,
            project_pane_active: focus.project_pane_active,
            active_directory_id: ui.active_directory_id.as_deref(),
            snapshot: &snapshot,
        });

        self.flush.flush(Frame {
            layout,
            left_rows,
            right_rows,
            overlay: self.overlay.clone(),
        });

        TickOutcome::Rendered
    }
}

/// Row-level screen diff shared by flush implementations.
///
/// Composes left and right rows side by side, splices the overlay in,
/// and reports only the rows that differ from the previous screen.
#[derive(Debug, Default)]
pub struct RowDiff {
    prev: Vec<String>,
}

impl RowDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose a frame and return `(row_index, row)` for changed rows.
    pub fn compose(&mut self, frame: &Frame) -> Vec<(usize, String)> {
        let rows = compose_rows(frame);
        let mut changed = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if self.prev.get(index) != Some(row) {
                changed.push((index, row.clone()));
            }
        }
        // Rows that disappeared (screen shrank) count as changed blanks
        for index in rows.len()..self.prev.len() {
            changed.push((index, String::new()));
        }
        self.prev = rows;
        changed
    }
}

fn compose_rows(frame: &Frame) -> Vec<String> {
    let total_rows = frame.layout.rows as usize;
    let left_width = frame.layout.left_width as usize;
    let mut rows = Vec::with_capacity(total_rows);

    for index in 0..total_rows {
        let left = frame
            .left_rows
            .get(index)
            .map(String::as_str)
            .unwrap_or("");
        let right = frame
            .right_rows
            .get(index)
            .map(String::as_str)
            .unwrap_or("");
        rows.push(format!("{left:<left_width$}{right}"));
    }

    if let Some(overlay) = &frame.overlay {
        apply_overlay(&mut rows, overlay);
    }

    rows
}

/// Splice overlay rows into the composed screen at the overlay rect.
fn apply_overlay(rows: &mut [String], overlay: &OverlayFrame) {
    let col = overlay.rect.col as usize;
    let width = overlay.rect.width as usize;
    for (offset, overlay_row) in overlay.rows.iter().enumerate() {
        let Some(row) = rows.get_mut(overlay.rect.row as usize + offset) else {
            break;
        };
        let mut chars: Vec<char> = row.chars().collect();
        if chars.len() < col + width {
            chars.resize(col + width, ' ');
        }
        for (i, c) in overlay_row.chars().take(width).enumerate() {
            chars[col + i] = c;
        }
        // Pad short overlay rows to the rect width
        for i in overlay_row.chars().count()..width {
            chars[col + i] = ' ';
        }
        *row = chars.into_iter().collect();
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
