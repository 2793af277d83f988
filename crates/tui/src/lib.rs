// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! harness-tui: the render orchestration contract and the modal input
//! reducers shared by harness UIs.
//!
//! The concrete terminal renderer is an external collaborator: this
//! crate owns the dirty-flag scheduling, the snapshot discipline, the
//! row-diff flush, and the typed reduction of raw input bytes into
//! prompt state transitions.

pub mod input;
pub mod orchestrator;
pub mod overlay;
pub mod snapshot;

pub use input::{decode_input, InputEvent, PointerEvent};
pub use orchestrator::{
    FlushRender, Frame, Layout, LeftRail, PaneFocus, RenderOrchestrator, RightPane, RightPaneCtx,
    RowDiff, TickOutcome,
};
pub use overlay::{OverlayFrame, OverlayKind, PromptState, Rect, ReduceOutcome};
pub use snapshot::{ProcessUsage, RenderSnapshot, UiState};
