// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Modal overlay reducers.
//!
//! Each overlay kind is one prompt state wired to the shared input
//! rules: submit closes with a result, advance cycles the selection,
//! deletes and inserts edit the text buffer, pointer presses hit-test
//! against the overlay rect (outside dismisses, inside may pick an
//! option).

use crate::input::{InputEvent, PointerEvent};

/// The overlay kinds the UIs present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    NewThread,
    CommandMenu,
    TaskEditor,
    Repository,
    ApiKey,
    ConversationTitle,
    ReleaseNotes,
}

/// Screen-space rectangle for hit tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub col: u16,
    pub row: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(col: u16, row: u16, width: u16, height: u16) -> Self {
        Self {
            col,
            row,
            width,
            height,
        }
    }

    pub fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.col
            && col < self.col + self.width
            && row >= self.row
            && row < self.row + self.height
    }

    /// Row index into the option list for a pointer position, when the
    /// position falls on an option line (first line is the text field).
    fn option_at(&self, row: u16, option_count: usize) -> Option<usize> {
        if option_count == 0 || row <= self.row {
            return None;
        }
        let index = (row - self.row - 1) as usize;
        (index < option_count).then_some(index)
    }
}

/// State of one modal prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptState {
    pub kind: OverlayKind,
    pub text: String,
    pub options: Vec<String>,
    pub selection: usize,
    pub rect: Rect,
    /// Whether the overlay takes free text (menus don't).
    pub editable: bool,
}

impl PromptState {
    fn new(kind: OverlayKind, editable: bool, options: Vec<String>, rect: Rect) -> Self {
        Self {
            kind,
            text: String::new(),
            options,
            selection: 0,
            rect,
            editable,
        }
    }

    pub fn new_thread(rect: Rect, agent_types: Vec<String>) -> Self {
        Self::new(OverlayKind::NewThread, true, agent_types, rect)
    }

    pub fn command_menu(rect: Rect, commands: Vec<String>) -> Self {
        Self::new(OverlayKind::CommandMenu, false, commands, rect)
    }

    pub fn task_editor(rect: Rect, initial: &str) -> Self {
        let mut state = Self::new(OverlayKind::TaskEditor, true, Vec::new(), rect);
        state.text = initial.to_owned();
        state
    }

    pub fn repository(rect: Rect) -> Self {
        Self::new(OverlayKind::Repository, true, Vec::new(), rect)
    }

    pub fn api_key(rect: Rect) -> Self {
        Self::new(OverlayKind::ApiKey, true, Vec::new(), rect)
    }

    pub fn conversation_title(rect: Rect, current: &str) -> Self {
        let mut state = Self::new(OverlayKind::ConversationTitle, true, Vec::new(), rect);
        state.text = current.to_owned();
        state
    }

    pub fn release_notes(rect: Rect) -> Self {
        Self::new(OverlayKind::ReleaseNotes, false, Vec::new(), rect)
    }

    pub fn selected_option(&self) -> Option<&str> {
        self.options.get(self.selection).map(String::as_str)
    }
}

/// Result of one reduction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceOutcome {
    pub state: PromptState,
    pub submit: bool,
    pub dismissed: bool,
}

impl ReduceOutcome {
    fn stay(state: PromptState) -> Self {
        Self {
            state,
            submit: false,
            dismissed: false,
        }
    }
}

/// Pure reducer from typed input events to prompt transitions.
pub fn reduce(mut state: PromptState, event: &InputEvent) -> ReduceOutcome {
    match event {
        InputEvent::Submit => ReduceOutcome {
            state,
            submit: true,
            dismissed: false,
        },

        InputEvent::Advance => {
            if !state.options.is_empty() {
                state.selection = (state.selection + 1) % state.options.len();
            } else if state.editable {
                // Space in a text-only overlay is literal
                state.text.push(' ');
            }
            ReduceOutcome::stay(state)
        }

        InputEvent::Delete => {
            if state.editable {
                state.text.pop();
            }
            ReduceOutcome::stay(state)
        }

        InputEvent::Insert(c) => {
            if state.editable {
                state.text.push(*c);
            }
            ReduceOutcome::stay(state)
        }

        InputEvent::Paste(text) => {
            if state.editable {
                state.text.push_str(text);
            }
            ReduceOutcome::stay(state)
        }

        InputEvent::Pointer(pointer) => reduce_pointer(state, pointer),

        InputEvent::Ignored => ReduceOutcome::stay(state),
    }
}

fn reduce_pointer(mut state: PromptState, pointer: &PointerEvent) -> ReduceOutcome {
    if !pointer.press {
        return ReduceOutcome::stay(state);
    }

    // Clicks outside the current overlay dismiss it
    if !state.rect.contains(pointer.col, pointer.row) {
        return ReduceOutcome {
            state,
            submit: false,
            dismissed: true,
        };
    }

    // Clicks on an option row select it and fire the overlay action
    if let Some(index) = state.rect.option_at(pointer.row, state.options.len()) {
        state.selection = index;
        return ReduceOutcome {
            state,
            submit: true,
            dismissed: false,
        };
    }

    ReduceOutcome::stay(state)
}

/// Rendered overlay rows plus placement, applied by the flush stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayFrame {
    pub rect: Rect,
    pub rows: Vec<String>,
}

#[cfg(test)]
#[path = "overlay_tests.rs"]
mod tests;
