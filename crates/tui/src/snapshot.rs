// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity-stable render snapshot.
//!
//! One capture per tick: the pipeline reads everything it needs here and
//! never touches the store again until the flush completes.

use std::collections::HashMap;
use std::sync::Arc;

use harness_core::{Conversation, Directory, Repository, Task};
use harness_sync::SyncedState;

/// Process resource telemetry shown in the footer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessUsage {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Client-local UI state that rides alongside the synced store.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// Per-task draft text keyed by task id.
    pub task_composers: Arc<HashMap<String, String>>,
    pub process_usage: Option<ProcessUsage>,
    pub active_conversation_id: Option<String>,
    pub active_directory_id: Option<String>,
}

/// Everything a tick reads, captured once.
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    pub directories: Arc<HashMap<String, Directory>>,
    pub conversations: Arc<HashMap<String, Conversation>>,
    pub repositories: Arc<HashMap<String, Repository>>,
    pub tasks: Arc<HashMap<String, Task>>,
    pub task_composers: Arc<HashMap<String, String>>,
    pub process_usage: Option<ProcessUsage>,
    pub active_conversation_id: Option<String>,
}

impl RenderSnapshot {
    /// Capture the current state. Sub-maps are shared by `Arc`, so a
    /// capture is cheap and two captures between which nothing changed
    /// are identity-equal map for map.
    pub fn capture(state: &SyncedState, ui: &UiState) -> Self {
        Self {
            directories: Arc::clone(&state.directories),
            conversations: Arc::clone(&state.conversations),
            repositories: Arc::clone(&state.repositories),
            tasks: Arc::clone(&state.tasks),
            task_composers: Arc::clone(&ui.task_composers),
            process_usage: ui.process_usage,
            active_conversation_id: ui.active_conversation_id.clone(),
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
