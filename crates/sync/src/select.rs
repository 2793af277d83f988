// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memoized projections from synced state to view models.
//!
//! Selectors are stateful: each remembers the identity of its input
//! sub-map and its last output, returning the memoized output when the
//! input is identity-equal. Combined with the reducer's structural
//! sharing, an event that does not touch a sub-map costs nothing in the
//! selectors over it.

use std::collections::HashMap;
use std::sync::Arc;

use harness_core::{Conversation, Directory, Phase, RuntimeStatus, Task};
use parking_lot::Mutex;

use crate::state::SyncedState;
use crate::store::{StoreSubscription, SyncedStore};

/// Row projected for the conversation list.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRow {
    pub id: String,
    pub directory_id: String,
    pub title: String,
    pub agent_type: String,
    pub runtime_status: RuntimeStatus,
    pub phase: Option<Phase>,
    pub activity_hint: Option<String>,
}

/// Conversation list sorted lexicographically by id.
pub struct ConversationListSelector {
    last_input: Option<Arc<HashMap<String, Conversation>>>,
    last_output: Arc<Vec<ConversationRow>>,
}

impl Default for ConversationListSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationListSelector {
    pub fn new() -> Self {
        Self {
            last_input: None,
            last_output: Arc::new(Vec::new()),
        }
    }

    pub fn select(&mut self, state: &SyncedState) -> Arc<Vec<ConversationRow>> {
        if let Some(last) = &self.last_input {
            if Arc::ptr_eq(last, &state.conversations) {
                return Arc::clone(&self.last_output);
            }
        }

        let mut rows: Vec<ConversationRow> = state
            .conversations
            .values()
            .map(|c| ConversationRow {
                id: c.conversation_id.as_str().to_owned(),
                directory_id: c.directory_id.as_str().to_owned(),
                title: c.title.clone(),
                agent_type: c.agent_type.clone(),
                runtime_status: c.runtime_status,
                phase: c.runtime_status_model.as_ref().map(|m| m.phase),
                activity_hint: c
                    .runtime_status_model
                    .as_ref()
                    .and_then(|m| m.activity_hint.clone()),
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));

        self.last_input = Some(Arc::clone(&state.conversations));
        self.last_output = Arc::new(rows);
        Arc::clone(&self.last_output)
    }
}

/// Task list sorted by `(orderIndex asc, taskId asc)`.
pub struct TaskListSelector {
    last_input: Option<Arc<HashMap<String, Task>>>,
    last_output: Arc<Vec<Task>>,
}

impl Default for TaskListSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskListSelector {
    pub fn new() -> Self {
        Self {
            last_input: None,
            last_output: Arc::new(Vec::new()),
        }
    }

    pub fn select(&mut self, state: &SyncedState) -> Arc<Vec<Task>> {
        if let Some(last) = &self.last_input {
            if Arc::ptr_eq(last, &state.tasks) {
                return Arc::clone(&self.last_output);
            }
        }

        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then_with(|| a.task_id.as_str().cmp(b.task_id.as_str()))
        });

        self.last_input = Some(Arc::clone(&state.tasks));
        self.last_output = Arc::new(tasks);
        Arc::clone(&self.last_output)
    }
}

/// Directory list sorted by id, excluding archived directories.
pub struct DirectoryListSelector {
    last_input: Option<Arc<HashMap<String, Directory>>>,
    last_output: Arc<Vec<Directory>>,
}

impl Default for DirectoryListSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryListSelector {
    pub fn new() -> Self {
        Self {
            last_input: None,
            last_output: Arc::new(Vec::new()),
        }
    }

    pub fn select(&mut self, state: &SyncedState) -> Arc<Vec<Directory>> {
        if let Some(last) = &self.last_input {
            if Arc::ptr_eq(last, &state.directories) {
                return Arc::clone(&self.last_output);
            }
        }

        let mut dirs: Vec<Directory> = state
            .directories
            .values()
            .filter(|d| !d.is_archived())
            .cloned()
            .collect();
        dirs.sort_by(|a, b| a.directory_id.as_str().cmp(b.directory_id.as_str()));

        self.last_input = Some(Arc::clone(&state.directories));
        self.last_output = Arc::new(dirs);
        Arc::clone(&self.last_output)
    }
}

/// Single-conversation lookup memoized on the conversations sub-map.
pub struct ConversationByIdSelector {
    id: String,
    last_input: Option<Arc<HashMap<String, Conversation>>>,
    last_output: Option<Arc<Conversation>>,
}

impl ConversationByIdSelector {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            last_input: None,
            last_output: None,
        }
    }

    pub fn select(&mut self, state: &SyncedState) -> Option<Arc<Conversation>> {
        if let Some(last) = &self.last_input {
            if Arc::ptr_eq(last, &state.conversations) {
                return self.last_output.clone();
            }
        }

        self.last_input = Some(Arc::clone(&state.conversations));
        self.last_output = state.conversations.get(&self.id).cloned().map(Arc::new);
        self.last_output.clone()
    }
}

/// Subscribe to a store through a selector, invoking `on_change` only
/// when the selected value changes.
///
/// `equals` compares successive selections; the default for the provided
/// selectors is `Arc::ptr_eq`, which pairs with their memoization.
pub fn subscribe_selector<T, S, E>(
    store: &Arc<SyncedStore>,
    mut select: S,
    on_change: impl Fn(&T) + Send + Sync + 'static,
    equals: E,
) -> StoreSubscription
where
    T: Clone + Send + 'static,
    S: FnMut(&SyncedState) -> T + Send + 'static,
    E: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let last = Mutex::new(select(&store.get_state()));
    let select = Mutex::new(select);
    store.subscribe(move |state| {
        let next = (*select.lock())(state);
        let mut last = last.lock();
        if !equals(&last, &next) {
            *last = next.clone();
            drop(last);
            on_change(&next);
        }
    })
}

#[cfg(test)]
#[path = "select_tests.rs"]
mod tests;
