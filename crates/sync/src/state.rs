// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synced state value with structurally-shared sub-maps.
//!
//! Each sub-map lives behind an `Arc`; the reducer only re-allocates a
//! sub-map it actually touches, so untouched sub-maps keep their pointer
//! identity across reductions. Selectors memoize on that identity.

use std::collections::HashMap;
use std::sync::Arc;

use harness_core::{Conversation, Directory, Repository, Task};

/// Client-side replica of the gateway's live state.
#[derive(Debug, Clone, Default)]
pub struct SyncedState {
    pub directories: Arc<HashMap<String, Directory>>,
    pub conversations: Arc<HashMap<String, Conversation>>,
    pub repositories: Arc<HashMap<String, Repository>>,
    pub tasks: Arc<HashMap<String, Task>>,
}

impl SyncedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every sub-map of `self` is identity-equal to `other`'s.
    pub fn same_identity(&self, other: &SyncedState) -> bool {
        Arc::ptr_eq(&self.directories, &other.directories)
            && Arc::ptr_eq(&self.conversations, &other.conversations)
            && Arc::ptr_eq(&self.repositories, &other.repositories)
            && Arc::ptr_eq(&self.tasks, &other.tasks)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
