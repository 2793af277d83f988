// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from event-log replay.
//!
//! Tables mirror the scoped entities. The same `apply_event` path serves
//! live mutation (command handlers) and crash recovery (snapshot + log
//! replay), so the two can never diverge.

use std::collections::HashMap;

use harness_core::{
    Conversation, Directory, ObservedEvent, Repository, Scope, SessionStatusPayload, Task,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Materialized record tables built from observed events.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub directories: HashMap<String, Directory>,
    pub conversations: HashMap<String, Conversation>,
    pub repositories: HashMap<String, Repository>,
    pub tasks: HashMap<String, Task>,
}

impl PersistedState {
    /// Apply an observed event to the tables.
    ///
    /// Idempotent: re-applying an event during replay converges on the
    /// same state. Malformed payloads are logged and skipped.
    pub fn apply_event(&mut self, event: &ObservedEvent) {
        match event {
            ObservedEvent::DirectoryUpserted { directory, .. } => {
                match Directory::parse(directory) {
                    Some(dir) => {
                        self.directories
                            .insert(dir.directory_id.as_str().to_owned(), dir);
                    }
                    None => debug!(kind = event.kind(), "skipping malformed payload"),
                }
            }

            ObservedEvent::DirectoryArchived {
                ts, directory_id, ..
            } => {
                if let Some(dir) = self.directories.get_mut(directory_id) {
                    dir.archived_at = Some(*ts);
                }
                self.conversations
                    .retain(|_, c| c.directory_id.as_str() != directory_id);
            }

            ObservedEvent::ConversationCreated { conversation, .. }
            | ObservedEvent::ConversationUpdated { conversation, .. } => {
                match Conversation::parse(conversation) {
                    Some(conv) => {
                        self.conversations
                            .insert(conv.conversation_id.as_str().to_owned(), conv);
                    }
                    None => debug!(kind = event.kind(), "skipping malformed payload"),
                }
            }

            ObservedEvent::ConversationArchived {
                conversation_id, ..
            }
            | ObservedEvent::ConversationDeleted {
                conversation_id, ..
            } => {
                self.conversations.remove(conversation_id);
            }

            ObservedEvent::RepositoryUpserted { repository, .. }
            | ObservedEvent::RepositoryUpdated { repository, .. } => {
                match Repository::parse(repository) {
                    Some(repo) => {
                        self.repositories
                            .insert(repo.repository_id.as_str().to_owned(), repo);
                    }
                    None => debug!(kind = event.kind(), "skipping malformed payload"),
                }
            }

            ObservedEvent::RepositoryArchived {
                ts, repository_id, ..
            } => {
                if let Some(repo) = self.repositories.get_mut(repository_id) {
                    repo.archived_at = Some(*ts);
                }
            }

            ObservedEvent::TaskCreated { task, .. } | ObservedEvent::TaskUpdated { task, .. } => {
                match Task::parse(task) {
                    Some(task) => {
                        self.tasks.insert(task.task_id.as_str().to_owned(), task);
                    }
                    None => debug!(kind = event.kind(), "skipping malformed payload"),
                }
            }

            ObservedEvent::TaskDeleted { task_id, .. } => {
                self.tasks.remove(task_id);
            }

            ObservedEvent::TaskReordered { tasks, .. } => {
                for task in tasks.iter().filter_map(Task::parse) {
                    self.tasks.insert(task.task_id.as_str().to_owned(), task);
                }
            }

            ObservedEvent::SessionStatus {
                conversation_id,
                status,
                ..
            } => {
                let Some(payload) = SessionStatusPayload::parse(status) else {
                    debug!(kind = event.kind(), "skipping malformed payload");
                    return;
                };
                if let Some(conv) = self.conversations.get_mut(conversation_id) {
                    conv.runtime_status = payload.runtime_status;
                    conv.runtime_live = payload.live;
                    if let Some(model) = payload.status_model {
                        conv.runtime_status_model = Some(model);
                    }
                }
            }
        }
    }

    /// Get a conversation by id or unique prefix (like git commit hashes).
    pub fn get_conversation(&self, id: &str) -> Option<&Conversation> {
        if let Some(conv) = self.conversations.get(id) {
            return Some(conv);
        }
        let matches: Vec<_> = self
            .conversations
            .iter()
            .filter(|(k, _)| k.starts_with(id))
            .collect();
        if matches.len() == 1 {
            Some(matches[0].1)
        } else {
            None
        }
    }

    /// Get a task by id or unique prefix.
    pub fn get_task(&self, id: &str) -> Option<&Task> {
        if let Some(task) = self.tasks.get(id) {
            return Some(task);
        }
        let matches: Vec<_> = self.tasks.iter().filter(|(k, _)| k.starts_with(id)).collect();
        if matches.len() == 1 {
            Some(matches[0].1)
        } else {
            None
        }
    }

    /// Directories in a scope, unsorted.
    pub fn directories_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a Directory> {
        self.directories.values().filter(move |d| d.scope == *scope)
    }

    /// Conversations in a scope, unsorted.
    pub fn conversations_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a Conversation> {
        self.conversations
            .values()
            .filter(move |c| c.scope == *scope)
    }

    /// Repositories in a scope, unsorted.
    pub fn repositories_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a Repository> {
        self.repositories
            .values()
            .filter(move |r| r.scope == *scope)
    }

    /// Tasks in a scope, unsorted.
    pub fn tasks_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a Task> {
        self.tasks.values().filter(move |t| t.scope == *scope)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
