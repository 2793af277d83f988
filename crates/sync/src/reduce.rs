// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure observed-event reducer.
//!
//! `reduce(state, event)` returns a new state plus diff sets. Malformed
//! payloads reduce to the same state with `changed = false`. Untouched
//! sub-maps keep their `Arc` identity so selectors can memoize by pointer
//! comparison.

use std::sync::Arc;

use harness_core::{
    Conversation, Directory, ObservedEvent, Repository, SessionStatusPayload, Task,
};
use tracing::debug;

use crate::state::SyncedState;

/// Result of applying one observed event.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    pub upserted_directory_ids: Vec<String>,
    pub upserted_conversation_ids: Vec<String>,
    pub upserted_repository_ids: Vec<String>,
    pub upserted_task_ids: Vec<String>,
    pub removed_conversation_ids: Vec<String>,
    pub removed_task_ids: Vec<String>,
}

/// New state plus what changed.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub state: SyncedState,
    pub changed: bool,
    pub diff: Diff,
}

impl Reduction {
    fn unchanged(state: &SyncedState) -> Self {
        Self {
            state: state.clone(),
            changed: false,
            diff: Diff::default(),
        }
    }
}

/// Apply an ordered observed event to the synced state.
pub fn reduce(state: &SyncedState, event: &ObservedEvent) -> Reduction {
    match event {
        ObservedEvent::DirectoryUpserted { directory, .. } => {
            let Some(dir) = Directory::parse(directory) else {
                debug!(kind = event.kind(), "dropping malformed payload");
                return Reduction::unchanged(state);
            };
            let id = dir.directory_id.as_str().to_owned();
            let mut directories = (*state.directories).clone();
            directories.insert(id.clone(), dir);
            Reduction {
                state: SyncedState {
                    directories: Arc::new(directories),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    upserted_directory_ids: vec![id],
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::DirectoryArchived {
            ts, directory_id, ..
        } => {
            let removed: Vec<String> = state
                .conversations
                .values()
                .filter(|c| c.directory_id.as_str() == directory_id)
                .map(|c| c.conversation_id.as_str().to_owned())
                .collect();
            let has_directory = state.directories.contains_key(directory_id);
            if removed.is_empty() && !has_directory {
                return Reduction::unchanged(state);
            }

            let directories = if has_directory {
                let mut map = (*state.directories).clone();
                if let Some(dir) = map.get_mut(directory_id) {
                    dir.archived_at = Some(*ts);
                }
                Arc::new(map)
            } else {
                Arc::clone(&state.directories)
            };
            let conversations = if removed.is_empty() {
                Arc::clone(&state.conversations)
            } else {
                let mut map = (*state.conversations).clone();
                for id in &removed {
                    map.remove(id);
                }
                Arc::new(map)
            };

            Reduction {
                state: SyncedState {
                    directories,
                    conversations,
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    removed_conversation_ids: removed,
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::ConversationCreated { conversation, .. }
        | ObservedEvent::ConversationUpdated { conversation, .. } => {
            let Some(conv) = Conversation::parse(conversation) else {
                debug!(kind = event.kind(), "dropping malformed payload");
                return Reduction::unchanged(state);
            };
            let id = conv.conversation_id.as_str().to_owned();
            let mut conversations = (*state.conversations).clone();
            conversations.insert(id.clone(), conv);
            Reduction {
                state: SyncedState {
                    conversations: Arc::new(conversations),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    upserted_conversation_ids: vec![id],
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::ConversationArchived {
            conversation_id, ..
        }
        | ObservedEvent::ConversationDeleted {
            conversation_id, ..
        } => {
            if !state.conversations.contains_key(conversation_id) {
                return Reduction::unchanged(state);
            }
            let mut conversations = (*state.conversations).clone();
            conversations.remove(conversation_id);
            Reduction {
                state: SyncedState {
                    conversations: Arc::new(conversations),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    removed_conversation_ids: vec![conversation_id.clone()],
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::RepositoryUpserted { repository, .. }
        | ObservedEvent::RepositoryUpdated { repository, .. } => {
            let Some(repo) = Repository::parse(repository) else {
                debug!(kind = event.kind(), "dropping malformed payload");
                return Reduction::unchanged(state);
            };
            let id = repo.repository_id.as_str().to_owned();
            let mut repositories = (*state.repositories).clone();
            repositories.insert(id.clone(), repo);
            Reduction {
                state: SyncedState {
                    repositories: Arc::new(repositories),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    upserted_repository_ids: vec![id],
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::RepositoryArchived {
            ts, repository_id, ..
        } => {
            if !state.repositories.contains_key(repository_id) {
                return Reduction::unchanged(state);
            }
            let mut repositories = (*state.repositories).clone();
            if let Some(repo) = repositories.get_mut(repository_id) {
                repo.archived_at = Some(*ts);
            }
            Reduction {
                state: SyncedState {
                    repositories: Arc::new(repositories),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    upserted_repository_ids: vec![repository_id.clone()],
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::TaskCreated { task, .. } | ObservedEvent::TaskUpdated { task, .. } => {
            let Some(task) = Task::parse(task) else {
                debug!(kind = event.kind(), "dropping malformed payload");
                return Reduction::unchanged(state);
            };
            let id = task.task_id.as_str().to_owned();
            let mut tasks = (*state.tasks).clone();
            tasks.insert(id.clone(), task);
            Reduction {
                state: SyncedState {
                    tasks: Arc::new(tasks),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    upserted_task_ids: vec![id],
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::TaskDeleted { task_id, .. } => {
            if !state.tasks.contains_key(task_id) {
                return Reduction::unchanged(state);
            }
            let mut tasks = (*state.tasks).clone();
            tasks.remove(task_id);
            Reduction {
                state: SyncedState {
                    tasks: Arc::new(tasks),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    removed_task_ids: vec![task_id.clone()],
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::TaskReordered { tasks, .. } => {
            let parsed: Vec<Task> = tasks.iter().filter_map(Task::parse).collect();
            if parsed.is_empty() {
                // Every embedded record failed to parse
                return Reduction::unchanged(state);
            }
            let mut map = (*state.tasks).clone();
            let ids: Vec<String> = parsed
                .iter()
                .map(|t| t.task_id.as_str().to_owned())
                .collect();
            for task in parsed {
                map.insert(task.task_id.as_str().to_owned(), task);
            }
            Reduction {
                state: SyncedState {
                    tasks: Arc::new(map),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    upserted_task_ids: ids,
                    ..Diff::default()
                },
            }
        }

        ObservedEvent::SessionStatus {
            conversation_id,
            status,
            ..
        } => {
            let Some(payload) = SessionStatusPayload::parse(status) else {
                debug!(kind = event.kind(), "dropping malformed payload");
                return Reduction::unchanged(state);
            };
            let Some(existing) = state.conversations.get(conversation_id) else {
                // No-op when the conversation is absent
                return Reduction::unchanged(state);
            };
            let mut updated = existing.clone();
            updated.runtime_status = payload.runtime_status;
            updated.runtime_live = payload.live;
            if let Some(model) = payload.status_model {
                updated.runtime_status_model = Some(model);
            }
            if updated == *existing {
                return Reduction::unchanged(state);
            }
            let mut conversations = (*state.conversations).clone();
            conversations.insert(conversation_id.clone(), updated);
            Reduction {
                state: SyncedState {
                    conversations: Arc::new(conversations),
                    ..state.clone()
                },
                changed: true,
                diff: Diff {
                    upserted_conversation_ids: vec![conversation_id.clone()],
                    ..Diff::default()
                },
            }
        }
    }
}

#[cfg(test)]
#[path = "reduce_tests.rs"]
mod tests;
