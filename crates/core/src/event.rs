// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observed events — server-emitted records describing durable state
//! changes.
//!
//! Record-carrying variants hold raw JSON payloads: events arrive over the
//! wire untrusted, and the reducer runs them through the total record
//! parsers, treating malformed payloads as no-ops. Serializes with
//! `{"type": "kind-name", ...fields}` format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse;
use crate::session::{Controller, RuntimeStatus, StatusModel};

/// Events applied to the synced state by the observed-event reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObservedEvent {
    #[serde(rename = "directory-upserted")]
    DirectoryUpserted { ts: DateTime<Utc>, directory: Value },

    #[serde(rename = "directory-archived")]
    DirectoryArchived {
        ts: DateTime<Utc>,
        #[serde(rename = "directoryId")]
        directory_id: String,
    },

    #[serde(rename = "conversation-created")]
    ConversationCreated {
        ts: DateTime<Utc>,
        conversation: Value,
    },

    #[serde(rename = "conversation-updated")]
    ConversationUpdated {
        ts: DateTime<Utc>,
        conversation: Value,
    },

    #[serde(rename = "conversation-archived")]
    ConversationArchived {
        ts: DateTime<Utc>,
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },

    #[serde(rename = "conversation-deleted")]
    ConversationDeleted {
        ts: DateTime<Utc>,
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },

    #[serde(rename = "repository-upserted")]
    RepositoryUpserted { ts: DateTime<Utc>, repository: Value },

    #[serde(rename = "repository-updated")]
    RepositoryUpdated { ts: DateTime<Utc>, repository: Value },

    #[serde(rename = "repository-archived")]
    RepositoryArchived {
        ts: DateTime<Utc>,
        #[serde(rename = "repositoryId")]
        repository_id: String,
    },

    #[serde(rename = "task-created")]
    TaskCreated { ts: DateTime<Utc>, task: Value },

    #[serde(rename = "task-updated")]
    TaskUpdated { ts: DateTime<Utc>, task: Value },

    #[serde(rename = "task-deleted")]
    TaskDeleted {
        ts: DateTime<Utc>,
        #[serde(rename = "taskId")]
        task_id: String,
    },

    /// Bulk upsert replacing the order of every embedded task.
    #[serde(rename = "task-reordered")]
    TaskReordered { ts: DateTime<Utc>, tasks: Vec<Value> },

    /// Runtime status change for the conversation with the same id.
    #[serde(rename = "session-status")]
    SessionStatus {
        ts: DateTime<Utc>,
        #[serde(rename = "conversationId")]
        conversation_id: String,
        status: Value,
    },
}

impl ObservedEvent {
    /// Wire name of the event kind, for logs and traces.
    pub fn kind(&self) -> &'static str {
        match self {
            ObservedEvent::DirectoryUpserted { .. } => "directory-upserted",
            ObservedEvent::DirectoryArchived { .. } => "directory-archived",
            ObservedEvent::ConversationCreated { .. } => "conversation-created",
            ObservedEvent::ConversationUpdated { .. } => "conversation-updated",
            ObservedEvent::ConversationArchived { .. } => "conversation-archived",
            ObservedEvent::ConversationDeleted { .. } => "conversation-deleted",
            ObservedEvent::RepositoryUpserted { .. } => "repository-upserted",
            ObservedEvent::RepositoryUpdated { .. } => "repository-updated",
            ObservedEvent::RepositoryArchived { .. } => "repository-archived",
            ObservedEvent::TaskCreated { .. } => "task-created",
            ObservedEvent::TaskUpdated { .. } => "task-updated",
            ObservedEvent::TaskDeleted { .. } => "task-deleted",
            ObservedEvent::TaskReordered { .. } => "task-reordered",
            ObservedEvent::SessionStatus { .. } => "session-status",
        }
    }

    pub fn ts(&self) -> DateTime<Utc> {
        match self {
            ObservedEvent::DirectoryUpserted { ts, .. }
            | ObservedEvent::DirectoryArchived { ts, .. }
            | ObservedEvent::ConversationCreated { ts, .. }
            | ObservedEvent::ConversationUpdated { ts, .. }
            | ObservedEvent::ConversationArchived { ts, .. }
            | ObservedEvent::ConversationDeleted { ts, .. }
            | ObservedEvent::RepositoryUpserted { ts, .. }
            | ObservedEvent::RepositoryUpdated { ts, .. }
            | ObservedEvent::RepositoryArchived { ts, .. }
            | ObservedEvent::TaskCreated { ts, .. }
            | ObservedEvent::TaskUpdated { ts, .. }
            | ObservedEvent::TaskDeleted { ts, .. }
            | ObservedEvent::TaskReordered { ts, .. }
            | ObservedEvent::SessionStatus { ts, .. } => *ts,
        }
    }
}

/// Parsed payload of a `session-status` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusPayload {
    pub runtime_status: RuntimeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_model: Option<StatusModel>,
    pub live: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<Controller>,
}

impl SessionStatusPayload {
    /// Total parser for the `status` payload of a `session-status` event.
    pub fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let status_model = match map.get("statusModel") {
            None | Some(Value::Null) => None,
            Some(v) => Some(StatusModel::parse(v)?),
        };
        let controller = match map.get("controller") {
            None | Some(Value::Null) => None,
            Some(v) => Some(Controller::parse(v)?),
        };
        Some(Self {
            runtime_status: RuntimeStatus::parse(map.get("runtimeStatus")?)?,
            status_model,
            live: parse::req_bool(map, "live")?,
            controller,
        })
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
