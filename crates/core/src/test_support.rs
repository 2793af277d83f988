// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::event::ObservedEvent;
use crate::scope::Scope;

/// Fixed timestamp used by the builders.
pub fn test_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Default test scope.
pub fn test_scope() -> Scope {
    Scope::new("t1", "u1", "w1")
}

fn scope_fields(value: &mut Value) {
    if let Some(map) = value.as_object_mut() {
        map.insert("tenantId".into(), json!("t1"));
        map.insert("userId".into(), json!("u1"));
        map.insert("workspaceId".into(), json!("w1"));
    }
}

// ── Record payload builders ──────────────────────────────────────────────────

pub fn directory_json(id: &str, path: &str) -> Value {
    let mut v = json!({
        "directoryId": id,
        "path": path,
        "createdAt": test_ts().to_rfc3339(),
    });
    scope_fields(&mut v);
    v
}

pub fn repository_json(id: &str, name: &str) -> Value {
    let mut v = json!({
        "repositoryId": id,
        "name": name,
        "remoteUrl": format!("git@example.com:{name}.git"),
        "defaultBranch": "main",
        "metadata": {},
    });
    scope_fields(&mut v);
    v
}

pub fn task_json(id: &str, title: &str, status: &str, order_index: u64) -> Value {
    let mut v = json!({
        "taskId": id,
        "title": title,
        "body": "",
        "status": status,
        "orderIndex": order_index,
        "claimedBy": [],
        "createdAt": test_ts().to_rfc3339(),
        "updatedAt": test_ts().to_rfc3339(),
    });
    scope_fields(&mut v);
    v
}

pub fn conversation_json(id: &str, directory_id: &str, title: &str) -> Value {
    let mut v = json!({
        "conversationId": id,
        "directoryId": directory_id,
        "title": title,
        "agentType": "codex",
        "adapterState": {},
        "runtimeStatus": "running",
        "runtimeLive": true,
    });
    scope_fields(&mut v);
    v
}

pub fn session_status_json(runtime_status: &str, live: bool) -> Value {
    json!({
        "runtimeStatus": runtime_status,
        "live": live,
    })
}

// ── Event factory functions ──────────────────────────────────────────────────

pub fn directory_upserted(id: &str, path: &str) -> ObservedEvent {
    ObservedEvent::DirectoryUpserted {
        ts: test_ts(),
        directory: directory_json(id, path),
    }
}

pub fn directory_archived(id: &str) -> ObservedEvent {
    ObservedEvent::DirectoryArchived {
        ts: test_ts(),
        directory_id: id.to_string(),
    }
}

pub fn conversation_created(id: &str, directory_id: &str, title: &str) -> ObservedEvent {
    ObservedEvent::ConversationCreated {
        ts: test_ts(),
        conversation: conversation_json(id, directory_id, title),
    }
}

pub fn conversation_updated(id: &str, directory_id: &str, title: &str) -> ObservedEvent {
    ObservedEvent::ConversationUpdated {
        ts: test_ts(),
        conversation: conversation_json(id, directory_id, title),
    }
}

pub fn conversation_deleted(id: &str) -> ObservedEvent {
    ObservedEvent::ConversationDeleted {
        ts: test_ts(),
        conversation_id: id.to_string(),
    }
}

pub fn repository_upserted(id: &str, name: &str) -> ObservedEvent {
    ObservedEvent::RepositoryUpserted {
        ts: test_ts(),
        repository: repository_json(id, name),
    }
}

pub fn task_created(id: &str, title: &str, order_index: u64) -> ObservedEvent {
    ObservedEvent::TaskCreated {
        ts: test_ts(),
        task: task_json(id, title, "ready", order_index),
    }
}

pub fn task_deleted(id: &str) -> ObservedEvent {
    ObservedEvent::TaskDeleted {
        ts: test_ts(),
        task_id: id.to_string(),
    }
}

pub fn task_reordered(tasks: Vec<Value>) -> ObservedEvent {
    ObservedEvent::TaskReordered {
        ts: test_ts(),
        tasks,
    }
}

pub fn session_status(conversation_id: &str, runtime_status: &str, live: bool) -> ObservedEvent {
    ObservedEvent::SessionStatus {
        ts: test_ts(),
        conversation_id: conversation_id.to_string(),
        status: session_status_json(runtime_status, live),
    }
}
