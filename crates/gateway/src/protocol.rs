// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed command/reply/event frames for the control-plane protocol.
//!
//! Command shape: `{requestId, type, ...args}`. Reply shape:
//! `{requestId, ok: true, result}` or `{requestId, ok: false, error}`.
//! Server-pushed events carry a `type` tag (`observed`, `pty.output`,
//! `pty.exit`).

use std::collections::HashMap;

use harness_core::{CommandError, ObservedEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One client frame: request id plus the typed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    #[serde(rename = "requestId")]
    pub request_id: u64,
    #[serde(flatten)]
    pub command: Command,
}

/// Commands dispatched by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Authenticate and negotiate the connection scope.
    #[serde(rename = "hello", rename_all = "camelCase")]
    Hello {
        auth_token: String,
        tenant_id: String,
        user_id: String,
        workspace_id: String,
    },

    /// Subscribe to workspace-scoped observed events.
    #[serde(rename = "subscribe", rename_all = "camelCase")]
    Subscribe {
        #[serde(default)]
        since_cursor: Option<u64>,
    },

    #[serde(rename = "gateway.status")]
    GatewayStatus,

    #[serde(rename = "gateway.stop", rename_all = "camelCase")]
    GatewayStop {
        #[serde(default)]
        force: bool,
    },

    // -- pty --
    #[serde(rename = "pty.start", rename_all = "camelCase")]
    PtyStart {
        session_id: String,
        args: Vec<String>,
        #[serde(default)]
        env: Option<HashMap<String, String>>,
        #[serde(default)]
        cwd: Option<String>,
        cols: u16,
        rows: u16,
        #[serde(default)]
        worktree_id: Option<String>,
        #[serde(default)]
        fg: Option<String>,
        #[serde(default)]
        bg: Option<String>,
        #[serde(default)]
        directory_id: Option<String>,
        #[serde(default)]
        agent_type: Option<String>,
    },

    #[serde(rename = "pty.attach", rename_all = "camelCase")]
    PtyAttach {
        session_id: String,
        #[serde(default)]
        since_cursor: u64,
    },

    #[serde(rename = "pty.detach", rename_all = "camelCase")]
    PtyDetach { session_id: String },

    #[serde(rename = "pty.subscribe-events", rename_all = "camelCase")]
    PtySubscribeEvents { session_id: String },

    #[serde(rename = "pty.unsubscribe-events", rename_all = "camelCase")]
    PtyUnsubscribeEvents { session_id: String },

    #[serde(rename = "pty.close", rename_all = "camelCase")]
    PtyClose { session_id: String },

    #[serde(rename = "pty.resize", rename_all = "camelCase")]
    PtyResize {
        session_id: String,
        cols: u16,
        rows: u16,
    },

    // -- session --
    #[serde(rename = "session.respond", rename_all = "camelCase")]
    SessionRespond { session_id: String, text: String },

    #[serde(rename = "session.interrupt", rename_all = "camelCase")]
    SessionInterrupt { session_id: String },

    #[serde(rename = "session.claim", rename_all = "camelCase")]
    SessionClaim {
        session_id: String,
        controller_id: String,
        controller_type: String,
        #[serde(default)]
        controller_label: Option<String>,
        #[serde(default)]
        takeover: bool,
    },

    #[serde(rename = "session.release", rename_all = "camelCase")]
    SessionRelease {
        session_id: String,
        controller_id: String,
    },

    #[serde(rename = "session.remove", rename_all = "camelCase")]
    SessionRemove { session_id: String },

    #[serde(rename = "session.list")]
    SessionList,

    #[serde(rename = "session.status", rename_all = "camelCase")]
    SessionStatus { session_id: String },

    // -- repository --
    #[serde(rename = "repository.list")]
    RepositoryList,

    #[serde(rename = "repository.upsert", rename_all = "camelCase")]
    RepositoryUpsert { repository: Value },

    #[serde(rename = "repository.update", rename_all = "camelCase")]
    RepositoryUpdate {
        repository_id: String,
        patch: Value,
    },

    #[serde(rename = "repository.archive", rename_all = "camelCase")]
    RepositoryArchive { repository_id: String },

    // -- directory --
    #[serde(rename = "directory.upsert", rename_all = "camelCase")]
    DirectoryUpsert { directory: Value },

    #[serde(rename = "directory.list")]
    DirectoryList,

    #[serde(rename = "directory.archive", rename_all = "camelCase")]
    DirectoryArchive { directory_id: String },

    #[serde(rename = "directory.git-status", rename_all = "camelCase")]
    DirectoryGitStatus { directory_id: String },

    // -- conversation --
    #[serde(rename = "conversation.create", rename_all = "camelCase")]
    ConversationCreate {
        conversation_id: String,
        directory_id: String,
        title: String,
        agent_type: String,
        #[serde(default)]
        adapter_state: Value,
    },

    #[serde(rename = "conversation.list")]
    ConversationList,

    #[serde(rename = "conversation.update", rename_all = "camelCase")]
    ConversationUpdate {
        conversation_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        adapter_state: Option<Value>,
    },

    #[serde(rename = "conversation.title.refresh", rename_all = "camelCase")]
    ConversationTitleRefresh {
        conversation_id: String,
        #[serde(default)]
        force: bool,
    },

    #[serde(rename = "conversation.archive", rename_all = "camelCase")]
    ConversationArchive { conversation_id: String },

    // -- task --
    #[serde(rename = "task.list")]
    TaskList,

    #[serde(rename = "task.create", rename_all = "camelCase")]
    TaskCreate {
        #[serde(default)]
        task_id: Option<String>,
        title: String,
        #[serde(default)]
        body: String,
        #[serde(default)]
        repository_id: Option<String>,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        branch_name: Option<String>,
        #[serde(default)]
        base_branch: Option<String>,
    },

    #[serde(rename = "task.update", rename_all = "camelCase")]
    TaskUpdate {
        task_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        branch_name: Option<String>,
        #[serde(default)]
        base_branch: Option<String>,
        #[serde(default)]
        claimed_by: Option<Vec<String>>,
    },

    #[serde(rename = "task.ready", rename_all = "camelCase")]
    TaskReady { task_id: String },

    #[serde(rename = "task.draft", rename_all = "camelCase")]
    TaskDraft { task_id: String },

    #[serde(rename = "task.complete", rename_all = "camelCase")]
    TaskComplete { task_id: String },

    #[serde(rename = "task.reorder", rename_all = "camelCase")]
    TaskReorder { task_ids: Vec<String> },

    #[serde(rename = "task.delete", rename_all = "camelCase")]
    TaskDelete { task_id: String },

    // -- diagnostics --
    #[serde(rename = "render-trace.start")]
    RenderTraceStart,

    #[serde(rename = "render-trace.stop")]
    RenderTraceStop,

    #[serde(rename = "profile.start")]
    ProfileStart,

    #[serde(rename = "profile.stop")]
    ProfileStop,
}

/// Reply to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "requestId")]
    pub request_id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl Reply {
    pub fn ok(request_id: u64, result: Value) -> Self {
        Self {
            request_id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(request_id: u64, error: CommandError) -> Self {
        Self {
            request_id,
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Server-pushed event frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventFrame {
    #[serde(rename = "observed", rename_all = "camelCase")]
    Observed {
        subscription_id: String,
        cursor: u64,
        event: ObservedEvent,
    },

    /// Raw session output; `bytes` is base64.
    #[serde(rename = "pty.output", rename_all = "camelCase")]
    PtyOutput {
        session_id: String,
        cursor: u64,
        bytes: String,
    },

    #[serde(rename = "pty.exit", rename_all = "camelCase")]
    PtyExit {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<i32>,
    },
}

/// Any frame the server writes to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Reply(Reply),
    Event(EventFrame),
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
