// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for `directory.*` commands.

use std::sync::Arc;

use chrono::Utc;
use harness_core::{CommandError, Directory, ObservedEvent};
use serde_json::{json, Value};

use super::{inject_scope, ConnState};
use crate::server::ServerCtx;

pub(crate) fn handle_upsert(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    mut directory: Value,
) -> Result<Value, CommandError> {
    inject_scope(&mut directory, &conn.scope)?;
    if let Some(map) = directory.as_object_mut() {
        if !map.contains_key("createdAt") {
            map.insert("createdAt".into(), json!(Utc::now().to_rfc3339()));
        }
    }

    // Single-record parse failure escalates to bad_request
    let record = Directory::parse(&directory)
        .ok_or_else(|| CommandError::bad_request("malformed directory record"))?;

    let payload = serde_json::to_value(&record)
        .map_err(|e| CommandError::internal(format!("serialize directory: {e}")))?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::DirectoryUpserted {
            ts: Utc::now(),
            directory: payload.clone(),
        },
    )?;

    Ok(json!({"directory": payload}))
}

pub(crate) fn handle_list(ctx: &Arc<ServerCtx>, conn: &ConnState) -> Result<Value, CommandError> {
    let state = ctx.state.lock();
    let mut directories: Vec<&Directory> = state
        .directories_in(&conn.scope)
        .filter(|d| !d.is_archived())
        .collect();
    directories.sort_by(|a, b| a.directory_id.as_str().cmp(b.directory_id.as_str()));

    Ok(json!({"directories": directories}))
}

pub(crate) fn handle_archive(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    directory_id: &str,
) -> Result<Value, CommandError> {
    let removed: Vec<String> = {
        let state = ctx.state.lock();
        let directory = state
            .directories
            .get(directory_id)
            .filter(|d| d.scope == conn.scope)
            .ok_or_else(|| CommandError::not_found(format!("unknown directory: {directory_id}")))?;
        if directory.is_archived() {
            return Err(CommandError::conflict(format!(
                "directory already archived: {directory_id}",
            )));
        }
        state
            .conversations_in(&conn.scope)
            .filter(|c| c.directory_id.as_str() == directory_id)
            .map(|c| c.conversation_id.as_str().to_owned())
            .collect()
    };

    ctx.emit(
        &conn.scope,
        ObservedEvent::DirectoryArchived {
            ts: Utc::now(),
            directory_id: directory_id.to_owned(),
        },
    )?;

    Ok(json!({
        "archived": true,
        "removedConversationIds": removed,
    }))
}

/// Git traversal is an external collaborator; the gateway only answers
/// with a typed "unavailable" result.
pub(crate) fn handle_git_status(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    directory_id: &str,
) -> Result<Value, CommandError> {
    let state = ctx.state.lock();
    state
        .directories
        .get(directory_id)
        .filter(|d| d.scope == conn.scope)
        .ok_or_else(|| CommandError::not_found(format!("unknown directory: {directory_id}")))?;

    Ok(json!({
        "available": false,
        "reason": "git status collection runs in the client, not the gateway",
    }))
}
