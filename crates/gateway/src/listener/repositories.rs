// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for `repository.*` commands.

use std::sync::Arc;

use chrono::Utc;
use harness_core::{CommandError, ObservedEvent, Repository};
use serde_json::{json, Value};

use super::{inject_scope, ConnState};
use crate::server::ServerCtx;

pub(crate) fn handle_list(ctx: &Arc<ServerCtx>, conn: &ConnState) -> Result<Value, CommandError> {
    let state = ctx.state.lock();
    let mut repositories: Vec<&Repository> = state
        .repositories_in(&conn.scope)
        .filter(|r| !r.is_archived())
        .collect();
    // homePriority orders the list; ties fall back to id
    repositories.sort_by(|a, b| {
        let pa = a.metadata.home_priority.unwrap_or(u64::MAX);
        let pb = b.metadata.home_priority.unwrap_or(u64::MAX);
        pa.cmp(&pb)
            .then_with(|| a.repository_id.as_str().cmp(b.repository_id.as_str()))
    });

    Ok(json!({"repositories": repositories}))
}

pub(crate) fn handle_upsert(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    mut repository: Value,
) -> Result<Value, CommandError> {
    inject_scope(&mut repository, &conn.scope)?;
    if let Some(map) = repository.as_object_mut() {
        if !map.contains_key("createdAt") {
            map.insert("createdAt".into(), json!(Utc::now().to_rfc3339()));
        }
    }

    let record = Repository::parse(&repository)
        .ok_or_else(|| CommandError::bad_request("malformed repository record"))?;

    let payload = serde_json::to_value(&record)
        .map_err(|e| CommandError::internal(format!("serialize repository: {e}")))?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::RepositoryUpserted {
            ts: Utc::now(),
            repository: payload.clone(),
        },
    )?;

    Ok(json!({"repository": payload}))
}

pub(crate) fn handle_update(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    repository_id: &str,
    patch: Value,
) -> Result<Value, CommandError> {
    let existing = {
        let state = ctx.state.lock();
        state
            .repositories
            .get(repository_id)
            .filter(|r| r.scope == conn.scope)
            .cloned()
            .ok_or_else(|| {
                CommandError::not_found(format!("unknown repository: {repository_id}"))
            })?
    };

    let Some(patch) = patch.as_object() else {
        return Err(CommandError::bad_request("patch must be an object"));
    };

    // Merge the patch over the serialized record, then re-parse so the
    // same validation applies to updates as to upserts
    let mut merged = serde_json::to_value(&existing)
        .map_err(|e| CommandError::internal(format!("serialize repository: {e}")))?;
    if let Some(map) = merged.as_object_mut() {
        for (key, value) in patch {
            if matches!(key.as_str(), "repositoryId" | "tenantId" | "userId" | "workspaceId") {
                return Err(CommandError::bad_request(format!(
                    "{key} cannot be changed by repository.update",
                )));
            }
            map.insert(key.clone(), value.clone());
        }
    }

    let record = Repository::parse(&merged)
        .ok_or_else(|| CommandError::bad_request("patch produces a malformed repository"))?;

    let payload = serde_json::to_value(&record)
        .map_err(|e| CommandError::internal(format!("serialize repository: {e}")))?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::RepositoryUpdated {
            ts: Utc::now(),
            repository: payload.clone(),
        },
    )?;

    Ok(json!({"repository": payload}))
}

pub(crate) fn handle_archive(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    repository_id: &str,
) -> Result<Value, CommandError> {
    {
        let state = ctx.state.lock();
        let repository = state
            .repositories
            .get(repository_id)
            .filter(|r| r.scope == conn.scope)
            .ok_or_else(|| {
                CommandError::not_found(format!("unknown repository: {repository_id}"))
            })?;
        if repository.is_archived() {
            return Err(CommandError::conflict(format!(
                "repository already archived: {repository_id}",
            )));
        }
    }

    ctx.emit(
        &conn.scope,
        ObservedEvent::RepositoryArchived {
            ts: Utc::now(),
            repository_id: repository_id.to_owned(),
        },
    )?;

    Ok(json!({"archived": true}))
}
