// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for `task.*` commands.

use std::sync::Arc;

use chrono::Utc;
use harness_core::{
    CommandError, ObservedEvent, RepositoryId, Task, TaskId, TaskScopeKind, TaskStatus,
};
use serde_json::{json, Value};

use super::ConnState;
use crate::server::ServerCtx;

pub(crate) struct CreateParams {
    pub task_id: Option<String>,
    pub title: String,
    pub body: String,
    pub repository_id: Option<String>,
    pub project_id: Option<String>,
    pub branch_name: Option<String>,
    pub base_branch: Option<String>,
}

pub(crate) struct UpdateParams {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<String>,
    pub branch_name: Option<String>,
    pub base_branch: Option<String>,
    pub claimed_by: Option<Vec<String>>,
}

pub(crate) fn handle_list(ctx: &Arc<ServerCtx>, conn: &ConnState) -> Result<Value, CommandError> {
    let state = ctx.state.lock();
    let mut tasks: Vec<&Task> = state.tasks_in(&conn.scope).collect();
    tasks.sort_by(|a, b| {
        a.order_index
            .cmp(&b.order_index)
            .then_with(|| a.task_id.as_str().cmp(b.task_id.as_str()))
    });

    Ok(json!({"tasks": tasks}))
}

pub(crate) fn handle_create(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    params: CreateParams,
) -> Result<Value, CommandError> {
    if params.title.is_empty() {
        return Err(CommandError::bad_request("title must be non-empty"));
    }

    let task_id = params
        .task_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let (conflict, next_index) = {
        let state = ctx.state.lock();
        let conflict = state.tasks.contains_key(&task_id);
        let next_index = state
            .tasks_in(&conn.scope)
            .map(|t| t.order_index + 1)
            .max()
            .unwrap_or(0);
        (conflict, next_index)
    };
    if conflict {
        return Err(CommandError::conflict(format!(
            "task already exists: {task_id}",
        )));
    }

    let scope_kind = if params.project_id.is_some() {
        TaskScopeKind::Project
    } else if params.repository_id.is_some() {
        TaskScopeKind::Repository
    } else {
        TaskScopeKind::Global
    };

    let now = Utc::now();
    let task = Task {
        task_id: TaskId::new(task_id),
        scope: conn.scope.clone(),
        repository_id: params.repository_id.map(RepositoryId::new),
        project_id: params.project_id,
        scope_kind,
        title: params.title,
        body: params.body,
        status: TaskStatus::Draft,
        order_index: next_index,
        claimed_by: Vec::new(),
        branch_name: params.branch_name,
        base_branch: params.base_branch,
        claimed_at: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };

    let payload = serialize(&task)?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::TaskCreated {
            ts: now,
            task: payload.clone(),
        },
    )?;

    Ok(json!({"task": payload}))
}

fn lookup(ctx: &Arc<ServerCtx>, conn: &ConnState, task_id: &str) -> Result<Task, CommandError> {
    let state = ctx.state.lock();
    state
        .get_task(task_id)
        .filter(|t| t.scope == conn.scope)
        .cloned()
        .ok_or_else(|| CommandError::not_found(format!("unknown task: {task_id}")))
}

fn serialize(task: &Task) -> Result<Value, CommandError> {
    serde_json::to_value(task).map_err(|e| CommandError::internal(format!("serialize task: {e}")))
}

fn apply_transition(task: &mut Task, to: TaskStatus) -> Result<(), CommandError> {
    if !task.status.can_transition(to) {
        return Err(CommandError::conflict(format!(
            "illegal task transition {} -> {}",
            task.status.as_str(),
            to.as_str(),
        )));
    }
    task.status = to;
    let now = Utc::now();
    task.updated_at = now;
    if to == TaskStatus::Completed {
        task.completed_at = Some(now);
    }
    Ok(())
}

pub(crate) fn handle_update(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    task_id: &str,
    params: UpdateParams,
) -> Result<Value, CommandError> {
    let mut task = lookup(ctx, conn, task_id)?;

    if let Some(title) = params.title {
        if title.is_empty() {
            return Err(CommandError::bad_request("title must be non-empty"));
        }
        task.title = title;
    }
    if let Some(body) = params.body {
        task.body = body;
    }
    if let Some(branch_name) = params.branch_name {
        task.branch_name = Some(branch_name);
    }
    if let Some(base_branch) = params.base_branch {
        task.base_branch = Some(base_branch);
    }
    if let Some(claimed_by) = params.claimed_by {
        if !claimed_by.is_empty() && task.claimed_at.is_none() {
            task.claimed_at = Some(Utc::now());
        }
        task.claimed_by = claimed_by;
    }
    if let Some(status) = params.status {
        let to = TaskStatus::parse(&Value::String(status.clone()))
            .ok_or_else(|| CommandError::bad_request(format!("unknown status: {status}")))?;
        apply_transition(&mut task, to)?;
    }
    task.updated_at = Utc::now();

    let payload = serialize(&task)?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::TaskUpdated {
            ts: task.updated_at,
            task: payload.clone(),
        },
    )?;

    Ok(json!({"task": payload}))
}

/// `task.ready` / `task.draft` / `task.complete`.
pub(crate) fn handle_transition(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    task_id: &str,
    to: TaskStatus,
) -> Result<Value, CommandError> {
    let mut task = lookup(ctx, conn, task_id)?;
    apply_transition(&mut task, to)?;

    let payload = serialize(&task)?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::TaskUpdated {
            ts: task.updated_at,
            task: payload.clone(),
        },
    )?;

    Ok(json!({"task": payload}))
}

/// Replace the entire ordering atomically with one bulk event.
pub(crate) fn handle_reorder(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    task_ids: &[String],
) -> Result<Value, CommandError> {
    if task_ids.is_empty() {
        return Err(CommandError::bad_request("task_ids must be non-empty"));
    }

    let mut reordered = Vec::with_capacity(task_ids.len());
    {
        let state = ctx.state.lock();
        let in_scope = state.tasks_in(&conn.scope).count();
        if task_ids.len() != in_scope {
            return Err(CommandError::bad_request(format!(
                "reorder must list every task in scope ({} listed, {} exist)",
                task_ids.len(),
                in_scope,
            )));
        }
        let now = Utc::now();
        for (index, id) in task_ids.iter().enumerate() {
            let mut task = state
                .tasks
                .get(id)
                .filter(|t| t.scope == conn.scope)
                .cloned()
                .ok_or_else(|| CommandError::not_found(format!("unknown task: {id}")))?;
            task.order_index = index as u64;
            task.updated_at = now;
            reordered.push(task);
        }
    }

    let payloads: Vec<Value> = reordered
        .iter()
        .map(serialize)
        .collect::<Result<_, _>>()?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::TaskReordered {
            ts: Utc::now(),
            tasks: payloads.clone(),
        },
    )?;

    Ok(json!({"tasks": payloads}))
}

pub(crate) fn handle_delete(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    task_id: &str,
) -> Result<Value, CommandError> {
    let task = lookup(ctx, conn, task_id)?;
    let id = task.task_id.as_str().to_owned();

    ctx.emit(
        &conn.scope,
        ObservedEvent::TaskDeleted {
            ts: Utc::now(),
            task_id: id.clone(),
        },
    )?;

    Ok(json!({"deleted": true, "taskId": id}))
}
