// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record with a checked status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{RepositoryId, TaskId};
use crate::parse;
use crate::scope::Scope;

/// Which level a task is attached to, derived from the presence of
/// `projectId`/`repositoryId` when absent from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskScopeKind {
    Global,
    Repository,
    Project,
}

impl TaskScopeKind {
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "global" => Some(TaskScopeKind::Global),
            "repository" => Some(TaskScopeKind::Repository),
            "project" => Some(TaskScopeKind::Project),
            _ => None,
        }
    }
}

/// Task lifecycle status.
///
/// Transitions obey `draft ↔ ready → in-progress → completed`; skipping
/// states is rejected. The legacy `"queued"` wire value normalizes to
/// `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Draft,
    Ready,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "draft" => Some(TaskStatus::Draft),
            "ready" | "queued" => Some(TaskStatus::Ready),
            "in-progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Draft => "draft",
            TaskStatus::Ready => "ready",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Whether `self → to` is a legal single-step transition.
    pub fn can_transition(self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Draft, TaskStatus::Ready)
                | (TaskStatus::Ready, TaskStatus::Draft)
                | (TaskStatus::Ready, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
        )
    }
}

/// A unit of work attached to a repository, project, or the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<RepositoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub scope_kind: TaskScopeKind,
    pub title: String,
    pub body: String,
    pub status: TaskStatus,
    pub order_index: u64,
    #[serde(default)]
    pub claimed_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Total parser for wire payloads. Returns `None` on any shape error.
    ///
    /// Normalizes legacy aliases: `"queued"` status parses as `Ready`, and
    /// a missing `scopeKind` is inferred from `projectId`/`repositoryId`.
    pub fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let repository_id = parse::opt_id(map, "repositoryId")?.map(RepositoryId::new);
        let project_id = parse::opt_id(map, "projectId")?;
        let scope_kind = match map.get("scopeKind") {
            None | Some(Value::Null) => infer_scope_kind(&repository_id, &project_id),
            Some(v) => TaskScopeKind::parse(v)?,
        };
        let claimed_by = match map.get("claimedBy") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.as_str()?.to_owned());
                }
                out
            }
            Some(_) => return None,
        };
        Some(Self {
            task_id: TaskId::new(parse::req_id(map, "taskId")?),
            scope: Scope::parse(value)?,
            repository_id,
            project_id,
            scope_kind,
            title: parse::req_str(map, "title")?,
            body: parse::req_str(map, "body")?,
            status: TaskStatus::parse(map.get("status")?)?,
            order_index: parse::req_u64(map, "orderIndex")?,
            claimed_by,
            branch_name: parse::opt_str(map, "branchName")?,
            base_branch: parse::opt_str(map, "baseBranch")?,
            claimed_at: parse::opt_ts(map, "claimedAt")?,
            completed_at: parse::opt_ts(map, "completedAt")?,
            created_at: parse::req_ts(map, "createdAt")?,
            updated_at: parse::req_ts(map, "updatedAt")?,
        })
    }
}

fn infer_scope_kind(
    repository_id: &Option<RepositoryId>,
    project_id: &Option<String>,
) -> TaskScopeKind {
    if project_id.is_some() {
        TaskScopeKind::Project
    } else if repository_id.is_some() {
        TaskScopeKind::Repository
    } else {
        TaskScopeKind::Global
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
