// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::RepositoryId;
use crate::parse;
use crate::scope::Scope;

/// Repository metadata blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryMetadata {
    /// Optional non-negative ordering weight for home-screen placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_priority: Option<u64>,
}

impl RepositoryMetadata {
    fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            home_priority: parse::opt_u64(map, "homePriority")?,
        })
    }
}

/// A tracked repository.
///
/// Archived repositories retain their record but become invisible to
/// active selections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub repository_id: RepositoryId,
    #[serde(flatten)]
    pub scope: Scope,
    pub name: String,
    pub remote_url: String,
    pub default_branch: String,
    #[serde(default)]
    pub metadata: RepositoryMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// Total parser for wire payloads. Returns `None` on any shape error.
    pub fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let metadata = match map.get("metadata") {
            None | Some(Value::Null) => RepositoryMetadata::default(),
            Some(v) => RepositoryMetadata::parse(v)?,
        };
        Some(Self {
            repository_id: RepositoryId::new(parse::req_id(map, "repositoryId")?),
            scope: Scope::parse(value)?,
            name: parse::req_str(map, "name")?,
            remote_url: parse::req_str(map, "remoteUrl")?,
            default_branch: parse::req_str(map, "defaultBranch")?,
            metadata,
            created_at: parse::opt_ts(map, "createdAt")?,
            archived_at: parse::opt_ts(map, "archivedAt")?,
        })
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
