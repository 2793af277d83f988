// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project directory record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::DirectoryId;
use crate::parse;
use crate::scope::Scope;

/// A project root on disk.
///
/// Created by `directory.upsert`; soft-archived by `directory.archive`,
/// which cascades to delete all of its conversations from live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub directory_id: DirectoryId,
    #[serde(flatten)]
    pub scope: Scope,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Directory {
    /// Total parser for wire payloads. Returns `None` on any shape error.
    pub fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            directory_id: DirectoryId::new(parse::req_id(map, "directoryId")?),
            scope: Scope::parse(value)?,
            path: parse::req_str(map, "path")?,
            created_at: parse::opt_ts(map, "createdAt")?,
            archived_at: parse::opt_ts(map, "archivedAt")?,
        })
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
