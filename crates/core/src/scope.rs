// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scope triple carried by every persisted record.
//!
//! Commands and subscriptions are always scoped; the gateway rejects
//! cross-scope reads and writes. The triple is immutable for the life
//! of a record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse;

/// `(tenantId, userId, workspaceId)` — all opaque non-empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub tenant_id: String,
    pub user_id: String,
    pub workspace_id: String,
}

impl Scope {
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            workspace_id: workspace_id.into(),
        }
    }

    /// Parse the scope triple from a record object.
    ///
    /// All three fields are required non-empty strings.
    pub fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            tenant_id: parse::req_id(map, "tenantId")?,
            user_id: parse::req_id(map, "userId")?,
            workspace_id: parse::req_id(map, "workspaceId")?,
        })
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.tenant_id, self.user_id, self.workspace_id
        )
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
