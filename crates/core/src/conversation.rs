// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{ConversationId, DirectoryId};
use crate::parse;
use crate::scope::Scope;
use crate::session::{RuntimeStatus, StatusModel};

/// A conversation inside a project directory.
///
/// One conversation corresponds to at most one live PTY session with the
/// same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: ConversationId,
    pub directory_id: DirectoryId,
    #[serde(flatten)]
    pub scope: Scope,
    pub title: String,
    pub agent_type: String,
    /// Adapter-specific opaque state (resume tokens, provider config, …).
    #[serde(default)]
    pub adapter_state: Value,
    pub runtime_status: RuntimeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_status_model: Option<StatusModel>,
    pub runtime_live: bool,
}

impl Conversation {
    /// Total parser for wire payloads. Returns `None` on any shape error.
    pub fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let adapter_state = match map.get("adapterState") {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(v @ Value::Object(_)) => v.clone(),
            Some(_) => return None,
        };
        let runtime_status_model = match map.get("runtimeStatusModel") {
            None | Some(Value::Null) => None,
            Some(v) => Some(StatusModel::parse(v)?),
        };
        Some(Self {
            conversation_id: ConversationId::new(parse::req_id(map, "conversationId")?),
            directory_id: DirectoryId::new(parse::req_id(map, "directoryId")?),
            scope: Scope::parse(value)?,
            title: parse::req_str(map, "title")?,
            agent_type: parse::req_str(map, "agentType")?,
            adapter_state,
            runtime_status: RuntimeStatus::parse(map.get("runtimeStatus")?)?,
            runtime_status_model,
            runtime_live: parse::req_bool(map, "runtimeLive")?,
        })
    }
}

#[cfg(test)]
#[path = "conversation_tests.rs"]
mod tests;
