// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live runtime view of a conversation's PTY session, plus the status
//! model and controller types shared across the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{ControllerId, SessionId};
use crate::parse;
use crate::scope::Scope;

/// Coarse runtime status of a conversation/session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeStatus {
    Running,
    NeedsInput,
    Completed,
    Exited,
}

impl RuntimeStatus {
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "running" => Some(RuntimeStatus::Running),
            "needs-input" => Some(RuntimeStatus::NeedsInput),
            "completed" => Some(RuntimeStatus::Completed),
            "exited" => Some(RuntimeStatus::Exited),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeStatus::Running => "running",
            RuntimeStatus::NeedsInput => "needs-input",
            RuntimeStatus::Completed => "completed",
            RuntimeStatus::Exited => "exited",
        }
    }
}

/// Fine-grained phase derived from heuristics over recent PTY output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Thinking,
    Working,
    NeedsInput,
    Exited,
}

impl Phase {
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "idle" => Some(Phase::Idle),
            "thinking" => Some(Phase::Thinking),
            "working" => Some(Phase::Working),
            "needs-input" => Some(Phase::NeedsInput),
            "exited" => Some(Phase::Exited),
            _ => None,
        }
    }
}

/// Status model published on every `session-status` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusModel {
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_reason: Option<String>,
}

impl StatusModel {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            activity_hint: None,
            attention_reason: None,
        }
    }

    pub fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            phase: Phase::parse(map.get("phase")?)?,
            activity_hint: parse::opt_str(map, "activityHint")?,
            attention_reason: parse::opt_str(map, "attentionReason")?,
        })
    }
}

/// The identity currently permitted to write into a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerType {
    Human,
    Agent,
    Automation,
}

impl ControllerType {
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "human" => Some(ControllerType::Human),
            "agent" => Some(ControllerType::Agent),
            "automation" => Some(ControllerType::Automation),
            _ => None,
        }
    }
}

/// Exclusive write claim on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controller {
    pub controller_id: ControllerId,
    pub controller_type: ControllerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_label: Option<String>,
    pub claimed_at: DateTime<Utc>,
}

impl Controller {
    pub fn parse(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            controller_id: ControllerId::new(parse::req_id(map, "controllerId")?),
            controller_type: ControllerType::parse(map.get("controllerType")?)?,
            controller_label: parse::opt_str(map, "controllerLabel")?,
            claimed_at: parse::req_ts(map, "claimedAt")?,
        })
    }
}

/// Exit outcome of a PTY child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
}

/// Live runtime view of a conversation.
///
/// A session may exist briefly without a conversation (pre-create race)
/// but is not exposed to clients until the conversation record is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_id: Option<String>,
    pub status: RuntimeStatus,
    pub status_model: StatusModel,
    pub latest_cursor: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    pub attached_clients: u32,
    pub event_subscribers: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_exit: Option<ExitStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
    pub live: bool,
    pub launch_command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<Controller>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Value>,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
