// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the provider runtime.
//!
//! `ProviderEvent` is the low-level semantic stream produced by drivers.
//! `RuntimeEvent` wraps it with run bookkeeping for the semantic-fidelity
//! subscriber channel. `UiEvent` is the coarse projection consumed by
//! conversational UIs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Semantic events produced by a `ProviderDriver` during one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderEvent {
    #[serde(rename = "provider.thinking.started")]
    ThinkingStarted,

    #[serde(rename = "provider.thinking.completed")]
    ThinkingCompleted,

    #[serde(rename = "assistant.output.delta")]
    OutputDelta { text: String },

    #[serde(rename = "assistant.output.completed")]
    OutputCompleted { text: String },

    #[serde(rename = "tool.call.started")]
    ToolCallStarted { call_id: String, name: String },

    #[serde(rename = "tool.call.arguments.delta")]
    ToolCallArgumentsDelta { call_id: String, delta: String },

    #[serde(rename = "tool.call.completed")]
    ToolCallCompleted { call_id: String },

    #[serde(rename = "tool.call.failed")]
    ToolCallFailed { call_id: String, error: String },

    #[serde(rename = "tool.result.emitted")]
    ToolResultEmitted { call_id: String, result: Value },

    #[serde(rename = "provider.turn.finished")]
    TurnFinished { finish_reason: String },
}

/// Session status driven by the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Idle,
    Thinking,
    ToolCalling,
    Responding,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Thinking => "thinking",
            SessionStatus::ToolCalling => "tool-calling",
            SessionStatus::Responding => "responding",
        }
    }
}

/// UI projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Expose tool activity and state transitions.
    Debug,
    /// Suppress tool noise; text only.
    Seamless,
}

/// Semantic-fidelity stream frames published by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    TurnStarted {
        run_id: String,
    },
    Provider {
        run_id: String,
        event: ProviderEvent,
    },
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    TurnAborted {
        run_id: String,
        reason: String,
    },
}

/// Lifecycle phase for tool activity in the debug UI stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Started,
    Arguments,
    Completed,
    Failed,
    Result,
}

/// Coarse UI stream frames.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Debug mode only.
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// Debug mode only.
    ToolActivity {
        call_id: String,
        name: Option<String>,
        phase: ToolPhase,
    },
    AssistantTextDelta {
        text: String,
    },
    AssistantTextMessage {
        text: String,
    },
    TurnAborted {
        reason: String,
    },
    /// Output of local `/` commands.
    Notice {
        text: String,
    },
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
