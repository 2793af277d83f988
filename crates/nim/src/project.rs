// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Projection of semantic runtime events onto the UI stream.
//!
//! Debug mode exposes tool activity and state transitions. Seamless mode
//! suppresses tool noise, emitting only assistant text and turn aborts.

use crate::event::{ProviderEvent, RuntimeEvent, ToolPhase, UiEvent, UiMode};

/// Project one semantic frame into zero or more UI frames.
pub fn project(mode: UiMode, event: &RuntimeEvent) -> Vec<UiEvent> {
    match event {
        RuntimeEvent::TurnStarted { .. } => Vec::new(),

        RuntimeEvent::StatusChanged { from, to } => match mode {
            UiMode::Debug => vec![UiEvent::StatusChanged {
                from: *from,
                to: *to,
            }],
            UiMode::Seamless => Vec::new(),
        },

        RuntimeEvent::TurnAborted { reason, .. } => vec![UiEvent::TurnAborted {
            reason: reason.clone(),
        }],

        RuntimeEvent::Provider { event, .. } => project_provider(mode, event),
    }
}

fn project_provider(mode: UiMode, event: &ProviderEvent) -> Vec<UiEvent> {
    match event {
        ProviderEvent::OutputDelta { text } => vec![UiEvent::AssistantTextDelta {
            text: text.clone(),
        }],
        ProviderEvent::OutputCompleted { text } => vec![UiEvent::AssistantTextMessage {
            text: text.clone(),
        }],

        ProviderEvent::ThinkingStarted | ProviderEvent::ThinkingCompleted => Vec::new(),
        ProviderEvent::TurnFinished { .. } => Vec::new(),

        ProviderEvent::ToolCallStarted { call_id, name } => tool_activity(
            mode,
            call_id,
            Some(name.clone()),
            ToolPhase::Started,
        ),
        ProviderEvent::ToolCallArgumentsDelta { call_id, .. } => {
            tool_activity(mode, call_id, None, ToolPhase::Arguments)
        }
        ProviderEvent::ToolCallCompleted { call_id } => {
            tool_activity(mode, call_id, None, ToolPhase::Completed)
        }
        ProviderEvent::ToolCallFailed { call_id, .. } => {
            tool_activity(mode, call_id, None, ToolPhase::Failed)
        }
        ProviderEvent::ToolResultEmitted { call_id, .. } => {
            tool_activity(mode, call_id, None, ToolPhase::Result)
        }
    }
}

fn tool_activity(
    mode: UiMode,
    call_id: &str,
    name: Option<String>,
    phase: ToolPhase,
) -> Vec<UiEvent> {
    match mode {
        UiMode::Debug => vec![UiEvent::ToolActivity {
            call_id: call_id.to_owned(),
            name,
            phase,
        }],
        UiMode::Seamless => Vec::new(),
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
