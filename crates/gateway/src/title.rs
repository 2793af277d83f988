// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asynchronous conversation title derivation.
//!
//! `conversation.title.refresh` schedules derivation and returns
//! immediately; the `conversation-updated` event is emitted separately
//! when the derived title differs.

use async_trait::async_trait;
use harness_core::Conversation;

/// Outcome reported by the refresh command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    /// Derivation was scheduled; an update event may follow.
    Updated,
    /// No derivable source; nothing will change.
    Unchanged,
    /// Existing non-empty title kept (no `force`).
    Skipped,
}

impl RefreshStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshStatus::Updated => "updated",
            RefreshStatus::Unchanged => "unchanged",
            RefreshStatus::Skipped => "skipped",
        }
    }
}

/// Title source seam; the default derives from adapter state.
#[async_trait]
pub trait TitleProvider: Send + Sync + 'static {
    /// Cheap check whether any derivable source exists, used to answer
    /// the refresh command without waiting for derivation.
    fn has_source(&self, conversation: &Conversation) -> bool;

    async fn derive(&self, conversation: &Conversation) -> Option<String>;
}

/// Derive a title from the adapter state's recorded prompts.
pub struct HeuristicTitleProvider;

const TITLE_MAX: usize = 48;

impl HeuristicTitleProvider {
    fn source(conversation: &Conversation) -> Option<&str> {
        let state = conversation.adapter_state.as_object()?;
        state
            .get("initialPrompt")
            .or_else(|| state.get("lastUserMessage"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[async_trait]
impl TitleProvider for HeuristicTitleProvider {
    fn has_source(&self, conversation: &Conversation) -> bool {
        Self::source(conversation).is_some()
    }

    async fn derive(&self, conversation: &Conversation) -> Option<String> {
        let source = Self::source(conversation)?;
        let line = source.lines().next()?.trim();
        if line.is_empty() {
            return None;
        }
        Some(clip_title(line))
    }
}

fn clip_title(line: &str) -> String {
    if line.chars().count() <= TITLE_MAX {
        return line.to_string();
    }
    let clipped: String = line.chars().take(TITLE_MAX - 1).collect();
    format!("{}…", clipped.trim_end())
}

#[cfg(test)]
#[path = "title_tests.rs"]
mod tests;
