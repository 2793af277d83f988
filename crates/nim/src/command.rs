// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local `/` commands intercepted before the provider sees them.

use crate::event::UiMode;

/// Commands handled inside the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    Help,
    State,
    Clear,
    Abort,
    Mode(UiMode),
}

/// Parse composer text into a local command.
///
/// Returns `None` for anything that should go to the provider, and
/// `Some(Err(message))` for a malformed local command.
pub fn parse_local_command(text: &str) -> Option<Result<LocalCommand, String>> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or("/");
    let arg = parts.next();

    let command = match head {
        "/help" => LocalCommand::Help,
        "/state" => LocalCommand::State,
        "/clear" => LocalCommand::Clear,
        "/abort" => LocalCommand::Abort,
        "/mode" => match arg {
            Some("debug") => LocalCommand::Mode(UiMode::Debug),
            Some("seamless") => LocalCommand::Mode(UiMode::Seamless),
            Some(other) => return Some(Err(format!("unknown mode: {other}"))),
            None => return Some(Err("usage: /mode {debug|seamless}".to_string())),
        },
        other => return Some(Err(format!("unknown command: {other}"))),
    };

    Some(Ok(command))
}

/// Help text for `/help`.
pub fn help_text() -> &'static str {
    "commands: /help /state /clear /abort /mode {debug|seamless}\n\
     keys: Tab queues the composer, Enter submits it"
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
