// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status-model heuristics over recent PTY output.
//!
//! The engine keeps a small lossy-UTF-8 tail of the byte stream and
//! reclassifies the session phase on every output chunk. An idle timer in
//! the session pump downgrades `working`/`thinking` to `idle` after a
//! quiet period.

use harness_core::{Phase, StatusModel};

/// How many bytes of output tail to keep for classification.
const TAIL_CAPACITY: usize = 2048;

/// Activity hints are clipped to this many characters.
const HINT_MAX: usize = 80;

/// Spinner glyphs used by common CLI agents while reasoning.
const SPINNER_GLYPHS: &str = "⠁⠂⠄⡀⢀⠠⠐⠈⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏◐◓◑◒";

/// Prompt markers that mean the process is waiting on the user.
const PROMPT_SUFFIXES: &[(&str, &str)] = &[
    ("(y/n)", "yes/no prompt"),
    ("(y/N)", "yes/no prompt"),
    ("[y/n]", "yes/no prompt"),
    ("[Y/n]", "yes/no prompt"),
    ("? ", "question prompt"),
    ("?", "question prompt"),
    ("password:", "password prompt"),
    ("Password:", "password prompt"),
    ("press enter to continue", "continue prompt"),
    ("❯", "selection prompt"),
    ("> ", "input prompt"),
];

/// Stateful classifier fed with raw output chunks.
#[derive(Debug)]
pub struct StatusEngine {
    tail: String,
    model: StatusModel,
}

impl Default for StatusEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusEngine {
    pub fn new() -> Self {
        Self {
            tail: String::new(),
            model: StatusModel::idle(),
        }
    }

    /// Current status model.
    pub fn model(&self) -> &StatusModel {
        &self.model
    }

    /// Feed an output chunk and recompute the model.
    ///
    /// Returns the new model when it differs from the previous one.
    pub fn observe_output(&mut self, chunk: &[u8]) -> Option<StatusModel> {
        self.push_tail(chunk);

        let stripped = strip_ansi(&self.tail);
        let next = classify(&stripped);
        if next != self.model {
            self.model = next.clone();
            Some(next)
        } else {
            None
        }
    }

    /// Downgrade to idle after a quiet period. Returns the new model when
    /// the phase actually changed.
    pub fn observe_quiet(&mut self) -> Option<StatusModel> {
        match self.model.phase {
            Phase::Working | Phase::Thinking => {
                let next = StatusModel {
                    phase: Phase::Idle,
                    activity_hint: self.model.activity_hint.clone(),
                    attention_reason: None,
                };
                self.model = next.clone();
                Some(next)
            }
            _ => None,
        }
    }

    /// Terminal state: the child exited.
    pub fn observe_exit(&mut self) -> StatusModel {
        self.model = StatusModel {
            phase: Phase::Exited,
            activity_hint: None,
            attention_reason: None,
        };
        self.model.clone()
    }

    fn push_tail(&mut self, chunk: &[u8]) {
        self.tail.push_str(&String::from_utf8_lossy(chunk));
        if self.tail.len() > TAIL_CAPACITY {
            // Trim on a char boundary near the capacity limit
            let cut = self.tail.len() - TAIL_CAPACITY;
            let boundary = (cut..self.tail.len())
                .find(|&i| self.tail.is_char_boundary(i))
                .unwrap_or(0);
            self.tail = self.tail.split_off(boundary);
        }
    }
}

/// Classify the (ANSI-stripped) output tail into a status model.
fn classify(tail: &str) -> StatusModel {
    let trimmed_end = tail.trim_end_matches([' ', '\u{a0}']);
    let last_line = tail
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim();

    if let Some(reason) = prompt_reason(trimmed_end, last_line) {
        return StatusModel {
            phase: Phase::NeedsInput,
            activity_hint: hint_from(last_line),
            attention_reason: Some(reason.to_string()),
        };
    }

    if is_thinking(tail, last_line) {
        return StatusModel {
            phase: Phase::Thinking,
            activity_hint: hint_from(last_line),
            attention_reason: None,
        };
    }

    StatusModel {
        phase: Phase::Working,
        activity_hint: hint_from(last_line),
        attention_reason: None,
    }
}

fn prompt_reason(trimmed_end: &str, last_line: &str) -> Option<&'static str> {
    for (marker, reason) in PROMPT_SUFFIXES {
        if trimmed_end.ends_with(marker) {
            return Some(reason);
        }
    }
    let lowered = last_line.to_lowercase();
    if lowered.contains("press enter") || lowered.contains("waiting for input") {
        return Some("continue prompt");
    }
    None
}

fn is_thinking(tail: &str, last_line: &str) -> bool {
    if last_line.contains("esc to interrupt") || last_line.contains("Thinking") {
        return true;
    }
    tail.chars()
        .rev()
        .take(16)
        .any(|c| SPINNER_GLYPHS.contains(c))
}

fn hint_from(last_line: &str) -> Option<String> {
    if last_line.is_empty() {
        return None;
    }
    Some(last_line.chars().take(HINT_MAX).collect())
}

/// Remove CSI/OSC escape sequences so classification sees plain text.
fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            // CSI: ESC [ ... final byte in @..~
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        break;
                    }
                }
            }
            // OSC: ESC ] ... BEL or ESC \
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\u{7}' {
                        break;
                    }
                    if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            // Two-char escape
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }
    out
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
