// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Render-trace and profile toggles.
//!
//! `render-trace.start` turns on a JSONL trace of every observed event
//! (cursor, kind, timestamp) under the state directory, for replaying
//! render pipelines against real event streams. `profile.{start,stop}`
//! flips a flag that external profilers poll; the gateway itself only
//! records the toggle.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use harness_core::ObservedEvent;
use serde::Serialize;

/// Runtime-toggled diagnostics state.
pub struct TraceState {
    trace_enabled: AtomicBool,
    profile_enabled: AtomicBool,
    path: PathBuf,
    entries: AtomicU64,
}

#[derive(Serialize)]
struct TraceEntry<'a> {
    cursor: u64,
    kind: &'a str,
    ts: String,
}

impl TraceState {
    pub fn new(path: PathBuf) -> Self {
        Self {
            trace_enabled: AtomicBool::new(false),
            profile_enabled: AtomicBool::new(false),
            path,
            entries: AtomicU64::new(0),
        }
    }

    pub fn start_trace(&self) -> bool {
        !self.trace_enabled.swap(true, Ordering::AcqRel)
    }

    pub fn stop_trace(&self) -> bool {
        self.trace_enabled.swap(false, Ordering::AcqRel)
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled.load(Ordering::Acquire)
    }

    pub fn start_profile(&self) -> bool {
        !self.profile_enabled.swap(true, Ordering::AcqRel)
    }

    pub fn stop_profile(&self) -> bool {
        self.profile_enabled.swap(false, Ordering::AcqRel)
    }

    pub fn profile_enabled(&self) -> bool {
        self.profile_enabled.load(Ordering::Acquire)
    }

    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    /// Append one trace line when tracing is on. Best-effort: trace I/O
    /// failures never affect command handling.
    pub fn record(&self, cursor: u64, event: &ObservedEvent) {
        if !self.trace_enabled() {
            return;
        }
        let entry = TraceEntry {
            cursor,
            kind: event.kind(),
            ts: event.ts().to_rfc3339(),
        };
        let Ok(mut line) = serde_json::to_string(&entry) else {
            return;
        };
        line.push('\n');
        let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        else {
            return;
        };
        if file.write_all(line.as_bytes()).is_ok() {
            self.entries.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
