// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the gateway crate.

use std::path::PathBuf;
use std::time::Duration;

/// Workspace root: `HARNESS_INVOKE_CWD` override, else the process cwd.
pub fn invoke_cwd() -> PathBuf {
    if let Ok(dir) = std::env::var("HARNESS_INVOKE_CWD") {
        return PathBuf::from(dir);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Workspace-relative state directory holding the gateway record, log,
/// event log, and snapshot.
pub fn state_dir(workspace_root: &std::path::Path) -> PathBuf {
    workspace_root.join(".state")
}

/// Loopback bind port override.
pub fn control_plane_port() -> Option<u16> {
    std::env::var("HARNESS_CONTROL_PLANE_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
}

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Group-commit flush interval override.
pub fn flush_interval() -> Duration {
    parse_duration_ms("HARNESS_FLUSH_MS").unwrap_or(Duration::from_millis(10))
}

/// Checkpoint interval override.
pub fn checkpoint_interval() -> Duration {
    parse_duration_ms("HARNESS_CHECKPOINT_MS").unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
