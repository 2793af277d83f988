// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gateway record file — the single-writer election mechanism.
//!
//! `<workspace>/.state/gateway.json` holds `{port, authToken, pid,
//! startedAt}`. A starting gateway acquires the sibling lock file
//! exclusively, binds its port, then writes the record; every exit path
//! deletes it. A stale record (dead pid or refusing port) is simply
//! overwritten by the next holder of the lock.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from record-file operations.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contents of `gateway.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRecord {
    pub port: u16,
    pub auth_token: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl GatewayRecord {
    pub fn new(port: u16, auth_token: String) -> Self {
        Self {
            port,
            auth_token,
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }

    /// Load the record if the file exists and parses.
    ///
    /// A corrupt record reads as absent: the caller treats it as stale
    /// and overwrites it under the lock.
    pub fn load(path: &Path) -> Result<Option<Self>, RecordError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(_) => Ok(None),
        }
    }

    /// Write the record atomically (tmp + rename).
    pub fn write(&self, path: &Path) -> Result<(), RecordError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Remove the record file (best-effort).
    pub fn delete(path: &Path) {
        let _ = std::fs::remove_file(path);
    }

    /// Whether the recorded gateway still answers: pid alive and port
    /// accepting connections.
    pub fn is_alive(&self) -> bool {
        pid_alive(self.pid) && probe_port(self.port)
    }
}

/// Signal-0 liveness probe.
pub fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Try to connect to the loopback port.
pub fn probe_port(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(250)).is_ok()
}

/// Path of the record file inside a state directory.
pub fn record_path(state_dir: &Path) -> PathBuf {
    state_dir.join("gateway.json")
}

/// Path of the sibling lock file.
pub fn lock_path(state_dir: &Path) -> PathBuf {
    state_dir.join("gateway.lock")
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
