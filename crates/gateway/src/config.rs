// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONC configuration with last-known-good fallback.
//!
//! `harness.jsonc` lives in the workspace state directory. A parse error
//! never takes the gateway down: the previous good configuration (or the
//! defaults) stays active and the error is logged. The loader hashes the
//! raw source so unchanged files skip reparsing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use harness_pty::PtyConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// `pty` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PtySection {
    /// Bounded byte capacity of each session's output ring.
    pub ring_capacity: usize,
    /// Queued-stdin byte threshold for `session.respond` backpressure.
    pub respond_high_water: u64,
}

impl Default for PtySection {
    fn default() -> Self {
        Self {
            ring_capacity: 256 * 1024,
            respond_high_water: 64 * 1024,
        }
    }
}

/// `notifications` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationsSection {
    /// Desktop notification when a session needs input.
    pub enabled: bool,
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HarnessConfig {
    /// Loopback bind port; 0 or absent picks an ephemeral port.
    pub port: Option<u16>,
    pub pty: PtySection,
    pub notifications: NotificationsSection,
}

impl HarnessConfig {
    pub fn pty_config(&self) -> PtyConfig {
        PtyConfig {
            ring_capacity: self.pty.ring_capacity,
            respond_high_water: self.pty.respond_high_water,
            idle_after: Duration::from_secs(2),
            close_grace: Duration::from_secs(2),
        }
    }
}

/// Loader holding the last-known-good configuration.
#[derive(Debug)]
pub struct ConfigLoader {
    path: PathBuf,
    last_hash: Option<[u8; 32]>,
    current: HarnessConfig,
}

impl ConfigLoader {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_hash: None,
            current: HarnessConfig::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> &HarnessConfig {
        &self.current
    }

    /// (Re)load the file. Returns the active configuration; on parse
    /// error the last-known-good stays active.
    pub fn load(&mut self) -> &HarnessConfig {
        let source = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(_) => {
                // No file is not an error: defaults apply
                return &self.current;
            }
        };

        let hash: [u8; 32] = Sha256::digest(source.as_bytes()).into();
        if self.last_hash == Some(hash) {
            return &self.current;
        }

        match parse_jsonc(&source) {
            Ok(config) => {
                info!(path = %self.path.display(), "configuration loaded");
                self.last_hash = Some(hash);
                self.current = config;
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "config parse failed, keeping last known good",
                );
            }
        }
        &self.current
    }
}

/// Parse JSONC: strip `//` and `/* */` comments (string-aware), then
/// parse as JSON.
pub fn parse_jsonc(source: &str) -> Result<HarnessConfig, serde_json::Error> {
    serde_json::from_str(&strip_comments(source))
}

fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            out.push(c);
            if c == b'\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if c == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            b'"' => {
                in_string = true;
                out.push(b'"');
                i += 1;
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
