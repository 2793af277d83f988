// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the black-box specs.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// A throwaway workspace with its own state directory.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp workspace"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn record_path(&self) -> PathBuf {
        self.root().join(".state/gateway.json")
    }

    /// `harness` invocation bound to this workspace.
    pub fn harness(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("harness").expect("harness binary");
        cmd.env("HARNESS_INVOKE_CWD", self.root());
        cmd.timeout(Duration::from_secs(30));
        cmd
    }

    /// Spawn a detached gateway bound to this workspace.
    pub fn spawn_gateway(&self) -> std::process::Child {
        let binary = assert_cmd::cargo::cargo_bin("harnessd");
        std::process::Command::new(binary)
            .env("HARNESS_INVOKE_CWD", self.root())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .expect("spawn harnessd")
    }

    /// Wait until the record file exists (gateway is up).
    pub fn wait_for_record(&self) -> serde_json::Value {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Ok(contents) = std::fs::read_to_string(self.record_path()) {
                if let Ok(record) = serde_json::from_str::<serde_json::Value>(&contents) {
                    return record;
                }
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for gateway record"
            );
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Wait until the record file is gone (gateway stopped).
    pub fn wait_for_record_gone(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.record_path().exists() {
            assert!(
                Instant::now() < deadline,
                "timed out waiting for gateway record removal"
            );
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Stop the gateway, ignoring failures (teardown path).
    pub fn stop_gateway(&self) {
        let _ = self
            .harness()
            .args(["gateway", "stop", "--force"])
            .ok();
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        // Kill whatever the record still points at so no gateway outlives
        // the test
        if let Ok(contents) = std::fs::read_to_string(self.record_path()) {
            if let Ok(record) = serde_json::from_str::<serde_json::Value>(&contents) {
                if let Some(pid) = record["pid"].as_u64() {
                    force_kill(pid as i32);
                }
            }
        }
    }
}

fn force_kill(pid: i32) {
    let _ = std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status();
}
