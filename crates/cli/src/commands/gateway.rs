// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `harness gateway {start,stop,status}`.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use anyhow::{anyhow, Context};
use harness_gateway::protocol::Command;
use harness_gateway::record::{pid_alive, record_path};
use harness_gateway::GatewayRecord;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::client::{self, ClientError, GatewayClient};
use crate::exit_error::ExitError;

fn load_record(workspace_root: &Path) -> Option<GatewayRecord> {
    let state_dir = harness_gateway::env::state_dir(workspace_root);
    GatewayRecord::load(&record_path(&state_dir)).ok().flatten()
}

/// Start the gateway, or report the running one.
///
/// A live record means another start already won: report it and exit
/// successfully. A stale record (dead pid / refusing port) is taken
/// over by the fresh gateway process.
pub async fn start(
    workspace_root: &Path,
    port: Option<u16>,
    auth_token: Option<&str>,
) -> Result<(), ExitError> {
    if let Some(record) = load_record(workspace_root) {
        if record.is_alive() {
            println!(
                "gateway already running (pid {}, port {})",
                record.pid, record.port
            );
            return Ok(());
        }
    }

    let binary = gateway_binary()?;
    let mut command = tokio::process::Command::new(&binary);
    command
        .env("HARNESS_INVOKE_CWD", workspace_root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(port) = port {
        command.args(["--port", &port.to_string()]);
    }
    if let Some(token) = auth_token {
        command.args(["--auth-token", token]);
    }

    let child = command
        .spawn()
        .with_context(|| format!("failed to spawn {}", binary.display()))?;
    let child_pid = child.id();

    // Wait for the record to appear and answer
    let deadline = Instant::now() + client::timeout_connect();
    loop {
        if let Some(record) = load_record(workspace_root) {
            if record.is_alive() {
                println!("gateway started (pid {}, port {})", record.pid, record.port);
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            return Err(ExitError::Failure(anyhow!(
                "timed out waiting for gateway to start (spawned pid {:?}); see .state/gateway.log",
                child_pid,
            )));
        }
        tokio::select! {
            _ = tokio::time::sleep(client::poll_interval()) => {}
            _ = tokio::signal::ctrl_c() => return Err(ExitError::Interrupted),
        }
    }
}

/// Stop the gateway: graceful command first, then signals with
/// `--force`.
pub async fn stop(workspace_root: &Path, force: bool) -> Result<(), ExitError> {
    let Some(record) = load_record(workspace_root) else {
        eprintln!("gateway is not running");
        return Err(ExitError::Failure(anyhow!("no gateway record")));
    };

    match GatewayClient::connect(workspace_root).await {
        Ok(mut client) => {
            let _ = client.request(Command::GatewayStop { force }).await;
        }
        Err(ClientError::NotRunning) => {
            eprintln!("gateway is not running");
            return Err(ExitError::Failure(anyhow!("no live gateway")));
        }
        Err(e) => {
            // The record is live but the wire failed; fall back to signals
            eprintln!("warn: {e}; falling back to signals");
        }
    }

    // Wait for graceful shutdown up to a bound
    let deadline = Instant::now() + client::timeout_exit();
    while pid_alive(record.pid) && Instant::now() < deadline {
        tokio::time::sleep(client::poll_interval()).await;
    }

    if pid_alive(record.pid) {
        if !force {
            return Err(ExitError::Failure(anyhow!(
                "gateway (pid {}) did not stop; retry with --force",
                record.pid,
            )));
        }
        let pid = Pid::from_raw(record.pid as i32);
        let _ = kill(pid, Signal::SIGTERM);
        let deadline = Instant::now() + client::timeout_exit();
        while pid_alive(record.pid) && Instant::now() < deadline {
            tokio::time::sleep(client::poll_interval()).await;
        }
        if pid_alive(record.pid) {
            let _ = kill(pid, Signal::SIGKILL);
        }
    }

    println!("gateway stopped");
    Ok(())
}

/// Report gateway status; non-zero exit when not running.
pub async fn status(workspace_root: &Path, session: Option<&str>) -> Result<(), ExitError> {
    let Some(record) = load_record(workspace_root) else {
        println!("gateway: not running");
        return Err(ExitError::Failure(anyhow!("no gateway record")));
    };
    if !record.is_alive() {
        println!("gateway: not running (stale record, pid {})", record.pid);
        return Err(ExitError::Failure(anyhow!("stale gateway record")));
    }

    let mut client = GatewayClient::connect(workspace_root).await?;
    let result = client.request(Command::GatewayStatus).await?;
    println!(
        "gateway: running (pid {}, port {}, up {}s)",
        record.pid,
        record.port,
        result["uptimeSeconds"].as_i64().unwrap_or(0),
    );
    if let Some(version) = result["version"].as_str() {
        if version != harness_gateway::PROTOCOL_VERSION {
            println!(
                "  version: {version} (cli is {})",
                harness_gateway::PROTOCOL_VERSION
            );
        } else {
            println!("  version: {version}");
        }
    }

    if let Some(session_id) = session {
        let result = client
            .request(Command::SessionStatus {
                session_id: session_id.to_owned(),
            })
            .await?;
        let session = &result["session"];
        println!(
            "session {}: {} (cursor {}, {} attached)",
            session_id,
            session["status"].as_str().unwrap_or("unknown"),
            session["latestCursor"].as_u64().unwrap_or(0),
            session["attachedClients"].as_u64().unwrap_or(0),
        );
    }

    Ok(())
}

/// Locate the harnessd binary next to the CLI.
fn gateway_binary() -> Result<std::path::PathBuf, ExitError> {
    let current = std::env::current_exe().context("cannot locate current executable")?;
    let sibling = current.with_file_name("harnessd");
    if sibling.exists() {
        return Ok(sibling);
    }
    // Fall back to PATH
    Ok(std::path::PathBuf::from("harnessd"))
}
