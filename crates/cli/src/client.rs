// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway client for CLI commands.
//!
//! Locates the gateway through the record file, authenticates with its
//! bearer token, and speaks the length-prefixed command wire.

use std::path::{Path, PathBuf};
use std::time::Duration;

use harness_gateway::protocol::{Command, CommandFrame, Reply, ServerFrame};
use harness_gateway::record::record_path;
use harness_gateway::{protocol_wire, GatewayRecord};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for one request/reply round trip.
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("HARNESS_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for the gateway to start.
pub fn timeout_connect() -> Duration {
    parse_duration_ms("HARNESS_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for the gateway process to exit.
pub fn timeout_exit() -> Duration {
    parse_duration_ms("HARNESS_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(5))
}

/// Polling interval for startup/exit waits.
pub fn poll_interval() -> Duration {
    parse_duration_ms("HARNESS_CONNECT_POLL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Gateway not running")]
    NotRunning,

    #[error("Failed to start gateway: {0}")]
    StartFailed(String),

    #[error("Timed out waiting for gateway to start")]
    StartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol_wire::ProtocolError),

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Command failed: {0}")]
    Command(harness_core::CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connected, authenticated gateway client.
pub struct GatewayClient {
    stream: TcpStream,
    record: GatewayRecord,
    next_request: u64,
}

impl GatewayClient {
    /// Connect to the workspace's gateway and authenticate.
    pub async fn connect(workspace_root: &Path) -> Result<Self, ClientError> {
        let state_dir = harness_gateway::env::state_dir(workspace_root);
        let record = GatewayRecord::load(&record_path(&state_dir))
            .map_err(|e| ClientError::StartFailed(e.to_string()))?
            .ok_or(ClientError::NotRunning)?;
        if !record.is_alive() {
            return Err(ClientError::NotRunning);
        }

        let stream = TcpStream::connect(("127.0.0.1", record.port)).await?;
        let mut client = Self {
            stream,
            record,
            next_request: 0,
        };

        let scope = default_scope(workspace_root);
        let auth_token = client.record.auth_token.clone();
        let reply = client
            .request(Command::Hello {
                auth_token,
                tenant_id: scope.0,
                user_id: scope.1,
                workspace_id: scope.2,
            })
            .await;
        match reply {
            Ok(_) => Ok(client),
            Err(ClientError::Command(e))
                if e.kind == harness_core::ErrorKind::AuthFailed =>
            {
                Err(ClientError::AuthFailed)
            }
            Err(e) => Err(e),
        }
    }

    pub fn record(&self) -> &GatewayRecord {
        &self.record
    }

    /// Send one command and wait for its reply, skipping any pushed
    /// event frames that arrive in between.
    pub async fn request(&mut self, command: Command) -> Result<Value, ClientError> {
        self.next_request += 1;
        let request_id = self.next_request;
        let frame = CommandFrame {
            request_id,
            command,
        };

        let data = protocol_wire::encode(&frame)?;
        protocol_wire::write_frame(&mut self.stream, &data).await?;

        let deadline = tokio::time::Instant::now() + timeout_ipc();
        loop {
            let bytes = tokio::time::timeout_at(
                deadline,
                protocol_wire::read_frame(&mut self.stream),
            )
            .await
            .map_err(|_| protocol_wire::ProtocolError::Timeout)??;

            match protocol_wire::decode::<ServerFrame>(&bytes)? {
                ServerFrame::Reply(Reply {
                    request_id: id,
                    ok,
                    result,
                    error,
                }) if id == request_id => {
                    return if ok {
                        Ok(result.unwrap_or(Value::Null))
                    } else {
                        Err(ClientError::Command(error.unwrap_or_else(|| {
                            harness_core::CommandError::internal("reply carried no error")
                        })))
                    };
                }
                // Replies to other requests or pushed events: keep reading
                _ => continue,
            }
        }
    }
}

/// Scope triple for a single-operator workstation.
fn default_scope(workspace_root: &Path) -> (String, String, String) {
    let user = std::env::var("USER").unwrap_or_else(|_| "operator".to_string());
    let workspace = workspace_root
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(workspace_root))
        .display()
        .to_string();
    ("local".to_string(), user, workspace)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
