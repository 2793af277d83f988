// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `harness render-trace {start,stop}` and `harness profile {start,stop}`.

use std::path::Path;

use harness_gateway::protocol::Command;

use crate::client::GatewayClient;
use crate::exit_error::ExitError;

pub async fn render_trace(workspace_root: &Path, start: bool) -> Result<(), ExitError> {
    let mut client = GatewayClient::connect(workspace_root).await?;
    let command = if start {
        Command::RenderTraceStart
    } else {
        Command::RenderTraceStop
    };
    client.request(command).await?;
    println!(
        "render trace {}",
        if start { "started" } else { "stopped" }
    );
    Ok(())
}

pub async fn profile(workspace_root: &Path, start: bool) -> Result<(), ExitError> {
    let mut client = GatewayClient::connect(workspace_root).await?;
    let command = if start {
        Command::ProfileStart
    } else {
        Command::ProfileStop
    };
    client.request(command).await?;
    println!("profiling {}", if start { "started" } else { "stopped" });
    Ok(())
}
