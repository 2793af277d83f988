// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! harness: operator CLI for the harness gateway.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use harness::commands::{gateway, trace};
use harness::exit_error::ExitError;

#[derive(Parser)]
#[command(
    name = "harness",
    version = harness_gateway::PROTOCOL_VERSION,
    about = "Local-first development harness control plane",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the workspace gateway process
    Gateway {
        #[command(subcommand)]
        action: GatewayAction,
    },

    /// Toggle the observed-event render trace
    RenderTrace {
        #[command(subcommand)]
        action: ToggleAction,
    },

    /// Toggle the profiling flag polled by external profilers
    Profile {
        #[command(subcommand)]
        action: ToggleAction,
    },
}

#[derive(Subcommand)]
enum GatewayAction {
    /// Start the gateway (no-op success when already running)
    Start {
        /// Loopback port to bind (default: ephemeral)
        #[arg(long)]
        port: Option<u16>,
        /// Bearer token to use (default: generated)
        #[arg(long)]
        auth_token: Option<String>,
    },
    /// Stop the gateway
    Stop {
        /// Escalate to SIGTERM/SIGKILL if the graceful stop stalls
        #[arg(long)]
        force: bool,
    },
    /// Report gateway status
    Status {
        /// Also report one session's status
        #[arg(long)]
        session: Option<String>,
    },
}

#[derive(Subcommand)]
enum ToggleAction {
    Start,
    Stop,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let workspace_root = workspace_root();

    let result = match cli.command {
        Commands::Gateway { action } => match action {
            GatewayAction::Start { port, auth_token } => {
                gateway::start(&workspace_root, port, auth_token.as_deref()).await
            }
            GatewayAction::Stop { force } => gateway::stop(&workspace_root, force).await,
            GatewayAction::Status { session } => {
                gateway::status(&workspace_root, session.as_deref()).await
            }
        },
        Commands::RenderTrace { action } => {
            trace::render_trace(&workspace_root, matches!(action, ToggleAction::Start)).await
        }
        Commands::Profile { action } => {
            trace::profile(&workspace_root, matches!(action, ToggleAction::Start)).await
        }
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            report(&e);
            std::process::exit(e.code());
        }
    }
}

fn report(error: &ExitError) {
    match error {
        ExitError::Interrupted | ExitError::Terminated => {}
        other => eprintln!("error: {other}"),
    }
}

fn workspace_root() -> PathBuf {
    harness_gateway::env::invoke_cwd()
}
