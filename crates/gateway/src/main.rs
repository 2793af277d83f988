// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness gateway (harnessd)
//!
//! The control-plane process that owns session state and serves the
//! command/event wire.
//!
//! Architecture:
//! - Listener task: accepts loopback connections, one task per client
//! - Per-session pumps: move PTY output and status into the event fabric
//! - Background tasks: event-log group commit, periodic checkpoints,
//!   config hot-reload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;

use harness_gateway::config::ConfigLoader;
use harness_gateway::lifecycle::{self, Config, LifecycleError, StartupOverrides, StartupResult};
use harness_gateway::server::ServerCtx;
use harness_gateway::{listener, PROTOCOL_VERSION};
use harness_storage::Checkpointer;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    let mut overrides = StartupOverrides::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("harnessd {PROTOCOL_VERSION}");
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            "--port" => {
                overrides.port = args.next().and_then(|p| p.parse().ok());
            }
            "--auth-token" => {
                overrides.auth_token = args.next();
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: harnessd [--port N] [--auth-token TOKEN]");
                std::process::exit(2);
            }
        }
    }

    let config = Config::load();

    // Rotate the log file if it has grown too large
    rotate_log_if_needed(&config.log_path);

    // Write startup marker to the log (before tracing setup, so the CLI
    // can find it)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("starting gateway");

    let StartupResult {
        mut gateway,
        listener: tcp_listener,
    } = match lifecycle::startup(&config, overrides).await {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(_)) => {
            // Another gateway holds the lock — report its record
            let detail = harness_gateway::GatewayRecord::load(&config.record_path)
                .ok()
                .flatten()
                .map(|r| format!("  pid: {}\n  port: {}", r.pid, r.port))
                .unwrap_or_default();
            eprintln!("harnessd is already running");
            if !detail.is_empty() {
                eprintln!("{detail}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            // Write the error synchronously (tracing is non-blocking and
            // may not flush before exit)
            write_startup_error(&config, &e);
            error!("failed to start gateway: {e}");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let ctx = Arc::clone(&gateway.ctx);

    // Spawn the listener task
    tokio::spawn(listener::run(tcp_listener, Arc::clone(&ctx)));

    // Spawn group-commit flush task
    spawn_flush_task(Arc::clone(&ctx));

    // Spawn checkpoint task for periodic snapshots
    spawn_checkpoint(Arc::clone(&ctx), config.snapshot_path.clone());

    // Watch the config file for hot reload
    let _watcher = spawn_config_watcher(Arc::clone(&ctx), config.config_path.clone());

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(port = gateway.record.port, "gateway ready");

    // Signal ready for the parent process (CLI waiting for startup)
    println!("READY");

    tokio::select! {
        _ = ctx.shutdown.notified() => {
            info!("shutdown requested via command");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down...");
        }
    }

    gateway.shutdown();
    info!("gateway stopped");
    Ok(())
}

fn print_help() {
    println!("harnessd {PROTOCOL_VERSION}");
    println!("Harness gateway - control-plane process for harness sessions");
    println!();
    println!("USAGE:");
    println!("    harnessd [--port N] [--auth-token TOKEN]");
    println!();
    println!("The gateway is typically started by the `harness` CLI and should");
    println!("not be invoked directly. It listens on a loopback TCP port for");
    println!("commands and records itself in <workspace>/.state/gateway.json.");
    println!();
    println!("OPTIONS:");
    println!("    --port N             Bind this loopback port (default: ephemeral)");
    println!("    --auth-token TOKEN   Use this bearer token (default: generated)");
    println!("    -h, --help           Print help information");
    println!("    -v, --version        Print version information");
}

/// Spawn a task that periodically flushes the event log (group commit).
fn spawn_flush_task(ctx: Arc<ServerCtx>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(harness_gateway::env::flush_interval());

        loop {
            interval.tick().await;

            let needs_flush = ctx.log.lock().needs_flush();
            if needs_flush {
                if let Err(e) = ctx.log.lock().flush() {
                    tracing::error!("failed to flush event log: {e}");
                }
            }
        }
    });
}

/// Spawn a task that periodically snapshots state and truncates the log.
///
/// Truncation only happens after the snapshot is fully durable (tmp
/// write, fsync, rename, directory fsync) so a crash between the two
/// loses nothing.
fn spawn_checkpoint(ctx: Arc<ServerCtx>, snapshot_path: PathBuf) {
    let checkpointer = Checkpointer::new(snapshot_path);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(harness_gateway::env::checkpoint_interval());

        loop {
            interval.tick().await;

            let (state_clone, cursor) = {
                let state = ctx.state.lock();
                let log = ctx.log.lock();
                (state.clone(), log.write_cursor())
            };

            if cursor == 0 {
                continue;
            }

            let handle = checkpointer.start(cursor, &state_clone);
            let result = tokio::task::spawn_blocking(move || handle.wait()).await;

            match result {
                Ok(Ok(checkpoint)) => {
                    tracing::debug!(
                        cursor = checkpoint.cursor,
                        size_bytes = checkpoint.size_bytes,
                        "checkpoint complete",
                    );

                    // Safe to truncate now that the snapshot is durable
                    let mut log = ctx.log.lock();
                    if let Err(e) = log.truncate_through(cursor) {
                        tracing::warn!(error = %e, "failed to truncate event log after checkpoint");
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "checkpoint failed, log not truncated");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "checkpoint task panicked");
                }
            }
        }
    });
}

/// Watch `harness.jsonc` and hot-reload on change, keeping the last
/// known good configuration on parse errors.
fn spawn_config_watcher(
    ctx: Arc<ServerCtx>,
    config_path: PathBuf,
) -> Option<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let watch_dir = config_path.parent()?.to_path_buf();
    let (tx, rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();

    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "config watcher unavailable");
            return None;
        }
    };
    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        warn!(error = %e, "failed to watch config directory");
        return None;
    }

    let mut loader = ConfigLoader::new(config_path.clone());
    loader.load();
    tokio::task::spawn_blocking(move || {
        while let Ok(event) = rx.recv() {
            let Ok(event) = event else { continue };
            if !event.paths.iter().any(|p| p == &config_path) {
                continue;
            }
            let config = loader.load().clone();
            ctx.set_notifications_enabled(config.notifications.enabled);
            info!("configuration reloaded");
        }
    });

    Some(watcher)
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (gateway.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the gateway log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `gateway.log` → `gateway.log.1` → `gateway.log.2` →
/// `gateway.log.3`, deleting the oldest. Best-effort: rotation failures
/// are silently ignored so the gateway still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    // Shift older rotations: .3 is deleted, .2→.3, .1→.2
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Rotate current log → .1
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to the log before anything else.
/// The CLI uses this to find where the current startup attempt begins.
/// Full format: "--- harnessd: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- harnessd: starting (pid: ";

/// Write the startup marker to the log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(
        file,
        "{}{}) ---\n",
        STARTUP_MARKER_PREFIX,
        std::process::id()
    )?;

    Ok(())
}

/// Write a startup error synchronously to the log file.
/// This ensures the error is visible to the CLI even if the process
/// exits quickly.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start gateway: {error}");
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // File appender (rotation happens at startup via rotate_log_if_needed)
    let parent = config
        .log_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = config
        .log_path
        .file_name()
        .map(std::ffi::OsStr::to_owned)
        .unwrap_or_else(|| "gateway.log".into());
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
