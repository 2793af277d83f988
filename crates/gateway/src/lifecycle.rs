// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use fs2::FileExt;
use harness_core::{ObservedEvent, RuntimeStatus, Scope, SessionStatusPayload};
use harness_pty::SessionSupervisor;
use harness_storage::{load_snapshot, Checkpointer, EventLog, PersistedState};
use parking_lot::Mutex;
use rand::{distr::Alphanumeric, Rng};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::config::{ConfigLoader, HarnessConfig};
use crate::env;
use crate::hub::SubscriptionHub;
use crate::notify::{DesktopNotifier, Notifier};
use crate::record::{self, GatewayRecord};
use crate::server::ServerCtx;
use crate::title::HeuristicTitleProvider;
use crate::trace::TraceState;

/// Gateway file layout under the workspace state directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace state directory (e.g. `<workspace>/.state`)
    pub state_dir: PathBuf,
    /// Path to the gateway record file
    pub record_path: PathBuf,
    /// Path to the lock file guarding single-writer election
    pub lock_path: PathBuf,
    /// Path to the version file
    pub version_path: PathBuf,
    /// Path to the gateway log file
    pub log_path: PathBuf,
    /// Path to the append-only event log
    pub events_path: PathBuf,
    /// Path to the state snapshot
    pub snapshot_path: PathBuf,
    /// Path to the render-trace output
    pub trace_path: PathBuf,
    /// Path to the JSONC configuration file
    pub config_path: PathBuf,
}

impl Config {
    /// Load the layout for the invoking workspace.
    pub fn load() -> Self {
        Self::for_workspace(&env::invoke_cwd())
    }

    pub fn for_workspace(workspace_root: &std::path::Path) -> Self {
        let state_dir = env::state_dir(workspace_root);
        Self {
            record_path: record::record_path(&state_dir),
            lock_path: record::lock_path(&state_dir),
            version_path: state_dir.join("gateway.version"),
            log_path: state_dir.join("gateway.log"),
            events_path: state_dir.join("events.log"),
            snapshot_path: state_dir.join("snapshot.zst"),
            trace_path: state_dir.join("render-trace.jsonl"),
            config_path: state_dir.join("harness.jsonc"),
            state_dir,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire lock: gateway already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind loopback port {0}: {1}")]
    BindFailed(u16, std::io::Error),

    #[error("Event log error: {0}")]
    Log(#[from] harness_storage::LogError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] harness_storage::SnapshotError),

    #[error("Record error: {0}")]
    Record(#[from] crate::record::RecordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Gateway state during operation.
pub struct GatewayState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub ctx: Arc<ServerCtx>,
    pub record: GatewayRecord,
    pub harness_config: HarnessConfig,
}

/// Result of gateway startup.
pub struct StartupResult {
    pub gateway: GatewayState,
    /// The bound loopback listener to hand to the listener task.
    pub listener: TcpListener,
}

/// Optional overrides from the command line.
#[derive(Debug, Default, Clone)]
pub struct StartupOverrides {
    pub port: Option<u16>,
    pub auth_token: Option<String>,
}

/// Start the gateway.
pub async fn startup(
    config: &Config,
    overrides: StartupOverrides,
) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config, overrides).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock —
            // those files belong to the already-running gateway.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(
    config: &Config,
    overrides: StartupOverrides,
) -> Result<StartupResult, LifecycleError> {
    // 1. Create the state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire the lock file FIRST - prevents election races.
    // Open without truncating so a losing contender can't wipe the
    // winner's pid.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write our pid now that we hold the lock
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. A stale record from a dead gateway is ours to replace now
    if let Some(stale) = GatewayRecord::load(&config.record_path)? {
        if record::pid_alive(stale.pid) && stale.pid != std::process::id() {
            warn!(
                pid = stale.pid,
                "record holder still alive but lock was free; taking over",
            );
        }
        GatewayRecord::delete(&config.record_path);
    }

    // 4. Load configuration (last-known-good on parse errors)
    let mut loader = ConfigLoader::new(config.config_path.clone());
    let harness_config = loader.load().clone();

    // 5. Recover state: snapshot + event-log replay
    let (mut state, snapshot_cursor) = match load_snapshot(&config.snapshot_path)? {
        Some(snapshot) => {
            info!(
                cursor = snapshot.cursor,
                directories = snapshot.state.directories.len(),
                conversations = snapshot.state.conversations.len(),
                tasks = snapshot.state.tasks.len(),
                "loaded snapshot",
            );
            (snapshot.state, snapshot.cursor)
        }
        None => {
            info!("no snapshot found, starting with empty state");
            (PersistedState::default(), 0)
        }
    };

    let mut event_log = EventLog::open(&config.events_path)?;
    // The snapshot's cursor is the floor even when the log was truncated
    event_log.ensure_cursor(snapshot_cursor);
    let replayed = event_log.entries_after(snapshot_cursor)?;
    let replay_count = replayed.len();
    for entry in replayed {
        state.apply_event(&entry.event);
    }
    if replay_count > 0 {
        info!(replay_count, after = snapshot_cursor, "replayed event log");
    }

    // 6. Reconcile: native PTY children do not survive the process, so
    // conversations still marked live get a terminal status event
    reconcile_stale_sessions(&mut state, &mut event_log);

    // 7. Bind the loopback port (override > env > config > ephemeral)
    let port = overrides
        .port
        .or_else(env::control_plane_port)
        .or(harness_config.port)
        .unwrap_or(0);
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .await
        .map_err(|e| LifecycleError::BindFailed(port, e))?;
    let bound_port = listener
        .local_addr()
        .map_err(LifecycleError::Io)?
        .port();

    // 8. Auth token and record (written only after the bind succeeds)
    let auth_token = overrides.auth_token.unwrap_or_else(generate_token);
    let record = GatewayRecord::new(bound_port, auth_token.clone());
    record.write(&config.record_path)?;

    std::fs::write(&config.version_path, crate::protocol_wire::PROTOCOL_VERSION)?;

    // 9. Assemble the server context
    let supervisor = Arc::new(SessionSupervisor::new(harness_config.pty_config()));
    let notifier: Arc<dyn Notifier> = Arc::new(DesktopNotifier);
    let ctx = Arc::new(ServerCtx {
        state: Arc::new(Mutex::new(state)),
        log: Arc::new(Mutex::new(event_log)),
        supervisor,
        hub: Arc::new(SubscriptionHub::new()),
        notifier,
        titles: Arc::new(HeuristicTitleProvider),
        trace: Arc::new(TraceState::new(config.trace_path.clone())),
        auth_token,
        started_at: Utc::now(),
        shutdown: Arc::new(Notify::new()),
        notifications_enabled: AtomicBool::new(harness_config.notifications.enabled),
        write_lock: tokio::sync::Mutex::new(()),
    });

    info!(port = bound_port, "gateway started");

    Ok(StartupResult {
        gateway: GatewayState {
            config: config.clone(),
            lock_file,
            ctx,
            record,
            harness_config,
        },
        listener,
    })
}

/// Mark conversations that claim a live session as exited. Runs before
/// the listener starts, so nothing is fanned out — clients re-subscribe
/// and list current state.
fn reconcile_stale_sessions(state: &mut PersistedState, log: &mut EventLog) {
    let stale: Vec<(String, Scope)> = state
        .conversations
        .values()
        .filter(|c| c.runtime_live)
        .map(|c| (c.conversation_id.as_str().to_owned(), c.scope.clone()))
        .collect();

    for (conversation_id, scope) in stale {
        warn!(conversation_id, "marking stale live session as exited");
        let payload = SessionStatusPayload {
            runtime_status: RuntimeStatus::Exited,
            status_model: None,
            live: false,
            controller: None,
        };
        let Ok(status) = serde_json::to_value(&payload) else {
            continue;
        };
        let event = ObservedEvent::SessionStatus {
            ts: Utc::now(),
            conversation_id,
            status,
        };
        if let Err(e) = log.append(&scope, &event) {
            warn!(error = %e, "failed to persist reconcile event");
            continue;
        }
        state.apply_event(&event);
    }
    if let Err(e) = log.flush() {
        warn!(error = %e, "failed to flush reconcile events");
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

impl GatewayState {
    /// Shutdown the gateway gracefully.
    pub fn shutdown(&mut self) {
        info!("shutting down gateway...");

        // 0. Stop every supervised session (PTY children die with us)
        self.ctx.supervisor.shutdown();

        // 1. Flush buffered events
        if let Err(e) = self.ctx.log.lock().flush() {
            warn!("failed to flush event log on shutdown: {e}");
        }

        // 2. Final snapshot so the next startup skips replay
        let cursor = self.ctx.log.lock().write_cursor();
        if cursor > 0 {
            let state_clone = self.ctx.state.lock().clone();
            let checkpointer = Checkpointer::new(self.config.snapshot_path.clone());
            match checkpointer.checkpoint_sync(cursor, &state_clone) {
                Ok(result) => info!(
                    cursor = result.cursor,
                    size_bytes = result.size_bytes,
                    "saved final shutdown snapshot",
                ),
                Err(e) => warn!("failed to save shutdown snapshot: {e}"),
            }
        }

        // 3. Remove the record and version files
        GatewayRecord::delete(&self.config.record_path);
        if self.config.version_path.exists() {
            let _ = std::fs::remove_file(&self.config.version_path);
        }

        // 4. Lock file is released when self.lock_file drops

        info!("gateway shutdown complete");
    }
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    GatewayRecord::delete(&config.record_path);
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
