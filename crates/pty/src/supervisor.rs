// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session supervisor: owns every live PTY session for the gateway.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use harness_core::{
    Controller, ExitStatus, RuntimeStatus, Scope, Session as SessionView, SessionId, StatusModel,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::{Backend, Boxed};
use crate::ring::RingBuffer;
use crate::session::{run_pump, PtySession, SessionShared};
use crate::spawn::{NativePty, SpawnCommand};
use crate::PtyError;

/// Tunables for the supervisor, loaded from configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Bounded byte capacity of each session's output ring.
    pub ring_capacity: usize,
    /// Queued-stdin byte threshold past which `respond` reports
    /// `responded = false`.
    pub respond_high_water: u64,
    /// Quiet period after which working/thinking downgrade to idle.
    pub idle_after: Duration,
    /// Grace period between SIGTERM and SIGKILL on close.
    pub close_grace: Duration,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 256 * 1024,
            respond_high_water: 64 * 1024,
            idle_after: Duration::from_secs(2),
            close_grace: Duration::from_secs(2),
        }
    }
}

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct StartSpec {
    pub session_id: SessionId,
    pub scope: Scope,
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
    pub worktree_id: Option<String>,
    /// Terminal foreground color hint passed to the child environment.
    pub fg: Option<String>,
    /// Terminal background color hint passed to the child environment.
    pub bg: Option<String>,
}

/// Supervisor over all live PTY sessions.
pub struct SessionSupervisor {
    sessions: Mutex<HashMap<String, PtySession>>,
    config: PtyConfig,
}

impl SessionSupervisor {
    pub fn new(config: PtyConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &PtyConfig {
        &self.config
    }

    /// Spawn a child under a new PTY and supervise it.
    ///
    /// Fails with `Conflict` when the session id is already live and with
    /// `StartFailed` when the exec fails; the latter must not create a
    /// conversation upstream.
    pub fn start(&self, spec: StartSpec) -> Result<PtySession, PtyError> {
        let mut env = spec.env.clone();
        if let Some(fg) = &spec.fg {
            env.push(("HARNESS_FG".to_string(), fg.clone()));
        }
        if let Some(bg) = &spec.bg {
            env.push(("HARNESS_BG".to_string(), bg.clone()));
        }

        let command = SpawnCommand {
            argv: spec.argv.clone(),
            env,
            cwd: spec.cwd.clone(),
            cols: spec.cols,
            rows: spec.rows,
        };

        // Check the conflict before paying for the spawn
        if self.is_live(spec.session_id.as_str()) {
            return Err(PtyError::Conflict(spec.session_id.as_str().to_owned()));
        }

        let backend = NativePty::spawn(&command).map_err(PtyError::StartFailed)?;
        self.start_with_backend(spec, backend)
    }

    /// Supervise a pre-built backend (fake backends in tests).
    pub fn start_with_backend(
        &self,
        spec: StartSpec,
        backend: impl Boxed,
    ) -> Result<PtySession, PtyError> {
        let backend: Box<dyn Backend> = backend.boxed();
        let id_str = spec.session_id.as_str().to_owned();

        let (events_tx, _) = broadcast::channel(256);
        let (write_tx, write_rx) = mpsc::channel(64);
        let (resize_tx, resize_rx) = mpsc::channel(8);
        let (exited_tx, exited_rx) = watch::channel(false);

        let shared = Arc::new(SessionShared {
            id: spec.session_id.clone(),
            scope: spec.scope.clone(),
            worktree_id: spec.worktree_id.clone(),
            launch_command: spec.argv.clone(),
            process_id: backend.child_pid(),
            started_at: Utc::now(),
            ring: RwLock::new(RingBuffer::new(self.config.ring_capacity)),
            events_tx,
            write_tx,
            resize_tx,
            signaller: backend.signaller(),
            controller: Mutex::new(None),
            status: Mutex::new(RuntimeStatus::Running),
            status_model: Mutex::new(StatusModel::idle()),
            queued_write_bytes: AtomicU64::new(0),
            respond_high_water: self.config.respond_high_water,
            attached_clients: AtomicU32::new(0),
            event_subscribers: AtomicU32::new(0),
            last_event_at: Mutex::new(None),
            last_exit: Mutex::new(None),
            exited_at: Mutex::new(None),
            live: AtomicBool::new(true),
            exited_rx,
            cancel: CancellationToken::new(),
        });
        let session = PtySession { shared };

        {
            let mut sessions = self.sessions.lock();
            match sessions.get(&id_str) {
                Some(existing) if existing.is_live() => {
                    // Lost the race; kill the fresh child
                    session.shared.cancel.cancel();
                    return Err(PtyError::Conflict(id_str));
                }
                _ => {
                    sessions.insert(id_str.clone(), session.clone());
                }
            }
        }

        info!(session_id = %id_str, "session started");
        tokio::spawn(run_pump(
            session.clone(),
            backend,
            write_rx,
            resize_rx,
            self.config.idle_after,
            exited_tx,
        ));

        Ok(session)
    }

    /// Look up a session by id.
    pub fn get(&self, session_id: &str) -> Result<PtySession, PtyError> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PtyError::NotFound(session_id.to_owned()))
    }

    fn is_live(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .get(session_id)
            .is_some_and(|s| s.is_live())
    }

    /// Gracefully close a session.
    pub async fn close(&self, session_id: &str) -> Result<ExitStatus, PtyError> {
        let session = self.get(session_id)?;
        session.close(self.config.close_grace).await
    }

    /// Claim the controller slot of a session.
    pub fn claim(
        &self,
        session_id: &str,
        controller: Controller,
        takeover: bool,
    ) -> Result<(), PtyError> {
        self.get(session_id)?.claim(controller, takeover)
    }

    /// Remove a session, closing it first when still live.
    pub async fn remove(&self, session_id: &str) -> Result<(), PtyError> {
        let session = self.get(session_id)?;
        if session.is_live() {
            session.close(self.config.close_grace).await?;
        }
        self.sessions.lock().remove(session_id);
        info!(session_id, "session removed");
        Ok(())
    }

    /// Session views in a scope, sorted by id.
    pub fn list(&self, scope: &Scope) -> Vec<SessionView> {
        let mut views: Vec<SessionView> = self
            .sessions
            .lock()
            .values()
            .filter(|s| s.scope() == scope)
            .map(|s| s.view())
            .collect();
        views.sort_by(|a, b| a.session_id.as_str().cmp(b.session_id.as_str()));
        views
    }

    /// Release every controller slot held by `controller_id` (client
    /// disconnect path). Returns the ids of sessions that were released.
    pub fn release_all(&self, controller_id: &harness_core::ControllerId) -> Vec<SessionId> {
        let sessions: Vec<PtySession> = self.sessions.lock().values().cloned().collect();
        let mut released = Vec::new();
        for session in sessions {
            if session.release(controller_id) {
                released.push(session.id().clone());
            }
        }
        released
    }

    /// Cancel every session (shutdown path).
    pub fn shutdown(&self) {
        for session in self.sessions.lock().values() {
            session.shared.cancel.cancel();
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
