// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single supervised PTY session.
//!
//! The session owns the ring buffer, the controller slot, and the channel
//! ends used to talk to the backend. One pump task per session moves
//! output from the backend into the ring and publishes events in
//! generation order.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use harness_core::{
    Controller, ControllerId, ExitStatus, Phase, RuntimeStatus, Scope, Session as SessionView,
    SessionId, StatusModel,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{Backend, BackendInput, Signaller};
use crate::ring::{Replay, RingBuffer};
use crate::status::StatusEngine;
use crate::PtyError;

/// Events published by a session to its subscribers.
#[derive(Debug, Clone)]
pub enum PtyEvent {
    /// Raw output chunk; `cursor` is the ring cursor after the chunk.
    Output {
        session_id: SessionId,
        cursor: u64,
        bytes: Bytes,
    },
    /// Status model or controller change.
    Status {
        session_id: SessionId,
        status: RuntimeStatus,
        status_model: StatusModel,
        live: bool,
        controller: Option<Controller>,
    },
    /// Child exit.
    Exit {
        session_id: SessionId,
        exit: ExitStatus,
    },
}

/// Result of a `session.respond` write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Responded {
    pub responded: bool,
    pub sent_bytes: u64,
}

pub(crate) struct SessionShared {
    pub id: SessionId,
    pub scope: Scope,
    pub worktree_id: Option<String>,
    pub launch_command: Vec<String>,
    pub process_id: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub ring: RwLock<RingBuffer>,
    pub events_tx: broadcast::Sender<PtyEvent>,
    pub write_tx: mpsc::Sender<BackendInput>,
    pub resize_tx: mpsc::Sender<(u16, u16)>,
    pub signaller: Arc<dyn Signaller>,
    pub controller: Mutex<Option<Controller>>,
    pub status: Mutex<RuntimeStatus>,
    pub status_model: Mutex<StatusModel>,
    pub queued_write_bytes: AtomicU64,
    pub respond_high_water: u64,
    pub attached_clients: AtomicU32,
    pub event_subscribers: AtomicU32,
    pub last_event_at: Mutex<Option<DateTime<Utc>>>,
    pub last_exit: Mutex<Option<ExitStatus>>,
    pub exited_at: Mutex<Option<DateTime<Utc>>>,
    pub live: AtomicBool,
    pub exited_rx: watch::Receiver<bool>,
    pub cancel: CancellationToken,
}

/// Handle to one supervised session.
#[derive(Clone)]
pub struct PtySession {
    pub(crate) shared: Arc<SessionShared>,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("id", &self.shared.id)
            .finish()
    }
}

impl PtySession {
    pub fn id(&self) -> &SessionId {
        &self.shared.id
    }

    pub fn scope(&self) -> &Scope {
        &self.shared.scope
    }

    pub fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Replay buffered output above `since_cursor` and subscribe to
    /// subsequent events. Increments the attached-clients count.
    pub fn attach(&self, since_cursor: u64) -> (Replay, broadcast::Receiver<PtyEvent>) {
        // Subscribe before reading the ring so no chunk is lost between
        // replay and stream
        let rx = self.shared.events_tx.subscribe();
        let replay = self.shared.ring.read().replay_from(since_cursor);
        self.shared.attached_clients.fetch_add(1, Ordering::SeqCst);
        (replay, rx)
    }

    /// Drop one attached client. Sessions are headless: the process keeps
    /// running at zero attached clients.
    pub fn detach(&self) {
        let prev = self.shared.attached_clients.fetch_sub(1, Ordering::SeqCst);
        if prev == 0 {
            // Underflow from a double-detach; clamp back
            self.shared.attached_clients.store(0, Ordering::SeqCst);
        }
    }

    /// Internal event watch that does not count as an event subscriber
    /// (gateway-side pumps).
    pub fn watch(&self) -> broadcast::Receiver<PtyEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Subscribe to the status/event stream without attaching to output.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PtyEvent> {
        self.shared.event_subscribers.fetch_add(1, Ordering::SeqCst);
        self.shared.events_tx.subscribe()
    }

    pub fn unsubscribe_events(&self) {
        let prev = self.shared.event_subscribers.fetch_sub(1, Ordering::SeqCst);
        if prev == 0 {
            self.shared.event_subscribers.store(0, Ordering::SeqCst);
        }
    }

    /// Write text to the child's stdin on behalf of `caller`.
    ///
    /// Fails unless `caller` holds the controller slot. Backpressure past
    /// the configured high-water mark drops the write and reports
    /// `responded = false` instead of blocking.
    pub fn respond(&self, caller: &ControllerId, text: &str) -> Result<Responded, PtyError> {
        {
            let controller = self.shared.controller.lock();
            match controller.as_ref() {
                None => return Err(PtyError::NoController),
                Some(c) if c.controller_id != *caller => return Err(PtyError::NotController),
                Some(_) => {}
            }
        }
        if !self.is_live() {
            return Err(PtyError::Exited);
        }

        let len = text.len() as u64;
        let queued = self.shared.queued_write_bytes.load(Ordering::Acquire);
        if queued + len > self.shared.respond_high_water {
            debug!(session_id = %self.shared.id, queued, "respond dropped on backpressure");
            return Ok(Responded {
                responded: false,
                sent_bytes: 0,
            });
        }

        // Count the write before enqueueing so the drain side can never
        // decrement first
        self.shared
            .queued_write_bytes
            .fetch_add(len, Ordering::AcqRel);
        let bytes = Bytes::copy_from_slice(text.as_bytes());
        match self.shared.write_tx.try_send(BackendInput::Write(bytes)) {
            Ok(()) => Ok(Responded {
                responded: true,
                sent_bytes: len,
            }),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.shared
                    .queued_write_bytes
                    .fetch_sub(len, Ordering::AcqRel);
                Ok(Responded {
                    responded: false,
                    sent_bytes: 0,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.shared
                    .queued_write_bytes
                    .fetch_sub(len, Ordering::AcqRel);
                Err(PtyError::Exited)
            }
        }
    }

    /// Send SIGINT to the child.
    pub fn interrupt(&self) -> Result<(), PtyError> {
        self.shared
            .signaller
            .signal(nix::libc::SIGINT)
            .map_err(PtyError::SignalFailed)
    }

    /// Resize the PTY window.
    pub fn resize(&self, cols: u16, rows: u16) {
        let _ = self.shared.resize_tx.try_send((cols, rows));
    }

    /// Claim the controller slot.
    ///
    /// With `takeover = false` the claim fails while another controller
    /// holds the slot. With `takeover = true` the prior controller is
    /// evicted atomically and a status change is published.
    pub fn claim(&self, controller: Controller, takeover: bool) -> Result<(), PtyError> {
        {
            let mut slot = self.shared.controller.lock();
            if let Some(existing) = slot.as_ref() {
                if existing.controller_id == controller.controller_id {
                    // Re-claim by the same controller refreshes the claim
                } else if !takeover {
                    return Err(PtyError::ControllerHeld(
                        existing.controller_id.as_str().to_owned(),
                    ));
                }
            }
            *slot = Some(controller);
        }
        self.publish_status();
        Ok(())
    }

    /// Release the controller slot if `caller` holds it.
    pub fn release(&self, caller: &ControllerId) -> bool {
        let released = {
            let mut slot = self.shared.controller.lock();
            match slot.as_ref() {
                Some(c) if c.controller_id == *caller => {
                    *slot = None;
                    true
                }
                _ => false,
            }
        };
        if released {
            self.publish_status();
        }
        released
    }

    pub fn controller(&self) -> Option<Controller> {
        self.shared.controller.lock().clone()
    }

    /// Graceful close: SIGTERM, a bounded grace period, then SIGKILL.
    pub async fn close(&self, grace: Duration) -> Result<ExitStatus, PtyError> {
        if !self.is_live() {
            return (*self.shared.last_exit.lock()).ok_or(PtyError::Exited);
        }

        if let Err(e) = self.shared.signaller.signal(nix::libc::SIGTERM) {
            warn!(session_id = %self.shared.id, error = %e, "SIGTERM failed");
        }

        let mut exited = self.shared.exited_rx.clone();
        let graceful = tokio::time::timeout(grace, exited.wait_for(|done| *done))
            .await
            .is_ok();

        if !graceful {
            // Grace expired; force kill
            if let Err(e) = self.shared.signaller.signal(nix::libc::SIGKILL) {
                warn!(session_id = %self.shared.id, error = %e, "SIGKILL failed");
            }
            let mut exited = self.shared.exited_rx.clone();
            let _ = tokio::time::timeout(Duration::from_secs(5), exited.wait_for(|done| *done))
                .await;
        }

        (*self.shared.last_exit.lock()).ok_or(PtyError::Exited)
    }

    /// Latest ring cursor.
    pub fn latest_cursor(&self) -> u64 {
        self.shared.ring.read().latest_cursor()
    }

    /// Assemble the wire-facing session view.
    pub fn view(&self) -> SessionView {
        let status_model = self.shared.status_model.lock().clone();
        SessionView {
            session_id: self.shared.id.clone(),
            scope: self.shared.scope.clone(),
            worktree_id: self.shared.worktree_id.clone(),
            status: *self.shared.status.lock(),
            status_model,
            latest_cursor: self.latest_cursor(),
            process_id: self.shared.process_id,
            attached_clients: self.shared.attached_clients.load(Ordering::SeqCst),
            event_subscribers: self.shared.event_subscribers.load(Ordering::SeqCst),
            started_at: self.shared.started_at,
            last_event_at: *self.shared.last_event_at.lock(),
            last_exit: *self.shared.last_exit.lock(),
            exited_at: *self.shared.exited_at.lock(),
            live: self.is_live(),
            launch_command: self.shared.launch_command.clone(),
            controller: self.controller(),
            telemetry: None,
        }
    }

    /// Publish the current status (after controller or model changes).
    pub(crate) fn publish_status(&self) {
        let event = PtyEvent::Status {
            session_id: self.shared.id.clone(),
            status: *self.shared.status.lock(),
            status_model: self.shared.status_model.lock().clone(),
            live: self.is_live(),
            controller: self.controller(),
        };
        let _ = self.shared.events_tx.send(event);
    }
}

/// Per-session pump: moves backend output into the ring, recomputes the
/// status model, and publishes events in generation order.
pub(crate) async fn run_pump(
    session: PtySession,
    mut backend: Box<dyn Backend>,
    write_rx: mpsc::Receiver<BackendInput>,
    resize_rx: mpsc::Receiver<(u16, u16)>,
    idle_after: Duration,
    exited_tx: watch::Sender<bool>,
) {
    let shared = Arc::clone(&session.shared);
    let (output_tx, mut output_rx) = mpsc::channel::<Bytes>(64);

    // Track bytes drained from the write queue for respond backpressure
    let (input_tx, input_rx) = mpsc::channel::<BackendInput>(64);
    let drain_counter = Arc::clone(&shared);
    let mut write_rx = write_rx;
    let drain_task = tokio::spawn(async move {
        while let Some(input) = write_rx.recv().await {
            let len = match &input {
                BackendInput::Write(bytes) => bytes.len() as u64,
                BackendInput::Drain(_) => 0,
            };
            if input_tx.send(input).await.is_err() {
                break;
            }
            drain_counter
                .queued_write_bytes
                .fetch_sub(len, Ordering::AcqRel);
        }
    });

    let mut backend_task = tokio::spawn(async move {
        let result = backend.run(output_tx, input_rx, resize_rx).await;
        drop(backend);
        result
    });

    let mut engine = StatusEngine::new();
    let mut exit_result: Option<ExitStatus> = None;

    loop {
        let idle_sleep = tokio::time::sleep(idle_after);
        tokio::pin!(idle_sleep);

        tokio::select! {
            chunk = output_rx.recv() => {
                match chunk {
                    Some(bytes) => handle_chunk(&session, &mut engine, bytes),
                    None => {
                        // Backend dropped its sender; wait for its result
                        let result = (&mut backend_task).await;
                        exit_result = Some(normalize_exit(result));
                        break;
                    }
                }
            }
            result = &mut backend_task => {
                // Drain any output queued before exit
                while let Ok(bytes) = output_rx.try_recv() {
                    handle_chunk(&session, &mut engine, bytes);
                }
                exit_result = Some(normalize_exit(result));
                break;
            }
            _ = &mut idle_sleep => {
                if let Some(model) = engine.observe_quiet() {
                    apply_model(&session, model);
                }
            }
            _ = shared.cancel.cancelled() => {
                let _ = shared.signaller.signal(nix::libc::SIGKILL);
                let result = (&mut backend_task).await;
                exit_result = Some(normalize_exit(result));
                break;
            }
        }
    }

    drain_task.abort();

    let exit = exit_result.unwrap_or(ExitStatus {
        code: None,
        signal: None,
    });

    // Finalize: status transitions to a terminal state before the exit
    // event so subscribers always see them in that order.
    shared.live.store(false, Ordering::Release);
    *shared.last_exit.lock() = Some(exit);
    *shared.exited_at.lock() = Some(Utc::now());
    let final_status = if exit.code == Some(0) {
        RuntimeStatus::Completed
    } else {
        RuntimeStatus::Exited
    };
    *shared.status.lock() = final_status;
    *shared.status_model.lock() = engine.observe_exit();
    session.publish_status();
    let _ = shared.events_tx.send(PtyEvent::Exit {
        session_id: shared.id.clone(),
        exit,
    });
    let _ = exited_tx.send(true);
}

fn handle_chunk(session: &PtySession, engine: &mut StatusEngine, bytes: Bytes) {
    let shared = &session.shared;
    let cursor = {
        let mut ring = shared.ring.write();
        ring.write(&bytes);
        ring.latest_cursor()
    };
    *shared.last_event_at.lock() = Some(Utc::now());
    let _ = shared.events_tx.send(PtyEvent::Output {
        session_id: shared.id.clone(),
        cursor,
        bytes: bytes.clone(),
    });

    // Derived status events follow their output chunk (generation order)
    if let Some(model) = engine.observe_output(&bytes) {
        apply_model(session, model);
    }
}

fn apply_model(session: &PtySession, model: StatusModel) {
    let shared = &session.shared;
    let status = if model.phase == Phase::NeedsInput {
        RuntimeStatus::NeedsInput
    } else {
        RuntimeStatus::Running
    };
    *shared.status.lock() = status;
    *shared.status_model.lock() = model;
    session.publish_status();
}

fn normalize_exit(
    result: Result<Result<ExitStatus, String>, tokio::task::JoinError>,
) -> ExitStatus {
    match result {
        Ok(Ok(exit)) => exit,
        Ok(Err(e)) => {
            warn!(error = %e, "pty backend failed");
            ExitStatus {
                code: None,
                signal: None,
            }
        }
        Err(e) => {
            warn!(error = %e, "pty backend task panicked");
            ExitStatus {
                code: None,
                signal: None,
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
