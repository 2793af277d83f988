// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-session turn state machine.
//!
//! At most one run is active at a time. `send_turn` starts a run (or
//! queues the input when one is active), `steer_turn` injects mid-turn
//! text subject to the driver's approval, `abort_turn` cancels. Every
//! terminal event clears the active run and drains one queued input.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::{self, LocalCommand};
use crate::driver::{ProviderDriver, Steer, SteerOutcome, ToolBridge, TurnContext, TurnRequest};
use crate::event::{ProviderEvent, RuntimeEvent, SessionStatus, UiEvent, UiMode};
use crate::project::project;
use crate::transcript::{Speaker, Transcript};

/// Errors from the runtime surface.
#[derive(Debug, Error)]
pub enum NimError {
    #[error("no provider registered")]
    NoProvider,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Runtime tunables.
#[derive(Debug, Clone)]
pub struct NimConfig {
    /// Bounded transcript length in lines.
    pub transcript_capacity: usize,
    /// How long to wait for a driver's steer verdict.
    pub steer_timeout: Duration,
}

impl Default for NimConfig {
    fn default() -> Self {
        Self {
            transcript_capacity: 1000,
            steer_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle identifying one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: String,
}

/// Result of `send_turn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// A new run was spawned.
    Started(RunHandle),
    /// A run is active; the input was queued.
    Queued { position: usize },
    /// The idempotency key matched a prior run.
    Duplicate(RunHandle),
}

struct ActiveRun {
    run_id: String,
    steer_tx: mpsc::Sender<Steer>,
    cancel: CancellationToken,
}

struct Inner {
    config: NimConfig,
    status: Mutex<SessionStatus>,
    ui_mode: Mutex<UiMode>,
    composer: Mutex<String>,
    queued_inputs: Mutex<VecDeque<String>>,
    active: Mutex<Option<ActiveRun>>,
    transcript: Mutex<Transcript>,
    drivers: Mutex<HashMap<String, Arc<dyn ProviderDriver>>>,
    active_provider: Mutex<Option<String>>,
    tools: Arc<dyn ToolBridge>,
    events_tx: broadcast::Sender<RuntimeEvent>,
    ui_tx: broadcast::Sender<UiEvent>,
    runs_by_key: Mutex<HashMap<String, RunHandle>>,
}

/// One conversational session's runtime.
#[derive(Clone)]
pub struct NimSession {
    inner: Arc<Inner>,
}

impl NimSession {
    pub fn new(tools: Arc<dyn ToolBridge>, config: NimConfig) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        let (ui_tx, _) = broadcast::channel(256);
        let transcript = Transcript::new(config.transcript_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                status: Mutex::new(SessionStatus::Idle),
                ui_mode: Mutex::new(UiMode::Seamless),
                composer: Mutex::new(String::new()),
                queued_inputs: Mutex::new(VecDeque::new()),
                active: Mutex::new(None),
                transcript: Mutex::new(transcript),
                drivers: Mutex::new(HashMap::new()),
                active_provider: Mutex::new(None),
                tools,
                events_tx,
                ui_tx,
                runs_by_key: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a provider driver. The first registration becomes the
    /// active provider.
    pub fn register_provider(&self, driver: Arc<dyn ProviderDriver>) {
        let id = driver.id().to_owned();
        self.inner.drivers.lock().insert(id.clone(), driver);
        let mut active = self.inner.active_provider.lock();
        if active.is_none() {
            *active = Some(id);
        }
    }

    /// Switch the active provider.
    pub fn select_provider(&self, id: &str) -> Result<(), NimError> {
        if !self.inner.drivers.lock().contains_key(id) {
            return Err(NimError::UnknownProvider(id.to_owned()));
        }
        *self.inner.active_provider.lock() = Some(id.to_owned());
        Ok(())
    }

    /// Subscribe to the semantic-fidelity event stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Subscribe to the mode-projected UI stream.
    pub fn subscribe_ui(&self) -> broadcast::Receiver<UiEvent> {
        self.inner.ui_tx.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        *self.inner.status.lock()
    }

    pub fn ui_mode(&self) -> UiMode {
        *self.inner.ui_mode.lock()
    }

    pub fn set_ui_mode(&self, mode: UiMode) {
        *self.inner.ui_mode.lock() = mode;
    }

    pub fn composer_text(&self) -> String {
        self.inner.composer.lock().clone()
    }

    pub fn set_composer_text(&self, text: impl Into<String>) {
        *self.inner.composer.lock() = text.into();
    }

    pub fn queued_inputs(&self) -> Vec<String> {
        self.inner.queued_inputs.lock().iter().cloned().collect()
    }

    pub fn active_run_id(&self) -> Option<String> {
        self.inner.active.lock().as_ref().map(|a| a.run_id.clone())
    }

    /// Read-only transcript access.
    pub fn with_transcript<R>(&self, f: impl FnOnce(&Transcript) -> R) -> R {
        f(&self.inner.transcript.lock())
    }

    /// Start a turn, or queue the input when a run is active.
    ///
    /// A repeated `idempotency_key` returns the prior run handle rather
    /// than starting a new run.
    pub fn send_turn(
        &self,
        input: &str,
        idempotency_key: Option<&str>,
    ) -> Result<SendOutcome, NimError> {
        if let Some(key) = idempotency_key {
            if let Some(handle) = self.inner.runs_by_key.lock().get(key) {
                return Ok(SendOutcome::Duplicate(handle.clone()));
            }
        }

        if self.inner.active.lock().is_some() {
            let mut queue = self.inner.queued_inputs.lock();
            queue.push_back(input.to_owned());
            return Ok(SendOutcome::Queued {
                position: queue.len(),
            });
        }

        self.start_run(input, idempotency_key)
            .map(SendOutcome::Started)
    }

    /// Inject mid-turn user text. The driver decides whether to accept;
    /// rejected steers are pushed back onto the input queue.
    pub async fn steer_turn(&self, text: &str) -> SteerOutcome {
        let steer_tx = self
            .inner
            .active
            .lock()
            .as_ref()
            .map(|a| a.steer_tx.clone());

        let Some(steer_tx) = steer_tx else {
            self.requeue(text);
            return SteerOutcome::rejected("no active run");
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let steer = Steer {
            text: text.to_owned(),
            reply: reply_tx,
        };
        if steer_tx.send(steer).await.is_err() {
            self.requeue(text);
            return SteerOutcome::rejected("run ended");
        }

        match tokio::time::timeout(self.inner.config.steer_timeout, reply_rx).await {
            Ok(Ok(outcome)) => {
                if !outcome.accepted {
                    self.requeue(text);
                }
                outcome
            }
            _ => {
                self.requeue(text);
                SteerOutcome::rejected("steer timed out")
            }
        }
    }

    /// Abort the active run, if any. Emits `turn.aborted` and
    /// transitions to idle.
    pub fn abort_turn(&self, reason: &str) -> bool {
        let aborted = {
            let active = self.inner.active.lock();
            active
                .as_ref()
                .map(|a| (a.run_id.clone(), a.cancel.clone()))
        };
        let Some((run_id, cancel)) = aborted else {
            return false;
        };

        cancel.cancel();
        self.emit(RuntimeEvent::TurnAborted {
            run_id: run_id.clone(),
            reason: reason.to_owned(),
        });
        self.finalize(&run_id);
        true
    }

    /// Tab: push the composer text onto the input queue.
    pub fn queue_composer(&self) -> Option<String> {
        let text = std::mem::take(&mut *self.inner.composer.lock());
        if text.trim().is_empty() {
            return None;
        }
        self.inner.queued_inputs.lock().push_back(text.clone());
        Some(text)
    }

    /// Enter: submit the composer text — local `/` commands run in
    /// place, anything else becomes a turn.
    pub fn submit_composer(&self) -> Result<Option<SendOutcome>, NimError> {
        let text = std::mem::take(&mut *self.inner.composer.lock());
        if text.trim().is_empty() {
            return Ok(None);
        }

        match command::parse_local_command(&text) {
            Some(Ok(cmd)) => {
                self.run_local(cmd);
                Ok(None)
            }
            Some(Err(message)) => {
                self.notice(message);
                Ok(None)
            }
            None => self.send_turn(&text, None).map(Some),
        }
    }

    fn run_local(&self, cmd: LocalCommand) {
        match cmd {
            LocalCommand::Help => self.notice(command::help_text().to_owned()),
            LocalCommand::State => {
                let status = self.status();
                let mode = self.ui_mode();
                let queued = self.inner.queued_inputs.lock().len();
                let active = self.active_run_id();
                self.notice(format!(
                    "status={} mode={:?} queued={} active={}",
                    status.as_str(),
                    mode,
                    queued,
                    active.as_deref().unwrap_or("none"),
                ));
            }
            LocalCommand::Clear => {
                self.inner.transcript.lock().clear();
                self.notice("transcript cleared".to_owned());
            }
            LocalCommand::Abort => {
                if !self.abort_turn("user abort") {
                    self.notice("no active run".to_owned());
                }
            }
            LocalCommand::Mode(mode) => {
                self.set_ui_mode(mode);
                self.notice(format!("mode={mode:?}").to_lowercase());
            }
        }
    }

    fn requeue(&self, text: &str) {
        self.inner.queued_inputs.lock().push_back(text.to_owned());
    }

    fn notice(&self, text: String) {
        let _ = self.inner.ui_tx.send(UiEvent::Notice { text });
    }

    fn start_run(
        &self,
        input: &str,
        idempotency_key: Option<&str>,
    ) -> Result<RunHandle, NimError> {
        let driver = {
            let provider = self.inner.active_provider.lock();
            let id = provider.as_ref().ok_or(NimError::NoProvider)?;
            self.inner
                .drivers
                .lock()
                .get(id)
                .cloned()
                .ok_or(NimError::NoProvider)?
        };

        let run_id = uuid::Uuid::new_v4().to_string();
        let handle = RunHandle {
            run_id: run_id.clone(),
        };
        if let Some(key) = idempotency_key {
            self.inner
                .runs_by_key
                .lock()
                .insert(key.to_owned(), handle.clone());
        }

        let (events_tx, events_rx) = mpsc::channel(64);
        let (steer_tx, steer_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        *self.inner.active.lock() = Some(ActiveRun {
            run_id: run_id.clone(),
            steer_tx,
            cancel: cancel.clone(),
        });

        self.inner.transcript.lock().push(Speaker::User, input);
        self.set_status(SessionStatus::Thinking);
        self.emit(RuntimeEvent::TurnStarted {
            run_id: run_id.clone(),
        });

        let request = TurnRequest {
            run_id: run_id.clone(),
            input: input.to_owned(),
        };
        let ctx = TurnContext {
            events: events_tx,
            steer_rx,
            cancel: cancel.clone(),
            tools: Arc::clone(&self.inner.tools),
        };
        let driver_run_id = run_id.clone();
        tokio::spawn(async move {
            if let Err(e) = driver.run_turn(request, ctx).await {
                warn!(run_id = %driver_run_id, error = %e, "driver turn failed");
            }
        });

        let session = self.clone();
        tokio::spawn(session.pump(run_id.clone(), events_rx, cancel));

        Ok(handle)
    }

    /// Consume a run's semantic events until it finishes.
    async fn pump(
        self,
        run_id: String,
        mut events_rx: mpsc::Receiver<ProviderEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                event = events_rx.recv() => event,
                _ = cancel.cancelled() => {
                    debug!(run_id = %run_id, "run cancelled");
                    break;
                }
            };
            let Some(event) = event else {
                // Driver dropped its sender without a finish event
                break;
            };

            if let Some(next) = status_for(&event) {
                self.set_status(next);
            }
            if let ProviderEvent::OutputCompleted { text } = &event {
                self.inner
                    .transcript
                    .lock()
                    .push(Speaker::Assistant, text.clone());
            }
            let finished = matches!(event, ProviderEvent::TurnFinished { .. });
            self.emit(RuntimeEvent::Provider {
                run_id: run_id.clone(),
                event,
            });
            if finished {
                break;
            }
        }

        self.finalize(&run_id);
    }

    /// Clear the active run (if still this run), go idle, and drain one
    /// queued input.
    fn finalize(&self, run_id: &str) {
        {
            let mut active = self.inner.active.lock();
            match active.as_ref() {
                Some(run) if run.run_id == run_id => *active = None,
                _ => return,
            }
        }

        self.set_status(SessionStatus::Idle);

        let next = self.inner.queued_inputs.lock().pop_front();
        if let Some(input) = next {
            if let Err(e) = self.start_run(&input, None) {
                warn!(error = %e, "failed to start queued turn");
            }
        }
    }

    fn set_status(&self, to: SessionStatus) {
        let from = {
            let mut status = self.inner.status.lock();
            let from = *status;
            if from == to {
                return;
            }
            *status = to;
            from
        };
        self.emit(RuntimeEvent::StatusChanged { from, to });
    }

    fn emit(&self, event: RuntimeEvent) {
        let mode = self.ui_mode();
        for ui in project(mode, &event) {
            let _ = self.inner.ui_tx.send(ui);
        }
        let _ = self.inner.events_tx.send(event);
    }
}

/// Status implied by a semantic event, if any.
fn status_for(event: &ProviderEvent) -> Option<SessionStatus> {
    match event {
        ProviderEvent::ThinkingStarted => Some(SessionStatus::Thinking),
        ProviderEvent::ToolCallStarted { .. } => Some(SessionStatus::ToolCalling),
        ProviderEvent::OutputDelta { .. } | ProviderEvent::OutputCompleted { .. } => {
            Some(SessionStatus::Responding)
        }
        ProviderEvent::ThinkingCompleted
        | ProviderEvent::ToolCallArgumentsDelta { .. }
        | ProviderEvent::ToolCallCompleted { .. }
        | ProviderEvent::ToolCallFailed { .. }
        | ProviderEvent::ToolResultEmitted { .. }
        | ProviderEvent::TurnFinished { .. } => None,
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
