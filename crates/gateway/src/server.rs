// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared server context for all request handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use harness_core::{CommandError, ErrorKind, ObservedEvent, Scope};
use harness_pty::SessionSupervisor;
use harness_storage::{EventLog, PersistedState};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::hub::SubscriptionHub;
use crate::notify::Notifier;
use crate::title::TitleProvider;
use crate::trace::TraceState;

/// Shared gateway context for all request handlers.
pub struct ServerCtx {
    pub state: Arc<Mutex<PersistedState>>,
    pub log: Arc<Mutex<EventLog>>,
    pub supervisor: Arc<SessionSupervisor>,
    pub hub: Arc<SubscriptionHub>,
    pub notifier: Arc<dyn Notifier>,
    pub titles: Arc<dyn TitleProvider>,
    pub trace: Arc<TraceState>,
    pub auth_token: String,
    pub started_at: DateTime<Utc>,
    pub shutdown: Arc<Notify>,
    pub notifications_enabled: AtomicBool,
    /// Serializes mutating commands. Lock order everywhere is fixed:
    /// this lock, then the session, then the store.
    pub write_lock: tokio::sync::Mutex<()>,
}

impl ServerCtx {
    /// Persist an observed event, apply it to the materialized state,
    /// and fan it out to subscribers — the single mutation path.
    pub fn emit(&self, scope: &Scope, event: ObservedEvent) -> Result<u64, CommandError> {
        let cursor = {
            let mut log = self.log.lock();
            log.append(scope, &event).map_err(|e| {
                CommandError::new(ErrorKind::StorageError, format!("event append failed: {e}"))
            })?
        };
        self.state.lock().apply_event(&event);
        self.trace.record(cursor, &event);
        self.hub.publish_observed(scope, cursor, &event);
        Ok(cursor)
    }

    /// Current global cursor.
    pub fn cursor(&self) -> u64 {
        self.log.lock().write_cursor()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::Acquire)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.notifications_enabled.store(enabled, Ordering::Release);
    }
}
