// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synced store: holds one `SyncedState` value, notifies subscribers,
//! and enforces per-subscription cursor ordering on applied events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use harness_core::{CursorTracker, ObservedEvent};
use parking_lot::Mutex;

use crate::reduce::{reduce, Reduction};
use crate::state::SyncedState;

type Listener = Arc<dyn Fn(&SyncedState) + Send + Sync>;

/// Client-side store shared by every view of one connection.
pub struct SyncedStore {
    state: Mutex<SyncedState>,
    cursors: Mutex<CursorTracker>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl Default for SyncedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncedStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SyncedState::new()),
            cursors: Mutex::new(CursorTracker::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Cheap snapshot of the current state (Arc clones only).
    pub fn get_state(&self) -> SyncedState {
        self.state.lock().clone()
    }

    /// Register a listener invoked after every successful state
    /// replacement, in registration order, once per change.
    pub fn subscribe(
        self: &Arc<Self>,
        listener: impl Fn(&SyncedState) + Send + Sync + 'static,
    ) -> StoreSubscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::new(listener)));
        StoreSubscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    /// Apply an observed event under a subscription cursor.
    ///
    /// Returns whether the cursor was accepted. Rejected cursors leave the
    /// state untouched; accepted events that reduce to `changed = false`
    /// do not notify listeners.
    pub fn apply_observed(
        &self,
        subscription_id: &str,
        cursor: u64,
        event: &ObservedEvent,
    ) -> bool {
        if !self.cursors.lock().observe(subscription_id, cursor) {
            return false;
        }

        let reduction: Reduction = {
            let mut state = self.state.lock();
            let reduction = reduce(&state, event);
            if reduction.changed {
                *state = reduction.state.clone();
            }
            reduction
        };

        if reduction.changed {
            self.notify(&reduction.state);
        }
        true
    }

    /// Last accepted cursor for a subscription.
    pub fn last_cursor(&self, subscription_id: &str) -> Option<u64> {
        self.cursors.lock().last_cursor(subscription_id)
    }

    fn notify(&self, state: &SyncedState) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }
}

/// Handle returned by [`SyncedStore::subscribe`]; unsubscribes on drop.
pub struct StoreSubscription {
    store: std::sync::Weak<SyncedStore>,
    id: u64,
}

impl StoreSubscription {
    /// Explicitly remove the listener.
    pub fn unsubscribe(self) {
        // Drop impl does the work
    }
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
