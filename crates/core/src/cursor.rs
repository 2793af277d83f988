// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic per-subscription cursor enforcement.
//!
//! Both sides of the wire run the same tracker: the gateway before
//! delivering an event to a subscriber, the client before applying it to
//! the synced store. A fresh subscription has no last cursor, so cursor 0
//! is valid for the first event.

use std::collections::HashMap;

/// Tracks the last accepted cursor per subscription id.
#[derive(Debug, Default, Clone)]
pub struct CursorTracker {
    last: HashMap<String, u64>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `cursor` for `subscription_id` iff it is strictly greater
    /// than the last accepted cursor (or the subscription is fresh).
    /// Advances the tracker on acceptance.
    pub fn observe(&mut self, subscription_id: &str, cursor: u64) -> bool {
        match self.last.get(subscription_id) {
            Some(&last) if cursor <= last => false,
            _ => {
                self.last.insert(subscription_id.to_owned(), cursor);
                true
            }
        }
    }

    /// Last accepted cursor for a subscription, if any event was accepted.
    pub fn last_cursor(&self, subscription_id: &str) -> Option<u64> {
        self.last.get(subscription_id).copied()
    }

    /// Forget a subscription so a replacement starts fresh.
    pub fn forget(&mut self, subscription_id: &str) {
        self.last.remove(subscription_id);
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
