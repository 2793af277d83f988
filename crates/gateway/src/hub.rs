// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription hub: fans observed events out to scoped subscribers.
//!
//! A subscription is either scoped to the workspace (all observed events
//! in its scope triple) or to one session (only that session's
//! `session-status` events and its `pty.exit`). Delivery is in cursor
//! order; a subscriber whose outbound buffer is full is disconnected
//! with `backpressure` rather than slowing the gateway down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use harness_core::{ObservedEvent, Scope};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::protocol::EventFrame;

/// Handle identifying one registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubId(u64);

struct Subscriber {
    scope: Scope,
    subscription_id: String,
    /// When set, only `session-status` events for this session (and its
    /// `pty.exit`) are delivered.
    session_filter: Option<String>,
    tx: mpsc::Sender<EventFrame>,
    /// Cancelled to disconnect the owning connection on backpressure.
    disconnect: CancellationToken,
}

/// Fan-out registry shared by all connections.
#[derive(Default)]
pub struct SubscriptionHub {
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workspace-scoped subscription.
    pub fn subscribe_workspace(
        &self,
        scope: Scope,
        subscription_id: String,
        tx: mpsc::Sender<EventFrame>,
        disconnect: CancellationToken,
    ) -> SubId {
        self.register(scope, subscription_id, None, tx, disconnect)
    }

    /// Register a session-scoped subscription.
    pub fn subscribe_session(
        &self,
        scope: Scope,
        subscription_id: String,
        session_id: String,
        tx: mpsc::Sender<EventFrame>,
        disconnect: CancellationToken,
    ) -> SubId {
        self.register(scope, subscription_id, Some(session_id), tx, disconnect)
    }

    fn register(
        &self,
        scope: Scope,
        subscription_id: String,
        session_filter: Option<String>,
        tx: mpsc::Sender<EventFrame>,
        disconnect: CancellationToken,
    ) -> SubId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().insert(
            id,
            Subscriber {
                scope,
                subscription_id,
                session_filter,
                tx,
                disconnect,
            },
        );
        SubId(id)
    }

    pub fn unsubscribe(&self, id: SubId) {
        self.subscribers.lock().remove(&id.0);
    }

    /// Deliver an observed event (already stamped with its global
    /// cursor) to every matching subscriber.
    pub fn publish_observed(&self, scope: &Scope, cursor: u64, event: &ObservedEvent) {
        let session_of_event = match event {
            ObservedEvent::SessionStatus {
                conversation_id, ..
            } => Some(conversation_id.as_str()),
            _ => None,
        };

        self.deliver(scope, |sub| match (&sub.session_filter, session_of_event) {
            (None, _) => Some(EventFrame::Observed {
                subscription_id: sub.subscription_id.clone(),
                cursor,
                event: event.clone(),
            }),
            (Some(filter), Some(session)) if filter == session => Some(EventFrame::Observed {
                subscription_id: sub.subscription_id.clone(),
                cursor,
                event: event.clone(),
            }),
            (Some(_), _) => None,
        });
    }

    /// Deliver a `pty.exit` frame to the session's subscribers.
    pub fn publish_pty_exit(
        &self,
        scope: &Scope,
        session_id: &str,
        code: Option<i32>,
        signal: Option<i32>,
    ) {
        self.deliver(scope, |sub| match &sub.session_filter {
            Some(filter) if filter == session_id => Some(EventFrame::PtyExit {
                session_id: session_id.to_owned(),
                code,
                signal,
            }),
            _ => None,
        });
    }

    fn deliver(&self, scope: &Scope, frame_for: impl Fn(&Subscriber) -> Option<EventFrame>) {
        let mut dropped = Vec::new();
        {
            let subscribers = self.subscribers.lock();
            for (id, sub) in subscribers.iter() {
                if sub.scope != *scope {
                    continue;
                }
                let Some(frame) = frame_for(sub) else {
                    continue;
                };
                match sub.tx.try_send(frame) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(
                            subscription_id = %sub.subscription_id,
                            "subscriber buffer full, disconnecting with backpressure",
                        );
                        sub.disconnect.cancel();
                        dropped.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dropped.push(*id);
                    }
                }
            }
        }
        if !dropped.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in dropped {
                subscribers.remove(&id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
