// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desktop notification adapters.
//!
//! The gateway notifies when a session transitions to needs-input.

use async_trait::async_trait;
use tracing::debug;

/// Notification sink.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, title: &str, body: &str);
}

/// Desktop notifications via the platform notification service.
pub struct DesktopNotifier;

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, body: &str) {
        let title = title.to_owned();
        let body = body.to_owned();
        // notify-rust blocks on DBus; keep it off the async threads
        let result = tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .summary(&title)
                .body(&body)
                .appname("harness")
                .show()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "desktop notification failed"),
            Err(e) => debug!(error = %e, "notification task failed"),
        }
    }
}

/// Silent sink for tests and headless hosts.
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, _title: &str, _body: &str) {}
}
