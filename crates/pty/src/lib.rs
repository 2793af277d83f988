// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! harness-pty: the PTY session supervisor.
//!
//! Each session owns a child process under a pseudo-terminal, a
//! cursor-tagged output ring buffer, a status model derived from recent
//! output, and an exclusive controller slot. The supervisor multiplexes
//! many sessions and fans output/status/exit events out to subscribers.

pub mod backend;
pub mod nbio;
pub mod ring;
pub mod session;
pub mod spawn;
pub mod status;
pub mod supervisor;

pub use backend::{Backend, BackendInput, Boxed, Signaller};
pub use ring::{Replay, RingBuffer};
pub use session::{PtyEvent, PtySession, Responded};
pub use spawn::{NativePty, SpawnCommand};
pub use status::StatusEngine;
pub use supervisor::{PtyConfig, SessionSupervisor, StartSpec};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use backend::{FakeBackend, FakeBackendHandle};

use harness_core::ErrorKind;
use thiserror::Error;

/// Errors from PTY session operations
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session id already live: {0}")]
    Conflict(String),
    #[error("pty start failed: {0}")]
    StartFailed(String),
    #[error("controller held by {0}")]
    ControllerHeld(String),
    #[error("no controller claimed")]
    NoController,
    #[error("caller is not the controller")]
    NotController,
    #[error("signal failed: {0}")]
    SignalFailed(String),
    #[error("session already exited")]
    Exited,
}

impl PtyError {
    /// Map to the wire error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PtyError::NotFound(_) => ErrorKind::NotFound,
            PtyError::Conflict(_) => ErrorKind::Conflict,
            PtyError::StartFailed(_) => ErrorKind::PtyStartFailed,
            PtyError::ControllerHeld(_) => ErrorKind::ControllerHeld,
            PtyError::NoController | PtyError::NotController => ErrorKind::ControllerHeld,
            PtyError::SignalFailed(_) => ErrorKind::Internal,
            PtyError::Exited => ErrorKind::Conflict,
        }
    }
}
