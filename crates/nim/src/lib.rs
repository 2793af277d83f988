// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! harness-nim: the agent-facing provider runtime.
//!
//! A `NimSession` drives one conversational session through a turn state
//! machine. Providers plug in behind the `ProviderDriver` seam and emit a
//! semantic event stream; the runtime forwards it on the event channel
//! and projects it onto a coarser UI channel (debug or seamless mode).

pub mod command;
pub mod driver;
pub mod event;
pub mod project;
pub mod runtime;
pub mod transcript;

pub use command::LocalCommand;
pub use driver::{
    DriverError, ProviderDriver, Steer, SteerOutcome, ToolBridge, TurnContext, TurnRequest,
};
pub use event::{ProviderEvent, RuntimeEvent, SessionStatus, UiEvent, UiMode};
pub use project::project;
pub use runtime::{NimConfig, NimSession, RunHandle, SendOutcome};
pub use transcript::Transcript;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{EchoToolBridge, FakeDriver};
