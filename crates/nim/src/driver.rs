// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The provider-driver seam.
//!
//! Adding a provider is a new `ProviderDriver` implementation, not a type
//! change anywhere else. Drivers receive a turn request plus a context
//! holding the semantic event channel, the steer channel, a cancellation
//! token, and the tool bridge.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::event::ProviderEvent;

/// Errors surfaced by drivers.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("tool error: {0}")]
    Tool(String),
    #[error("turn aborted")]
    Aborted,
}

/// One request-to-assistant interaction.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub run_id: String,
    pub input: String,
}

/// Mid-turn user text injection. The driver decides whether to accept.
#[derive(Debug)]
pub struct Steer {
    pub text: String,
    pub reply: oneshot::Sender<SteerOutcome>,
}

/// Driver's verdict on a steer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteerOutcome {
    pub accepted: bool,
    pub reason: Option<String>,
}

impl SteerOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Tool invocation seam provided by the host.
#[async_trait]
pub trait ToolBridge: Send + Sync + 'static {
    async fn invoke(&self, name: &str, args: Value) -> Result<Value, String>;
}

/// Everything a driver needs while running one turn.
pub struct TurnContext {
    /// Semantic event sink. The runtime closes the turn when the driver
    /// sends `provider.turn.finished` or returns.
    pub events: mpsc::Sender<ProviderEvent>,
    /// Mid-turn steer requests from the runtime.
    pub steer_rx: mpsc::Receiver<Steer>,
    /// Cancelled by `abortTurn` and session teardown. Drivers must not
    /// block indefinitely while ignoring this.
    pub cancel: CancellationToken,
    pub tools: Arc<dyn ToolBridge>,
}

/// A provider implementation.
#[async_trait]
pub trait ProviderDriver: Send + Sync + 'static {
    /// Stable provider id (e.g. "anthropic", "openai").
    fn id(&self) -> &str;

    /// Run one turn to completion, emitting semantic events.
    async fn run_turn(&self, turn: TurnRequest, ctx: TurnContext) -> Result<(), DriverError>;
}
