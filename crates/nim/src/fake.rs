// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted driver and tool bridge for runtime tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]` via lib.rs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::driver::{
    DriverError, ProviderDriver, SteerOutcome, ToolBridge, TurnContext, TurnRequest,
};
use crate::event::ProviderEvent;

/// Tool bridge that echoes its arguments back.
pub struct EchoToolBridge;

#[async_trait]
impl ToolBridge for EchoToolBridge {
    async fn invoke(&self, name: &str, args: Value) -> Result<Value, String> {
        Ok(json!({"tool": name, "echo": args}))
    }
}

/// Scripted provider driver.
///
/// Interprets turn input:
/// - `use-tool NAME JSON` runs one tool call through the bridge, then
///   responds with the serialized result.
/// - anything else responds with `re: <input>`.
///
/// The response text is emitted as two deltas followed by a completed
/// message and `provider.turn.finished("stop")`. Steers received before
/// the response starts are accepted (when `accept_steers`) and appended
/// to the response; later or disallowed steers are rejected.
pub struct FakeDriver {
    accept_steers: bool,
    /// When set, the driver pauses before responding until notified,
    /// leaving a window for steer/abort tests.
    gate: Option<Arc<Notify>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            accept_steers: true,
            gate: None,
        }
    }

    pub fn rejecting_steers() -> Self {
        Self {
            accept_steers: false,
            gate: None,
        }
    }

    /// Pause before responding until the returned handle is notified.
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (
            Self {
                accept_steers: true,
                gate: Some(Arc::clone(&gate)),
            },
            gate,
        )
    }
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDriver for FakeDriver {
    fn id(&self) -> &str {
        "fake"
    }

    async fn run_turn(&self, turn: TurnRequest, ctx: TurnContext) -> Result<(), DriverError> {
        let TurnContext {
            events,
            mut steer_rx,
            cancel,
            tools,
        } = ctx;

        let send = |event: ProviderEvent| {
            let events = events.clone();
            async move {
                events
                    .send(event)
                    .await
                    .map_err(|_| DriverError::Aborted)
            }
        };

        send(ProviderEvent::ThinkingStarted).await?;

        let mut steered = Vec::new();

        // Window for steers/abort before the response starts
        if let Some(gate) = &self.gate {
            loop {
                tokio::select! {
                    _ = gate.notified() => break,
                    _ = cancel.cancelled() => return Err(DriverError::Aborted),
                    steer = steer_rx.recv() => {
                        if let Some(steer) = steer {
                            if self.accept_steers {
                                steered.push(steer.text.clone());
                                let _ = steer.reply.send(SteerOutcome::accepted());
                            } else {
                                let _ = steer
                                    .reply
                                    .send(SteerOutcome::rejected("steering disabled"));
                            }
                        }
                    }
                }
            }
        }

        // Drain any steers that raced the gate
        while let Ok(steer) = steer_rx.try_recv() {
            if self.accept_steers {
                steered.push(steer.text.clone());
                let _ = steer.reply.send(SteerOutcome::accepted());
            } else {
                let _ = steer.reply.send(SteerOutcome::rejected("steering disabled"));
            }
        }

        let mut response = if let Some(rest) = turn.input.strip_prefix("use-tool ") {
            let (name, args_text) = rest.split_once(' ').unwrap_or((rest, "{}"));
            let args: Value = serde_json::from_str(args_text).unwrap_or(Value::Null);
            let call_id = format!("call-{}", turn.run_id);

            send(ProviderEvent::ToolCallStarted {
                call_id: call_id.clone(),
                name: name.to_owned(),
            })
            .await?;
            send(ProviderEvent::ToolCallArgumentsDelta {
                call_id: call_id.clone(),
                delta: args_text.to_owned(),
            })
            .await?;

            match tools.invoke(name, args).await {
                Ok(result) => {
                    send(ProviderEvent::ToolCallCompleted {
                        call_id: call_id.clone(),
                    })
                    .await?;
                    send(ProviderEvent::ToolResultEmitted {
                        call_id,
                        result: result.clone(),
                    })
                    .await?;
                    result.to_string()
                }
                Err(error) => {
                    send(ProviderEvent::ToolCallFailed {
                        call_id,
                        error: error.clone(),
                    })
                    .await?;
                    format!("tool failed: {error}")
                }
            }
        } else {
            format!("re: {}", turn.input)
        };

        for text in &steered {
            response.push_str(&format!(" [steered: {text}]"));
        }

        send(ProviderEvent::ThinkingCompleted).await?;

        // Two deltas summing to the final text
        let mid = response.len() / 2;
        let split = (0..=mid)
            .rev()
            .find(|&i| response.is_char_boundary(i))
            .unwrap_or(0);
        let (a, b) = response.split_at(split);
        if !a.is_empty() {
            send(ProviderEvent::OutputDelta {
                text: a.to_owned(),
            })
            .await?;
        }
        if !b.is_empty() {
            send(ProviderEvent::OutputDelta {
                text: b.to_owned(),
            })
            .await?;
        }
        send(ProviderEvent::OutputCompleted { text: response }).await?;
        send(ProviderEvent::TurnFinished {
            finish_reason: "stop".to_owned(),
        })
        .await?;

        Ok(())
    }
}
