// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for `pty.*` and `session.*` commands.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use harness_core::{
    CommandError, Controller, ControllerId, ControllerType, ObservedEvent, RuntimeStatus,
    SessionId, SessionStatusPayload, StatusModel,
};
use harness_pty::{PtyEvent, PtySession, StartSpec};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{conversations, ConnState};
use crate::protocol::EventFrame;
use crate::server::ServerCtx;

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub(crate) struct StartParams {
    pub session_id: String,
    pub args: Vec<String>,
    pub env: Option<HashMap<String, String>>,
    pub cwd: Option<String>,
    pub cols: u16,
    pub rows: u16,
    pub worktree_id: Option<String>,
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub directory_id: Option<String>,
    pub agent_type: Option<String>,
}

/// Look up a session, enforcing the connection scope.
fn lookup(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    session_id: &str,
) -> Result<PtySession, CommandError> {
    let session = ctx
        .supervisor
        .get(session_id)
        .map_err(|e| CommandError::new(e.kind(), e.to_string()))?;
    if *session.scope() != conn.scope {
        return Err(CommandError::not_found(format!(
            "unknown session: {session_id}",
        )));
    }
    Ok(session)
}

pub(crate) async fn handle_start(
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    params: StartParams,
) -> Result<Value, CommandError> {
    if params.session_id.is_empty() {
        return Err(CommandError::bad_request("sessionId must be non-empty"));
    }
    if params.args.is_empty() {
        return Err(CommandError::bad_request("args must be non-empty"));
    }

    let _guard = ctx.write_lock.lock().await;

    let spec = StartSpec {
        session_id: SessionId::new(&params.session_id),
        scope: conn.scope.clone(),
        argv: params.args.clone(),
        env: params
            .env
            .map(|m| m.into_iter().collect())
            .unwrap_or_default(),
        cwd: params.cwd.as_ref().map(Into::into),
        cols: params.cols,
        rows: params.rows,
        worktree_id: params.worktree_id,
        fg: params.fg,
        bg: params.bg,
    };

    // Spawn failures surface as pty_start_failed and create no records
    let session = ctx
        .supervisor
        .start(spec)
        .map_err(|e| CommandError::new(e.kind(), e.to_string()))?;

    // A relaunch of an existing conversation keeps its record; only a
    // fresh id creates one
    let existing = {
        let state = ctx.state.lock();
        state
            .conversations
            .get(&params.session_id)
            .filter(|c| c.scope == conn.scope)
            .cloned()
    };
    if existing.is_none() {
        let directory_id = params
            .directory_id
            .unwrap_or_else(|| params.cwd.clone().unwrap_or_else(|| "workspace".to_owned()));
        conversations::ensure_directory(ctx, conn, &directory_id, params.cwd.as_deref())?;

        let conversation = harness_core::Conversation {
            conversation_id: harness_core::ConversationId::new(&params.session_id),
            directory_id: harness_core::DirectoryId::new(&directory_id),
            scope: conn.scope.clone(),
            title: String::new(),
            agent_type: params.agent_type.unwrap_or_else(|| "shell".to_owned()),
            adapter_state: json!({}),
            runtime_status: RuntimeStatus::Running,
            runtime_status_model: Some(StatusModel::idle()),
            runtime_live: true,
        };
        let payload = serde_json::to_value(&conversation)
            .map_err(|e| CommandError::internal(format!("serialize conversation: {e}")))?;
        ctx.emit(
            &conn.scope,
            ObservedEvent::ConversationCreated {
                ts: Utc::now(),
                conversation: payload,
            },
        )?;
    }
    emit_session_status(
        ctx,
        conn,
        &params.session_id,
        SessionStatusPayload {
            runtime_status: RuntimeStatus::Running,
            status_model: Some(StatusModel::idle()),
            live: true,
            controller: None,
        },
    )?;

    spawn_status_pump(Arc::clone(ctx), conn.scope.clone(), session.clone());

    Ok(json!({"session": session.view()}))
}

fn emit_session_status(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    session_id: &str,
    payload: SessionStatusPayload,
) -> Result<u64, CommandError> {
    let status = serde_json::to_value(&payload)
        .map_err(|e| CommandError::internal(format!("serialize status: {e}")))?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::SessionStatus {
            ts: Utc::now(),
            conversation_id: session_id.to_owned(),
            status,
        },
    )
}

/// Per-session pump translating supervisor events into observed
/// `session-status` events and `pty.exit` frames.
pub(crate) fn spawn_status_pump(
    ctx: Arc<ServerCtx>,
    scope: harness_core::Scope,
    session: PtySession,
) {
    let mut rx = session.watch();
    let session_id = session.id().as_str().to_owned();
    tokio::spawn(async move {
        let mut last_status = RuntimeStatus::Running;
        loop {
            match rx.recv().await {
                Ok(PtyEvent::Status {
                    status,
                    status_model,
                    live,
                    controller,
                    ..
                }) => {
                    if ctx.notifications_enabled()
                        && status == RuntimeStatus::NeedsInput
                        && last_status != RuntimeStatus::NeedsInput
                    {
                        let reason = status_model
                            .attention_reason
                            .clone()
                            .unwrap_or_else(|| "waiting for input".to_owned());
                        ctx.notifier
                            .notify(&format!("session {session_id}"), &reason)
                            .await;
                    }
                    last_status = status;

                    let payload = SessionStatusPayload {
                        runtime_status: status,
                        status_model: Some(status_model),
                        live,
                        controller,
                    };
                    let event = match serde_json::to_value(&payload) {
                        Ok(status) => ObservedEvent::SessionStatus {
                            ts: Utc::now(),
                            conversation_id: session_id.clone(),
                            status,
                        },
                        Err(e) => {
                            warn!(error = %e, "serialize session status");
                            continue;
                        }
                    };
                    if let Err(e) = ctx.emit(&scope, event) {
                        warn!(session_id, error = %e, "emit session status failed");
                    }
                }
                Ok(PtyEvent::Exit { exit, .. }) => {
                    ctx.hub
                        .publish_pty_exit(&scope, &session_id, exit.code, exit.signal);
                    break;
                }
                Ok(PtyEvent::Output { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(session_id, lagged = n, "status pump lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!(session_id, "status pump finished");
    });
}

pub(crate) fn handle_attach(
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    session_id: &str,
    since_cursor: u64,
) -> Result<Value, CommandError> {
    let session = lookup(ctx, conn, session_id)?;

    // One attach per session per connection; a re-attach replaces it
    if let Some(task) = conn.attach_tasks.remove(session_id) {
        task.abort();
        session.detach();
    }

    let (replay, mut rx) = session.attach(since_cursor);

    let event_tx = conn.event_tx.clone();
    let disconnect = conn.disconnect.clone();
    let forward_id = session_id.to_owned();
    let task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PtyEvent::Output { cursor, bytes, .. }) => {
                    let frame = EventFrame::PtyOutput {
                        session_id: forward_id.clone(),
                        cursor,
                        bytes: b64(&bytes),
                    };
                    if event_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(PtyEvent::Exit { exit, .. }) => {
                    let frame = EventFrame::PtyExit {
                        session_id: forward_id.clone(),
                        code: exit.code,
                        signal: exit.signal,
                    };
                    let _ = event_tx.send(frame).await;
                    break;
                }
                Ok(PtyEvent::Status { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    // Slow readers are disconnected, not waited for
                    warn!(session_id = forward_id, lagged = n, "attach reader too slow");
                    disconnect.cancel();
                    break;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    conn.attach_tasks.insert(session_id.to_owned(), task);

    Ok(json!({
        "replay": b64(&replay.bytes),
        "fromCursor": replay.from_cursor,
        "latestCursor": replay.latest_cursor,
        "truncated": replay.truncated,
        "earliestCursor": replay.from_cursor,
    }))
}

pub(crate) fn handle_detach(
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    session_id: &str,
) -> Result<Value, CommandError> {
    let session = lookup(ctx, conn, session_id)?;
    match conn.attach_tasks.remove(session_id) {
        Some(task) => {
            task.abort();
            session.detach();
            Ok(json!({"detached": true}))
        }
        None => Err(CommandError::bad_request("not attached to this session")),
    }
}

pub(crate) fn handle_subscribe_events(
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    session_id: &str,
) -> Result<Value, CommandError> {
    let session = lookup(ctx, conn, session_id)?;
    if conn.event_subs.contains_key(session_id) {
        return Err(CommandError::conflict(
            "already subscribed to this session's events",
        ));
    }

    // Count the subscriber on the session; drop the receiver — delivery
    // goes through the hub so cursors stay globally ordered
    drop(session.subscribe_events());
    let subscription_id = conn.next_subscription_id("pty-events");
    let sub = ctx.hub.subscribe_session(
        conn.scope.clone(),
        subscription_id.clone(),
        session_id.to_owned(),
        conn.event_tx.clone(),
        conn.disconnect.clone(),
    );
    conn.event_subs.insert(session_id.to_owned(), sub);

    Ok(json!({"subscriptionId": subscription_id}))
}

pub(crate) fn handle_unsubscribe_events(
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    session_id: &str,
) -> Result<Value, CommandError> {
    let session = lookup(ctx, conn, session_id)?;
    match conn.event_subs.remove(session_id) {
        Some(sub) => {
            ctx.hub.unsubscribe(sub);
            session.unsubscribe_events();
            Ok(json!({"unsubscribed": true}))
        }
        None => Err(CommandError::bad_request(
            "not subscribed to this session's events",
        )),
    }
}

pub(crate) async fn handle_close(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    session_id: &str,
) -> Result<Value, CommandError> {
    lookup(ctx, conn, session_id)?;
    let exit = ctx
        .supervisor
        .close(session_id)
        .await
        .map_err(|e| CommandError::new(e.kind(), e.to_string()))?;

    Ok(json!({"code": exit.code, "signal": exit.signal}))
}

pub(crate) fn handle_resize(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    session_id: &str,
    cols: u16,
    rows: u16,
) -> Result<Value, CommandError> {
    if cols == 0 || rows == 0 {
        return Err(CommandError::bad_request("cols and rows must be positive"));
    }
    let session = lookup(ctx, conn, session_id)?;
    session.resize(cols, rows);
    Ok(json!({"resized": true}))
}

pub(crate) async fn handle_respond(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    session_id: &str,
    text: &str,
) -> Result<Value, CommandError> {
    let session = lookup(ctx, conn, session_id)?;

    // The caller is whatever controller this connection claimed
    let controller = session
        .controller()
        .ok_or_else(|| CommandError::controller_held("session has no controller"))?;
    if !conn.claimed.contains(controller.controller_id.as_str()) {
        return Err(CommandError::controller_held(format!(
            "controller held by {}",
            controller.controller_id,
        )));
    }

    let result = session
        .respond(&controller.controller_id, text)
        .map_err(|e| CommandError::new(e.kind(), e.to_string()))?;

    Ok(json!({
        "responded": result.responded,
        "sentBytes": result.sent_bytes,
    }))
}

pub(crate) fn handle_interrupt(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    session_id: &str,
) -> Result<Value, CommandError> {
    let session = lookup(ctx, conn, session_id)?;
    session
        .interrupt()
        .map_err(|e| CommandError::new(e.kind(), e.to_string()))?;
    Ok(json!({"interrupted": true}))
}

pub(crate) fn handle_claim(
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    session_id: &str,
    controller_id: &str,
    controller_type: &str,
    controller_label: Option<String>,
    takeover: bool,
) -> Result<Value, CommandError> {
    if controller_id.is_empty() {
        return Err(CommandError::bad_request("controllerId must be non-empty"));
    }
    let controller_type = ControllerType::parse(&Value::String(controller_type.to_owned()))
        .ok_or_else(|| {
            CommandError::bad_request(format!("unknown controller type: {controller_type}"))
        })?;

    let session = lookup(ctx, conn, session_id)?;
    let controller = Controller {
        controller_id: ControllerId::new(controller_id),
        controller_type,
        controller_label,
        claimed_at: Utc::now(),
    };

    session
        .claim(controller.clone(), takeover)
        .map_err(|e| CommandError::new(e.kind(), e.to_string()))?;
    conn.claimed.insert(controller_id.to_owned());

    Ok(json!({"claimed": true, "controller": controller}))
}

pub(crate) fn handle_release(
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    session_id: &str,
    controller_id: &str,
) -> Result<Value, CommandError> {
    let session = lookup(ctx, conn, session_id)?;
    let released = session.release(&ControllerId::new(controller_id));
    conn.claimed.remove(controller_id);
    Ok(json!({"released": released}))
}

pub(crate) async fn handle_remove(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    session_id: &str,
) -> Result<Value, CommandError> {
    lookup(ctx, conn, session_id)?;
    ctx.supervisor
        .remove(session_id)
        .await
        .map_err(|e| CommandError::new(e.kind(), e.to_string()))?;
    Ok(json!({"removed": true}))
}

pub(crate) fn handle_list(ctx: &Arc<ServerCtx>, conn: &ConnState) -> Result<Value, CommandError> {
    Ok(json!({"sessions": ctx.supervisor.list(&conn.scope)}))
}

pub(crate) fn handle_status(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    session_id: &str,
) -> Result<Value, CommandError> {
    let session = lookup(ctx, conn, session_id)?;
    Ok(json!({"session": session.view()}))
}
