// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Each connection runs in its own task: first frame must be an
//! authenticated `hello`, then commands are processed strictly in
//! request order while a writer task interleaves replies with pushed
//! event frames. Disconnect releases everything the connection held —
//! controller claims, attach counts, event subscriptions.

mod conversations;
mod directories;
mod repositories;
mod sessions;
mod tasks;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use harness_core::{CommandError, ControllerId, ErrorKind, Scope};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hub::SubId;
use crate::protocol::{Command, CommandFrame, EventFrame, Reply, ServerFrame};
use crate::protocol_wire::{self, ProtocolError, DEFAULT_TIMEOUT, PROTOCOL_VERSION};
use crate::server::ServerCtx;

/// Errors from connection handling.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Authentication failed")]
    AuthFailed,
}

/// Per-connection resources, torn down on disconnect.
pub(crate) struct ConnState {
    pub scope: Scope,
    /// Distinct id used to label this connection's subscriptions.
    pub conn_id: u64,
    /// Event frames pushed to this connection (hub + forwarders).
    pub event_tx: mpsc::Sender<EventFrame>,
    /// Cancelled on backpressure or socket teardown.
    pub disconnect: CancellationToken,
    /// Hub registrations to drop on disconnect.
    pub subs: Vec<SubId>,
    /// session id → output forwarder task.
    pub attach_tasks: HashMap<String, JoinHandle<()>>,
    /// session id → hub registration for pty event subscriptions.
    pub event_subs: HashMap<String, SubId>,
    /// Controller ids claimed through this connection.
    pub claimed: HashSet<String>,
    next_subscription: u64,
}

impl ConnState {
    pub fn next_subscription_id(&mut self, prefix: &str) -> String {
        self.next_subscription += 1;
        format!("{prefix}-{}-{}", self.conn_id, self.next_subscription)
    }
}

/// Run the accept loop until the gateway shuts down.
pub async fn run(listener: TcpListener, ctx: Arc<ServerCtx>) {
    let mut conn_counter: u64 = 0;
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                conn_counter += 1;
                let conn_id = conn_counter;
                let ctx = Arc::clone(&ctx);
                debug!(%peer, conn_id, "connection accepted");
                tokio::spawn(async move {
                    match handle_connection(stream, conn_id, &ctx).await {
                        Ok(()) | Err(ConnectionError::Protocol(ProtocolError::ConnectionClosed)) => {
                            debug!(conn_id, "client disconnected")
                        }
                        Err(ConnectionError::Protocol(ProtocolError::Timeout)) => {
                            warn!(conn_id, "connection timeout")
                        }
                        Err(ConnectionError::AuthFailed) => {
                            warn!(conn_id, "authentication failed")
                        }
                        Err(e) => error!(conn_id, "connection error: {e}"),
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {e}");
            }
        }
    }
}

/// Handle one client connection end to end.
async fn handle_connection(
    stream: TcpStream,
    conn_id: u64,
    ctx: &Arc<ServerCtx>,
) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    // First frame must be hello, within the handshake timeout
    let hello: CommandFrame = protocol_wire::read_typed(&mut reader, DEFAULT_TIMEOUT).await?;
    let scope = match hello.command {
        Command::Hello {
            auth_token,
            tenant_id,
            user_id,
            workspace_id,
        } => {
            if auth_token != ctx.auth_token {
                let reply = Reply::err(
                    hello.request_id,
                    CommandError::new(ErrorKind::AuthFailed, "invalid auth token"),
                );
                let _ = protocol_wire::write_typed(
                    &mut writer,
                    &ServerFrame::Reply(reply),
                    DEFAULT_TIMEOUT,
                )
                .await;
                return Err(ConnectionError::AuthFailed);
            }
            Scope::new(tenant_id, user_id, workspace_id)
        }
        _ => {
            let reply = Reply::err(
                hello.request_id,
                CommandError::bad_request("first frame must be hello"),
            );
            let _ = protocol_wire::write_typed(
                &mut writer,
                &ServerFrame::Reply(reply),
                DEFAULT_TIMEOUT,
            )
            .await;
            return Ok(());
        }
    };

    info!(conn_id, scope = %scope, "client authenticated");

    // Outbound plumbing: replies and event frames merge onto the socket
    let (reply_tx, mut reply_rx) = mpsc::channel::<Reply>(64);
    let (event_tx, mut event_rx) = mpsc::channel::<EventFrame>(256);
    let disconnect = CancellationToken::new();

    let writer_disconnect = disconnect.clone();
    let writer_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                reply = reply_rx.recv() => reply.map(ServerFrame::Reply),
                event = event_rx.recv() => event.map(ServerFrame::Event),
                _ = writer_disconnect.cancelled() => None,
            };
            let Some(frame) = frame else { break };
            if protocol_wire::write_typed(&mut writer, &frame, DEFAULT_TIMEOUT)
                .await
                .is_err()
            {
                writer_disconnect.cancel();
                break;
            }
        }
    });

    let hello_reply = Reply::ok(
        hello.request_id,
        json!({
            "gatewayStartedAt": ctx.started_at.to_rfc3339(),
            "version": PROTOCOL_VERSION,
        }),
    );
    let _ = reply_tx.send(hello_reply).await;

    let mut conn = ConnState {
        scope,
        conn_id,
        event_tx,
        disconnect: disconnect.clone(),
        subs: Vec::new(),
        attach_tasks: HashMap::new(),
        event_subs: HashMap::new(),
        claimed: HashSet::new(),
        next_subscription: 0,
    };

    // Commands on a single connection are processed in request order
    let result = connection_loop(&mut reader, ctx, &mut conn, &reply_tx, &disconnect).await;

    cleanup(ctx, &mut conn).await;
    disconnect.cancel();
    writer_task.abort();

    result
}

async fn connection_loop(
    reader: &mut OwnedReadHalf,
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    reply_tx: &mpsc::Sender<Reply>,
    disconnect: &CancellationToken,
) -> Result<(), ConnectionError> {
    loop {
        let bytes = tokio::select! {
            bytes = protocol_wire::read_frame(reader) => bytes?,
            _ = disconnect.cancelled() => return Ok(()),
        };

        let frame: CommandFrame = match protocol_wire::decode(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                // Without a request id there is nothing to reply to;
                // malformed framing ends the connection
                warn!(error = %e, "malformed command frame");
                return Ok(());
            }
        };

        let request_id = frame.request_id;
        let reply = match dispatch(ctx, conn, frame.command).await {
            Ok(result) => Reply::ok(request_id, result),
            Err(error) => Reply::err(request_id, error),
        };

        if reply_tx.send(reply).await.is_err() {
            return Ok(());
        }
    }
}

/// Dispatch one typed command.
async fn dispatch(
    ctx: &Arc<ServerCtx>,
    conn: &mut ConnState,
    command: Command,
) -> Result<Value, CommandError> {
    match command {
        Command::Hello { .. } => Err(CommandError::bad_request(
            "hello is only valid as the first frame",
        )),

        Command::Subscribe { since_cursor } => {
            // Register and replay under the write lock so no event can
            // slip between the replayed prefix and the live stream
            let _guard = ctx.write_lock.lock().await;
            let subscription_id = conn.next_subscription_id("sub");

            let replay = match since_cursor {
                Some(cursor) => ctx
                    .log
                    .lock()
                    .entries_after(cursor)
                    .map_err(|e| {
                        CommandError::new(
                            ErrorKind::StorageError,
                            format!("event replay failed: {e}"),
                        )
                    })?
                    .into_iter()
                    .filter(|entry| entry.scope == conn.scope)
                    .collect(),
                None => Vec::new(),
            };

            let sub = ctx.hub.subscribe_workspace(
                conn.scope.clone(),
                subscription_id.clone(),
                conn.event_tx.clone(),
                conn.disconnect.clone(),
            );
            conn.subs.push(sub);

            for entry in replay {
                let frame = EventFrame::Observed {
                    subscription_id: subscription_id.clone(),
                    cursor: entry.cursor,
                    event: entry.event,
                };
                if conn.event_tx.send(frame).await.is_err() {
                    break;
                }
            }

            Ok(json!({
                "subscriptionId": subscription_id,
                "sinceCursor": since_cursor,
                "cursor": ctx.cursor(),
            }))
        }

        Command::GatewayStatus => Ok(json!({
            "running": true,
            "pid": std::process::id(),
            "startedAt": ctx.started_at.to_rfc3339(),
            "uptimeSeconds": (chrono::Utc::now() - ctx.started_at).num_seconds(),
            "version": PROTOCOL_VERSION,
        })),

        Command::GatewayStop { force } => {
            info!(force, "shutdown requested via command");
            ctx.shutdown.notify_one();
            Ok(json!({"stopping": true}))
        }

        // -- pty / session --
        Command::PtyStart {
            session_id,
            args,
            env,
            cwd,
            cols,
            rows,
            worktree_id,
            fg,
            bg,
            directory_id,
            agent_type,
        } => {
            sessions::handle_start(
                ctx,
                conn,
                sessions::StartParams {
                    session_id,
                    args,
                    env,
                    cwd,
                    cols,
                    rows,
                    worktree_id,
                    fg,
                    bg,
                    directory_id,
                    agent_type,
                },
            )
            .await
        }

        Command::PtyAttach {
            session_id,
            since_cursor,
        } => sessions::handle_attach(ctx, conn, &session_id, since_cursor),

        Command::PtyDetach { session_id } => sessions::handle_detach(ctx, conn, &session_id),

        Command::PtySubscribeEvents { session_id } => {
            sessions::handle_subscribe_events(ctx, conn, &session_id)
        }

        Command::PtyUnsubscribeEvents { session_id } => {
            sessions::handle_unsubscribe_events(ctx, conn, &session_id)
        }

        Command::PtyClose { session_id } => sessions::handle_close(ctx, conn, &session_id).await,

        Command::PtyResize {
            session_id,
            cols,
            rows,
        } => sessions::handle_resize(ctx, conn, &session_id, cols, rows),

        Command::SessionRespond { session_id, text } => {
            sessions::handle_respond(ctx, conn, &session_id, &text).await
        }

        Command::SessionInterrupt { session_id } => {
            sessions::handle_interrupt(ctx, conn, &session_id)
        }

        Command::SessionClaim {
            session_id,
            controller_id,
            controller_type,
            controller_label,
            takeover,
        } => sessions::handle_claim(
            ctx,
            conn,
            &session_id,
            &controller_id,
            &controller_type,
            controller_label,
            takeover,
        ),

        Command::SessionRelease {
            session_id,
            controller_id,
        } => sessions::handle_release(ctx, conn, &session_id, &controller_id),

        Command::SessionRemove { session_id } => {
            sessions::handle_remove(ctx, conn, &session_id).await
        }

        Command::SessionList => sessions::handle_list(ctx, conn),

        Command::SessionStatus { session_id } => sessions::handle_status(ctx, conn, &session_id),

        // -- repository --
        Command::RepositoryList => repositories::handle_list(ctx, conn),
        Command::RepositoryUpsert { repository } => {
            let _guard = ctx.write_lock.lock().await;
            repositories::handle_upsert(ctx, conn, repository)
        }
        Command::RepositoryUpdate {
            repository_id,
            patch,
        } => {
            let _guard = ctx.write_lock.lock().await;
            repositories::handle_update(ctx, conn, &repository_id, patch)
        }
        Command::RepositoryArchive { repository_id } => {
            let _guard = ctx.write_lock.lock().await;
            repositories::handle_archive(ctx, conn, &repository_id)
        }

        // -- directory --
        Command::DirectoryUpsert { directory } => {
            let _guard = ctx.write_lock.lock().await;
            directories::handle_upsert(ctx, conn, directory)
        }
        Command::DirectoryList => directories::handle_list(ctx, conn),
        Command::DirectoryArchive { directory_id } => {
            let _guard = ctx.write_lock.lock().await;
            directories::handle_archive(ctx, conn, &directory_id)
        }
        Command::DirectoryGitStatus { directory_id } => {
            directories::handle_git_status(ctx, conn, &directory_id)
        }

        // -- conversation --
        Command::ConversationCreate {
            conversation_id,
            directory_id,
            title,
            agent_type,
            adapter_state,
        } => {
            let _guard = ctx.write_lock.lock().await;
            conversations::handle_create(
                ctx,
                conn,
                &conversation_id,
                &directory_id,
                &title,
                &agent_type,
                adapter_state,
            )
        }
        Command::ConversationList => conversations::handle_list(ctx, conn),
        Command::ConversationUpdate {
            conversation_id,
            title,
            adapter_state,
        } => {
            let _guard = ctx.write_lock.lock().await;
            conversations::handle_update(ctx, conn, &conversation_id, title, adapter_state)
        }
        Command::ConversationTitleRefresh {
            conversation_id,
            force,
        } => conversations::handle_title_refresh(ctx, conn, &conversation_id, force),
        Command::ConversationArchive { conversation_id } => {
            conversations::handle_archive(ctx, conn, &conversation_id).await
        }

        // -- task --
        Command::TaskList => tasks::handle_list(ctx, conn),
        Command::TaskCreate {
            task_id,
            title,
            body,
            repository_id,
            project_id,
            branch_name,
            base_branch,
        } => {
            let _guard = ctx.write_lock.lock().await;
            tasks::handle_create(
                ctx,
                conn,
                tasks::CreateParams {
                    task_id,
                    title,
                    body,
                    repository_id,
                    project_id,
                    branch_name,
                    base_branch,
                },
            )
        }
        Command::TaskUpdate {
            task_id,
            title,
            body,
            status,
            branch_name,
            base_branch,
            claimed_by,
        } => {
            let _guard = ctx.write_lock.lock().await;
            tasks::handle_update(
                ctx,
                conn,
                &task_id,
                tasks::UpdateParams {
                    title,
                    body,
                    status,
                    branch_name,
                    base_branch,
                    claimed_by,
                },
            )
        }
        Command::TaskReady { task_id } => {
            let _guard = ctx.write_lock.lock().await;
            tasks::handle_transition(ctx, conn, &task_id, harness_core::TaskStatus::Ready)
        }
        Command::TaskDraft { task_id } => {
            let _guard = ctx.write_lock.lock().await;
            tasks::handle_transition(ctx, conn, &task_id, harness_core::TaskStatus::Draft)
        }
        Command::TaskComplete { task_id } => {
            let _guard = ctx.write_lock.lock().await;
            tasks::handle_transition(ctx, conn, &task_id, harness_core::TaskStatus::Completed)
        }
        Command::TaskReorder { task_ids } => {
            let _guard = ctx.write_lock.lock().await;
            tasks::handle_reorder(ctx, conn, &task_ids)
        }
        Command::TaskDelete { task_id } => {
            let _guard = ctx.write_lock.lock().await;
            tasks::handle_delete(ctx, conn, &task_id)
        }

        // -- diagnostics --
        Command::RenderTraceStart => Ok(json!({"enabled": true, "fresh": ctx.trace.start_trace()})),
        Command::RenderTraceStop => Ok(json!({"enabled": false, "wasOn": ctx.trace.stop_trace()})),
        Command::ProfileStart => Ok(json!({"enabled": true, "fresh": ctx.trace.start_profile()})),
        Command::ProfileStop => Ok(json!({"enabled": false, "wasOn": ctx.trace.stop_profile()})),
    }
}

/// Release everything the connection held.
async fn cleanup(ctx: &Arc<ServerCtx>, conn: &mut ConnState) {
    for sub in conn.subs.drain(..) {
        ctx.hub.unsubscribe(sub);
    }
    for (session_id, sub) in conn.event_subs.drain() {
        ctx.hub.unsubscribe(sub);
        if let Ok(session) = ctx.supervisor.get(&session_id) {
            session.unsubscribe_events();
        }
    }
    for (session_id, task) in conn.attach_tasks.drain() {
        task.abort();
        if let Ok(session) = ctx.supervisor.get(&session_id) {
            session.detach();
        }
    }
    for controller_id in conn.claimed.drain() {
        let released = ctx
            .supervisor
            .release_all(&ControllerId::new(controller_id.clone()));
        if !released.is_empty() {
            debug!(
                controller_id,
                sessions = released.len(),
                "released controllers on disconnect",
            );
        }
    }
}

/// Inject the connection scope into a record payload, rejecting records
/// that explicitly claim a different scope.
pub(crate) fn inject_scope(value: &mut Value, scope: &Scope) -> Result<(), CommandError> {
    let Some(map) = value.as_object_mut() else {
        return Err(CommandError::bad_request("record must be an object"));
    };

    for (key, expected) in [
        ("tenantId", &scope.tenant_id),
        ("userId", &scope.user_id),
        ("workspaceId", &scope.workspace_id),
    ] {
        match map.get(key) {
            None | Some(Value::Null) => {
                map.insert(key.to_owned(), Value::String(expected.clone()));
            }
            Some(Value::String(s)) if s == expected => {}
            Some(_) => {
                return Err(CommandError::bad_request(format!(
                    "record {key} does not match the connection scope",
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
