// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for `conversation.*` commands.

use std::sync::Arc;

use chrono::Utc;
use harness_core::{
    CommandError, Conversation, ConversationId, Directory, DirectoryId, ObservedEvent,
    RuntimeStatus,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::ConnState;
use crate::server::ServerCtx;
use crate::title::RefreshStatus;

/// Emit `directory-upserted` when the directory is missing from the
/// scope, so conversation creation is self-contained.
pub(crate) fn ensure_directory(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    directory_id: &str,
    path_hint: Option<&str>,
) -> Result<(), CommandError> {
    let exists = {
        let state = ctx.state.lock();
        state
            .directories
            .get(directory_id)
            .is_some_and(|d| d.scope == conn.scope)
    };
    if exists {
        return Ok(());
    }

    let directory = Directory {
        directory_id: DirectoryId::new(directory_id),
        scope: conn.scope.clone(),
        path: path_hint.unwrap_or(directory_id).to_owned(),
        created_at: Some(Utc::now()),
        archived_at: None,
    };
    let payload = serde_json::to_value(&directory)
        .map_err(|e| CommandError::internal(format!("serialize directory: {e}")))?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::DirectoryUpserted {
            ts: Utc::now(),
            directory: payload,
        },
    )?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_create(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    conversation_id: &str,
    directory_id: &str,
    title: &str,
    agent_type: &str,
    adapter_state: Value,
) -> Result<Value, CommandError> {
    if conversation_id.is_empty() || directory_id.is_empty() {
        return Err(CommandError::bad_request(
            "conversationId and directoryId must be non-empty",
        ));
    }
    let adapter_state = match adapter_state {
        Value::Null => json!({}),
        v @ Value::Object(_) => v,
        _ => return Err(CommandError::bad_request("adapterState must be an object")),
    };

    {
        let state = ctx.state.lock();
        if state.conversations.contains_key(conversation_id) {
            return Err(CommandError::conflict(format!(
                "conversation already exists: {conversation_id}",
            )));
        }
    }

    ensure_directory(ctx, conn, directory_id, None)?;

    let conversation = Conversation {
        conversation_id: ConversationId::new(conversation_id),
        directory_id: DirectoryId::new(directory_id),
        scope: conn.scope.clone(),
        title: title.to_owned(),
        agent_type: agent_type.to_owned(),
        adapter_state,
        runtime_status: RuntimeStatus::Exited,
        runtime_status_model: None,
        runtime_live: false,
    };
    let payload = serde_json::to_value(&conversation)
        .map_err(|e| CommandError::internal(format!("serialize conversation: {e}")))?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::ConversationCreated {
            ts: Utc::now(),
            conversation: payload.clone(),
        },
    )?;

    Ok(json!({"conversation": payload}))
}

pub(crate) fn handle_list(ctx: &Arc<ServerCtx>, conn: &ConnState) -> Result<Value, CommandError> {
    let state = ctx.state.lock();
    let mut conversations: Vec<&Conversation> = state.conversations_in(&conn.scope).collect();
    conversations.sort_by(|a, b| a.conversation_id.as_str().cmp(b.conversation_id.as_str()));

    Ok(json!({"conversations": conversations}))
}

fn lookup(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    conversation_id: &str,
) -> Result<Conversation, CommandError> {
    let state = ctx.state.lock();
    state
        .get_conversation(conversation_id)
        .filter(|c| c.scope == conn.scope)
        .cloned()
        .ok_or_else(|| CommandError::not_found(format!("unknown conversation: {conversation_id}")))
}

pub(crate) fn handle_update(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    conversation_id: &str,
    title: Option<String>,
    adapter_state: Option<Value>,
) -> Result<Value, CommandError> {
    let mut conversation = lookup(ctx, conn, conversation_id)?;

    if let Some(title) = title {
        conversation.title = title;
    }
    if let Some(adapter_state) = adapter_state {
        if !adapter_state.is_object() {
            return Err(CommandError::bad_request("adapterState must be an object"));
        }
        conversation.adapter_state = adapter_state;
    }

    let payload = serde_json::to_value(&conversation)
        .map_err(|e| CommandError::internal(format!("serialize conversation: {e}")))?;
    ctx.emit(
        &conn.scope,
        ObservedEvent::ConversationUpdated {
            ts: Utc::now(),
            conversation: payload.clone(),
        },
    )?;

    Ok(json!({"conversation": payload}))
}

/// Asynchronous title refresh: the reply reports what was scheduled;
/// the `conversation-updated` event follows separately if the derived
/// title differs.
pub(crate) fn handle_title_refresh(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    conversation_id: &str,
    force: bool,
) -> Result<Value, CommandError> {
    let conversation = lookup(ctx, conn, conversation_id)?;

    if !conversation.title.is_empty() && !force {
        return Ok(json!({
            "status": RefreshStatus::Skipped.as_str(),
            "reason": "conversation already has a title",
        }));
    }
    if !ctx.titles.has_source(&conversation) {
        return Ok(json!({
            "status": RefreshStatus::Unchanged.as_str(),
            "reason": "no derivable title source",
        }));
    }

    let ctx = Arc::clone(ctx);
    let scope = conn.scope.clone();
    tokio::spawn(async move {
        let Some(derived) = ctx.titles.derive(&conversation).await else {
            debug!(
                conversation_id = %conversation.conversation_id,
                "title derivation produced nothing",
            );
            return;
        };
        if derived == conversation.title {
            return;
        }

        // Re-read so a concurrent rename is not clobbered
        let current = {
            let state = ctx.state.lock();
            state
                .conversations
                .get(conversation.conversation_id.as_str())
                .cloned()
        };
        let Some(mut current) = current else { return };
        if current.title != conversation.title {
            return;
        }
        current.title = derived;

        let Ok(payload) = serde_json::to_value(&current) else {
            return;
        };
        if let Err(e) = ctx.emit(
            &scope,
            ObservedEvent::ConversationUpdated {
                ts: Utc::now(),
                conversation: payload,
            },
        ) {
            warn!(error = %e, "failed to emit derived title update");
        }
    });

    Ok(json!({"status": RefreshStatus::Updated.as_str()}))
}

pub(crate) async fn handle_archive(
    ctx: &Arc<ServerCtx>,
    conn: &ConnState,
    conversation_id: &str,
) -> Result<Value, CommandError> {
    let _guard = ctx.write_lock.lock().await;
    let conversation = lookup(ctx, conn, conversation_id)?;
    let id = conversation.conversation_id.as_str().to_owned();

    // A live session shares the conversation id; close it first
    if conversation.runtime_live {
        if let Ok(session) = ctx.supervisor.get(&id) {
            let _ = session
                .close(ctx.supervisor.config().close_grace)
                .await;
        }
    }

    ctx.emit(
        &conn.scope,
        ObservedEvent::ConversationArchived {
            ts: Utc::now(),
            conversation_id: id.clone(),
        },
    )?;

    Ok(json!({"archived": true, "conversationId": id}))
}
