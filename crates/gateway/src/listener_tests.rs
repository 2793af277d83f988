// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hub::SubscriptionHub;
use crate::notify::NoOpNotifier;
use crate::server::ServerCtx;
use crate::title::HeuristicTitleProvider;
use crate::trace::TraceState;
use base64::Engine;
use chrono::Utc;
use harness_core::{ObservedEvent, Scope, SessionId};
use harness_pty::{FakeBackend, PtyConfig, SessionSupervisor, StartSpec};
use harness_storage::{EventLog, PersistedState};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

fn test_ctx(dir: &std::path::Path) -> Arc<ServerCtx> {
    let log = EventLog::open(&dir.join("events.log")).unwrap();
    Arc::new(ServerCtx {
        state: Arc::new(Mutex::new(PersistedState::default())),
        log: Arc::new(Mutex::new(log)),
        supervisor: Arc::new(SessionSupervisor::new(PtyConfig::default())),
        hub: Arc::new(SubscriptionHub::new()),
        notifier: Arc::new(NoOpNotifier),
        titles: Arc::new(HeuristicTitleProvider),
        trace: Arc::new(TraceState::new(dir.join("trace.jsonl"))),
        auth_token: "test-token".into(),
        started_at: Utc::now(),
        shutdown: Arc::new(Notify::new()),
        notifications_enabled: AtomicBool::new(false),
        write_lock: tokio::sync::Mutex::new(()),
    })
}

fn test_conn_in(scope: Scope, conn_id: u64) -> (ConnState, mpsc::Receiver<EventFrame>) {
    let (event_tx, event_rx) = mpsc::channel(64);
    (
        ConnState {
            scope,
            conn_id,
            event_tx,
            disconnect: CancellationToken::new(),
            subs: Vec::new(),
            attach_tasks: HashMap::new(),
            event_subs: HashMap::new(),
            claimed: HashSet::new(),
            next_subscription: 0,
        },
        event_rx,
    )
}

fn test_conn() -> (ConnState, mpsc::Receiver<EventFrame>) {
    test_conn_in(Scope::new("t1", "u1", "w1"), 1)
}

async fn next_observed(rx: &mut mpsc::Receiver<EventFrame>) -> (u64, ObservedEvent) {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event frame")
            .expect("event channel closed");
        if let EventFrame::Observed { cursor, event, .. } = frame {
            return (cursor, event);
        }
    }
}

fn start_fake_session(ctx: &Arc<ServerCtx>, id: &str) -> harness_pty::FakeBackendHandle {
    let (backend, handle) = FakeBackend::new();
    ctx.supervisor
        .start_with_backend(
            StartSpec {
                session_id: SessionId::new(id),
                scope: Scope::new("t1", "u1", "w1"),
                argv: vec!["fake".into()],
                env: vec![],
                cwd: None,
                cols: 80,
                rows: 24,
                worktree_id: None,
                fg: None,
                bg: None,
            },
            backend,
        )
        .unwrap();
    handle
}

// ── Create & rename conversation ─────────────────────────────────────────

#[tokio::test]
async fn create_then_rename_conversation_emits_ordered_events() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, mut rx) = test_conn();

    dispatch(&ctx, &mut conn, Command::Subscribe { since_cursor: None })
        .await
        .unwrap();

    let result = dispatch(
        &ctx,
        &mut conn,
        Command::ConversationCreate {
            conversation_id: "c1".into(),
            directory_id: "d1".into(),
            title: String::new(),
            agent_type: "codex".into(),
            adapter_state: json!({}),
        },
    )
    .await
    .unwrap();
    assert_eq!(result["conversation"]["conversationId"], "c1");

    // directory-upserted (directory was missing), then conversation-created
    let (c1, e1) = next_observed(&mut rx).await;
    assert_eq!(e1.kind(), "directory-upserted");
    let (c2, e2) = next_observed(&mut rx).await;
    assert_eq!(e2.kind(), "conversation-created");
    assert!(c2 > c1);

    dispatch(
        &ctx,
        &mut conn,
        Command::ConversationUpdate {
            conversation_id: "c1".into(),
            title: Some("Alpha".into()),
            adapter_state: None,
        },
    )
    .await
    .unwrap();

    let (c3, e3) = next_observed(&mut rx).await;
    assert_eq!(e3.kind(), "conversation-updated");
    assert!(c3 > c2);
    let ObservedEvent::ConversationUpdated { conversation, .. } = e3 else {
        unreachable!()
    };
    assert_eq!(conversation["title"], "Alpha");
}

#[tokio::test]
async fn duplicate_conversation_id_is_a_conflict() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();

    let create = Command::ConversationCreate {
        conversation_id: "c1".into(),
        directory_id: "d1".into(),
        title: String::new(),
        agent_type: "codex".into(),
        adapter_state: json!({}),
    };
    dispatch(&ctx, &mut conn, create.clone()).await.unwrap();
    let err = dispatch(&ctx, &mut conn, create).await.unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::Conflict);
}

// ── Task reorder ─────────────────────────────────────────────────────────

#[tokio::test]
async fn reorder_replaces_the_sequence_atomically() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, mut rx) = test_conn();

    for id in ["t1", "t2", "t3"] {
        dispatch(
            &ctx,
            &mut conn,
            Command::TaskCreate {
                task_id: Some(id.into()),
                title: format!("task {id}"),
                body: String::new(),
                repository_id: None,
                project_id: None,
                branch_name: None,
                base_branch: None,
            },
        )
        .await
        .unwrap();
    }

    dispatch(&ctx, &mut conn, Command::Subscribe { since_cursor: None })
        .await
        .unwrap();

    dispatch(
        &ctx,
        &mut conn,
        Command::TaskReorder {
            task_ids: vec!["t3".into(), "t1".into(), "t2".into()],
        },
    )
    .await
    .unwrap();

    // A single bulk event carries the new order
    let (_, event) = next_observed(&mut rx).await;
    let ObservedEvent::TaskReordered { tasks, .. } = event else {
        panic!("expected task-reordered, got {}", event.kind());
    };
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0]["taskId"], "t3");
    assert_eq!(tasks[0]["orderIndex"], 0);
    assert_eq!(tasks[1]["taskId"], "t1");
    assert_eq!(tasks[2]["taskId"], "t2");

    let listing = dispatch(&ctx, &mut conn, Command::TaskList).await.unwrap();
    let ids: Vec<&str> = listing["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["taskId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["t3", "t1", "t2"]);
}

#[tokio::test]
async fn partial_reorder_is_rejected() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();

    for id in ["t1", "t2"] {
        dispatch(
            &ctx,
            &mut conn,
            Command::TaskCreate {
                task_id: Some(id.into()),
                title: id.into(),
                body: String::new(),
                repository_id: None,
                project_id: None,
                branch_name: None,
                base_branch: None,
            },
        )
        .await
        .unwrap();
    }

    let err = dispatch(
        &ctx,
        &mut conn,
        Command::TaskReorder {
            task_ids: vec!["t1".into()],
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::BadRequest);
}

// ── Task status transitions ──────────────────────────────────────────────────

#[tokio::test]
async fn task_lifecycle_walks_the_status_machine() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();

    dispatch(
        &ctx,
        &mut conn,
        Command::TaskCreate {
            task_id: Some("t1".into()),
            title: "build".into(),
            body: String::new(),
            repository_id: None,
            project_id: None,
            branch_name: None,
            base_branch: None,
        },
    )
    .await
    .unwrap();

    // draft → completed skips states: rejected
    let err = dispatch(
        &ctx,
        &mut conn,
        Command::TaskComplete {
            task_id: "t1".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::Conflict);

    dispatch(&ctx, &mut conn, Command::TaskReady { task_id: "t1".into() })
        .await
        .unwrap();
    // ready → in-progress via update
    dispatch(
        &ctx,
        &mut conn,
        Command::TaskUpdate {
            task_id: "t1".into(),
            title: None,
            body: None,
            status: Some("in-progress".into()),
            branch_name: None,
            base_branch: None,
            claimed_by: Some(vec!["agent-7".into()]),
        },
    )
    .await
    .unwrap();
    let result = dispatch(
        &ctx,
        &mut conn,
        Command::TaskComplete {
            task_id: "t1".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(result["task"]["status"], "completed");
    assert!(result["task"]["completedAt"].is_string());
}

// ── Controller conflict ──────────────────────────────────────────────────

#[tokio::test]
async fn claim_conflict_and_takeover() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, mut rx) = test_conn();
    let _handle = start_fake_session(&ctx, "sid");
    sessions::spawn_status_pump(
        Arc::clone(&ctx),
        conn.scope.clone(),
        ctx.supervisor.get("sid").unwrap(),
    );

    dispatch(&ctx, &mut conn, Command::Subscribe { since_cursor: None })
        .await
        .unwrap();

    dispatch(
        &ctx,
        &mut conn,
        Command::SessionClaim {
            session_id: "sid".into(),
            controller_id: "A".into(),
            controller_type: "human".into(),
            controller_label: None,
            takeover: false,
        },
    )
    .await
    .unwrap();

    let err = dispatch(
        &ctx,
        &mut conn,
        Command::SessionClaim {
            session_id: "sid".into(),
            controller_id: "B".into(),
            controller_type: "agent".into(),
            controller_label: None,
            takeover: false,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::ControllerHeld);

    dispatch(
        &ctx,
        &mut conn,
        Command::SessionClaim {
            session_id: "sid".into(),
            controller_id: "B".into(),
            controller_type: "agent".into(),
            controller_label: None,
            takeover: true,
        },
    )
    .await
    .unwrap();

    // The takeover produces a session-status event naming B
    loop {
        let (_, event) = next_observed(&mut rx).await;
        if let ObservedEvent::SessionStatus { status, .. } = event {
            if status["controller"]["controllerId"] == "B" {
                break;
            }
        }
    }
}

// ── respond / attach ─────────────────────────────────────────────────────────

#[tokio::test]
async fn respond_requires_a_claim_on_this_connection() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn_a, _rx_a) = test_conn();
    let (mut conn_b, _rx_b) = test_conn_in(Scope::new("t1", "u1", "w1"), 2);
    let _handle = start_fake_session(&ctx, "sid");

    // No controller at all
    let err = dispatch(
        &ctx,
        &mut conn_a,
        Command::SessionRespond {
            session_id: "sid".into(),
            text: "hi\n".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::ControllerHeld);

    dispatch(
        &ctx,
        &mut conn_a,
        Command::SessionClaim {
            session_id: "sid".into(),
            controller_id: "A".into(),
            controller_type: "human".into(),
            controller_label: None,
            takeover: false,
        },
    )
    .await
    .unwrap();

    let result = dispatch(
        &ctx,
        &mut conn_a,
        Command::SessionRespond {
            session_id: "sid".into(),
            text: "hi\n".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(result["responded"], true);
    assert_eq!(result["sentBytes"], 3);

    // Another connection without the claim is rejected
    let err = dispatch(
        &ctx,
        &mut conn_b,
        Command::SessionRespond {
            session_id: "sid".into(),
            text: "hijack\n".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::ControllerHeld);
}

#[tokio::test]
async fn attach_replays_then_streams() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, mut rx) = test_conn();
    let handle = start_fake_session(&ctx, "sid");

    // Produce output before attaching
    handle.emit(b"early ").await;
    // Wait until the ring has the bytes
    let session = ctx.supervisor.get("sid").unwrap();
    for _ in 0..100 {
        if session.latest_cursor() == 6 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let result = dispatch(
        &ctx,
        &mut conn,
        Command::PtyAttach {
            session_id: "sid".into(),
            since_cursor: 0,
        },
    )
    .await
    .unwrap();
    let replay = base64::engine::general_purpose::STANDARD
        .decode(result["replay"].as_str().unwrap())
        .unwrap();
    assert_eq!(replay, b"early ");
    assert_eq!(result["truncated"], false);

    handle.emit(b"late").await;
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if let EventFrame::PtyOutput { bytes, cursor, .. } = frame {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(bytes)
                .unwrap();
            assert_eq!(decoded, b"late");
            assert_eq!(cursor, 10);
            break;
        }
    }

    let result = dispatch(
        &ctx,
        &mut conn,
        Command::PtyDetach {
            session_id: "sid".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(result["detached"], true);
}

#[tokio::test]
async fn event_subscription_counts_and_conflicts() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();
    let _handle = start_fake_session(&ctx, "sid");

    dispatch(
        &ctx,
        &mut conn,
        Command::PtySubscribeEvents {
            session_id: "sid".into(),
        },
    )
    .await
    .unwrap();

    let view = ctx.supervisor.get("sid").unwrap().view();
    assert_eq!(view.event_subscribers, 1);

    let err = dispatch(
        &ctx,
        &mut conn,
        Command::PtySubscribeEvents {
            session_id: "sid".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::Conflict);

    dispatch(
        &ctx,
        &mut conn,
        Command::PtyUnsubscribeEvents {
            session_id: "sid".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(ctx.supervisor.get("sid").unwrap().view().event_subscribers, 0);
}

// ── Scope isolation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn cross_scope_reads_and_writes_are_rejected() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn_a, _rx_a) = test_conn();
    let (mut conn_b, _rx_b) = test_conn_in(Scope::new("t2", "u2", "w2"), 2);

    dispatch(
        &ctx,
        &mut conn_a,
        Command::DirectoryUpsert {
            directory: json!({"directoryId": "d1", "path": "/p"}),
        },
    )
    .await
    .unwrap();

    // Another workspace sees nothing
    let listing = dispatch(&ctx, &mut conn_b, Command::DirectoryList)
        .await
        .unwrap();
    assert_eq!(listing["directories"].as_array().unwrap().len(), 0);

    // ... and cannot archive across the boundary
    let err = dispatch(
        &ctx,
        &mut conn_b,
        Command::DirectoryArchive {
            directory_id: "d1".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::NotFound);

    // A record claiming a foreign scope is a bad request
    let err = dispatch(
        &ctx,
        &mut conn_b,
        Command::DirectoryUpsert {
            directory: json!({"directoryId": "d2", "path": "/q", "tenantId": "t1"}),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::BadRequest);
}

// ── Archive cascade through the command surface ──────────────────────────────

#[tokio::test]
async fn directory_archive_reports_removed_conversations() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();

    for id in ["c1", "c2"] {
        dispatch(
            &ctx,
            &mut conn,
            Command::ConversationCreate {
                conversation_id: id.into(),
                directory_id: "d1".into(),
                title: String::new(),
                agent_type: "codex".into(),
                adapter_state: json!({}),
            },
        )
        .await
        .unwrap();
    }

    let result = dispatch(
        &ctx,
        &mut conn,
        Command::DirectoryArchive {
            directory_id: "d1".into(),
        },
    )
    .await
    .unwrap();
    let mut removed: Vec<&str> = result["removedConversationIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    removed.sort_unstable();
    assert_eq!(removed, vec!["c1", "c2"]);

    let listing = dispatch(&ctx, &mut conn, Command::ConversationList)
        .await
        .unwrap();
    assert_eq!(listing["conversations"].as_array().unwrap().len(), 0);
}

// ── Title refresh ────────────────────────────────────────────────────────────

#[tokio::test]
async fn title_refresh_reports_and_schedules() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, mut rx) = test_conn();

    dispatch(
        &ctx,
        &mut conn,
        Command::ConversationCreate {
            conversation_id: "c1".into(),
            directory_id: "d1".into(),
            title: "Named".into(),
            agent_type: "codex".into(),
            adapter_state: json!({"initialPrompt": "rewrite the ring buffer"}),
        },
    )
    .await
    .unwrap();

    // Existing title, no force: skipped
    let result = dispatch(
        &ctx,
        &mut conn,
        Command::ConversationTitleRefresh {
            conversation_id: "c1".into(),
            force: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(result["status"], "skipped");

    dispatch(&ctx, &mut conn, Command::Subscribe { since_cursor: None })
        .await
        .unwrap();

    // Forced: scheduled, and the update event follows separately
    let result = dispatch(
        &ctx,
        &mut conn,
        Command::ConversationTitleRefresh {
            conversation_id: "c1".into(),
            force: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(result["status"], "updated");

    loop {
        let (_, event) = next_observed(&mut rx).await;
        if let ObservedEvent::ConversationUpdated { conversation, .. } = event {
            assert_eq!(conversation["title"], "rewrite the ring buffer");
            break;
        }
    }

    // No derivable source: unchanged
    dispatch(
        &ctx,
        &mut conn,
        Command::ConversationCreate {
            conversation_id: "c2".into(),
            directory_id: "d1".into(),
            title: String::new(),
            agent_type: "codex".into(),
            adapter_state: json!({}),
        },
    )
    .await
    .unwrap();
    let result = dispatch(
        &ctx,
        &mut conn,
        Command::ConversationTitleRefresh {
            conversation_id: "c2".into(),
            force: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(result["status"], "unchanged");
}

// ── Cursor replay for late subscribers ───────────────────────────────────

#[tokio::test]
async fn late_subscriber_replays_only_events_after_its_cursor() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();

    // Three events land at cursors 1..=3
    for (id, path) in [("d1", "/a"), ("d2", "/b"), ("d3", "/c")] {
        dispatch(
            &ctx,
            &mut conn,
            Command::DirectoryUpsert {
                directory: json!({"directoryId": id, "path": path}),
            },
        )
        .await
        .unwrap();
    }
    assert_eq!(ctx.cursor(), 3);

    // A third client joins having seen cursor 1
    let (mut late, mut late_rx) = test_conn_in(Scope::new("t1", "u1", "w1"), 3);
    dispatch(
        &ctx,
        &mut late,
        Command::Subscribe {
            since_cursor: Some(1),
        },
    )
    .await
    .unwrap();

    let (c2, _) = next_observed(&mut late_rx).await;
    let (c3, _) = next_observed(&mut late_rx).await;
    assert_eq!((c2, c3), (2, 3));

    // Re-submitting cursor 3 through the client-side tracker is rejected
    let mut tracker = harness_core::CursorTracker::new();
    assert!(tracker.observe("late", c2));
    assert!(tracker.observe("late", c3));
    assert!(!tracker.observe("late", 3));
}

// ── Shape validation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_single_records_escalate_to_bad_request() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();

    let err = dispatch(
        &ctx,
        &mut conn,
        Command::DirectoryUpsert {
            directory: json!("not-an-object"),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::BadRequest);

    let err = dispatch(
        &ctx,
        &mut conn,
        Command::RepositoryUpsert {
            repository: json!({"repositoryId": "r1"}),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::BadRequest);
}

#[tokio::test]
async fn pty_start_rejects_empty_args_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();

    let err = dispatch(
        &ctx,
        &mut conn,
        Command::PtyStart {
            session_id: "s1".into(),
            args: vec![],
            env: None,
            cwd: None,
            cols: 80,
            rows: 24,
            worktree_id: None,
            fg: None,
            bg: None,
            directory_id: None,
            agent_type: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::BadRequest);
    assert!(ctx.state.lock().conversations.is_empty());
}

#[tokio::test]
async fn second_hello_is_rejected() {
    let dir = TempDir::new().unwrap();
    let ctx = test_ctx(dir.path());
    let (mut conn, _rx) = test_conn();

    let err = dispatch(
        &ctx,
        &mut conn,
        Command::Hello {
            auth_token: "test-token".into(),
            tenant_id: "t1".into(),
            user_id: "u1".into(),
            workspace_id: "w1".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, harness_core::ErrorKind::BadRequest);
}
