// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway record lifecycle and takeover.

use crate::prelude::Workspace;
use predicates::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn start_status_stop_round_trip() {
    let ws = Workspace::new();

    let mut gateway = ws.spawn_gateway();
    let record = ws.wait_for_record();
    assert!(record["port"].as_u64().unwrap() > 0);
    assert!(record["authToken"].as_str().unwrap().len() >= 32);

    ws.harness()
        .args(["gateway", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("running"));

    ws.harness()
        .args(["gateway", "stop"])
        .assert()
        .success();
    ws.wait_for_record_gone();

    let _ = gateway.wait();

    // The shutdown snapshot is a zstd-compressed JSON document carrying
    // the event-log cursor (no events yet, so no snapshot is also fine;
    // when present it must decode)
    let snapshot_path = ws.root().join(".state/snapshot.zst");
    if snapshot_path.exists() {
        let file = std::fs::File::open(&snapshot_path).unwrap();
        let decoder = zstd::stream::read::Decoder::new(file).unwrap();
        let snapshot: serde_json::Value = serde_json::from_reader(decoder).unwrap();
        assert!(snapshot["cursor"].is_u64());
        assert!(snapshot["state"].is_object());
    }
}

#[test]
#[serial]
fn second_start_reports_the_existing_gateway() {
    let ws = Workspace::new();

    let mut gateway = ws.spawn_gateway();
    let record = ws.wait_for_record();

    // `gateway start` against a live gateway succeeds without spawning
    ws.harness()
        .args(["gateway", "start"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already running"));

    // The record is unchanged — the existing gateway kept ownership
    let after = ws.wait_for_record();
    assert_eq!(after["pid"], record["pid"]);
    assert_eq!(after["port"], record["port"]);

    ws.stop_gateway();
    let _ = gateway.wait();
}

#[test]
#[serial]
fn stale_record_is_detected_and_taken_over() {
    let ws = Workspace::new();
    std::fs::create_dir_all(ws.root().join(".state")).unwrap();

    // Simulate a crashed gateway: record with a dead pid
    let stale = serde_json::json!({
        "port": 1,
        "authToken": "stale-token",
        "pid": u32::MAX - 1,
        "startedAt": "2026-01-01T00:00:00Z",
    });
    std::fs::write(ws.record_path(), stale.to_string()).unwrap();

    ws.harness()
        .args(["gateway", "status"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("stale"));

    // A fresh start detects the dead pid and rebinds
    ws.harness()
        .args(["gateway", "start"])
        .assert()
        .success()
        .stdout(predicate::str::contains("started"));

    let record = ws.wait_for_record();
    assert_ne!(record["authToken"], "stale-token");
    assert_ne!(record["pid"].as_u64().unwrap(), u64::from(u32::MAX - 1));

    ws.stop_gateway();
    ws.wait_for_record_gone();
}

#[test]
#[serial]
fn render_trace_toggles_against_a_live_gateway() {
    let ws = Workspace::new();
    let mut gateway = ws.spawn_gateway();
    ws.wait_for_record();

    ws.harness()
        .args(["render-trace", "start"])
        .assert()
        .success()
        .stdout(predicate::str::contains("started"));
    ws.harness()
        .args(["render-trace", "stop"])
        .assert()
        .success();
    ws.harness()
        .args(["profile", "start"])
        .assert()
        .success();
    ws.harness()
        .args(["profile", "stop"])
        .assert()
        .success();

    ws.stop_gateway();
    let _ = gateway.wait();
}
