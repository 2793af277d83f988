// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface: help, arguments, exit codes.

use crate::prelude::Workspace;
use predicates::prelude::*;

#[test]
fn help_prints_usage_and_exits_zero() {
    Workspace::new()
        .harness()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("gateway"));
}

#[test]
fn version_exits_zero() {
    Workspace::new()
        .harness()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn unknown_subcommand_exits_two() {
    Workspace::new()
        .harness()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn missing_subcommand_exits_two() {
    Workspace::new().harness().assert().failure().code(2);
}

#[test]
fn status_without_gateway_exits_one() {
    Workspace::new()
        .harness()
        .args(["gateway", "status"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn stop_without_gateway_exits_one() {
    Workspace::new()
        .harness()
        .args(["gateway", "stop"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not running"));
}

#[test]
fn render_trace_without_gateway_exits_one() {
    Workspace::new()
        .harness()
        .args(["render-trace", "start"])
        .assert()
        .failure()
        .code(1);
}
