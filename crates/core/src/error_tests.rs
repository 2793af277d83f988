// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    auth_failed = { ErrorKind::AuthFailed, false },
    bad_request = { ErrorKind::BadRequest, false },
    not_found = { ErrorKind::NotFound, false },
    conflict = { ErrorKind::Conflict, false },
    controller_held = { ErrorKind::ControllerHeld, false },
    backpressure = { ErrorKind::Backpressure, true },
    pty_start_failed = { ErrorKind::PtyStartFailed, false },
    storage_error = { ErrorKind::StorageError, true },
    internal = { ErrorKind::Internal, false },
)]
fn retryability(kind: ErrorKind, retryable: bool) {
    assert_eq!(kind.retryable(), retryable);
    assert_eq!(CommandError::new(kind, "x").retryable, retryable);
}

#[test]
fn serializes_kind_as_snake_case() {
    let err = CommandError::new(ErrorKind::ControllerHeld, "session sid is claimed");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["kind"], "controller_held");
    assert_eq!(json["retryable"], false);
}

#[test]
fn round_trips_through_json() {
    let err = CommandError::new(ErrorKind::Backpressure, "subscriber too slow");
    let json = serde_json::to_string(&err).unwrap();
    let back: CommandError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}

#[test]
fn display_includes_kind_and_message() {
    let err = CommandError::bad_request("missing field `path`");
    assert_eq!(err.to_string(), "bad_request: missing field `path`");
}
