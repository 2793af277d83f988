// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command error taxonomy shared by the gateway and its clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error kinds carried on command replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthFailed,
    BadRequest,
    NotFound,
    Conflict,
    ControllerHeld,
    Backpressure,
    PtyStartFailed,
    StorageError,
    Internal,
}

impl ErrorKind {
    /// Whether a client may retry the same command unchanged.
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::Backpressure | ErrorKind::StorageError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::AuthFailed => "auth_failed",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ControllerHeld => "controller_held",
            ErrorKind::Backpressure => "backpressure",
            ErrorKind::PtyStartFailed => "pty_start_failed",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Typed error returned on `{ok: false}` command replies.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}: {message}", kind.as_str())]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl CommandError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.retryable(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn controller_held(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ControllerHeld, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
