// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit code mapping for the CLI.
//!
//! 0 success, 1 generic error, 2 bad arguments, 130 SIGINT, 143 SIGTERM.

use thiserror::Error;

/// Top-level CLI error carrying its process exit code.
#[derive(Debug, Error)]
pub enum ExitError {
    #[error("{0}")]
    Failure(#[from] anyhow::Error),

    #[error("{0}")]
    BadArguments(String),

    #[error("interrupted")]
    Interrupted,

    #[error("terminated")]
    Terminated,
}

impl ExitError {
    pub fn code(&self) -> i32 {
        match self {
            ExitError::Failure(_) => 1,
            ExitError::BadArguments(_) => 2,
            ExitError::Interrupted => 130,
            ExitError::Terminated => 143,
        }
    }
}

impl From<crate::client::ClientError> for ExitError {
    fn from(e: crate::client::ClientError) -> Self {
        ExitError::Failure(anyhow::Error::new(e))
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
