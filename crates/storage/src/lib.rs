// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! harness-storage: the gateway's persistent store.
//!
//! One snapshot file plus an append-only JSONL event log keyed by
//! `(scope, cursor)`. Recovery loads the snapshot and replays log entries
//! after its cursor; the global cursor is preserved across restarts.

mod checkpoint;
mod log;
mod migration;
mod snapshot;
mod state;

pub use checkpoint::{
    load_snapshot, CheckpointError, CheckpointHandle, CheckpointResult, CheckpointWriter,
    Checkpointer, FsCheckpointWriter,
};
pub use log::{EventLog, LogEntry, LogError};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use snapshot::{rotate_bak_path, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::PersistedState;
