// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background checkpointing with zstd compression and durable fsync.
//!
//! The checkpointer runs I/O off the main thread while ensuring durability
//! guarantees for crash recovery. The key invariant: the snapshot must be
//! durable (including directory fsync) before the event log is truncated.
//!
//! ## Testability
//!
//! The `CheckpointWriter` trait abstracts all I/O operations, enabling
//! deterministic unit tests with a fake writer, error injection, and
//! verification of fsync ordering.

use crate::migration::MigrationRegistry;
use crate::snapshot::rotate_bak_path;
use crate::{PersistedState, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
use chrono::Utc;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::warn;

/// Errors from checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compress(String),
    #[error("checkpoint failed: {0}")]
    Failed(String),
}

/// Result of a completed checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointResult {
    /// Event-log cursor that was checkpointed
    pub cursor: u64,
    /// Size of the compressed snapshot in bytes
    pub size_bytes: u64,
}

/// Trait abstracting checkpoint I/O for testability.
pub trait CheckpointWriter: Send + Sync + 'static {
    /// Write compressed snapshot data to a temporary file.
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), CheckpointError>;

    /// Fsync a file to ensure data is durable.
    fn fsync_file(&self, path: &Path) -> Result<(), CheckpointError>;

    /// Atomically rename tmp file to final path.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), CheckpointError>;

    /// Fsync directory to make rename durable.
    fn fsync_dir(&self, path: &Path) -> Result<(), CheckpointError>;

    /// Get file size (for metrics).
    fn file_size(&self, path: &Path) -> Result<u64, CheckpointError>;
}

/// Production checkpoint writer using real filesystem operations.
#[derive(Clone)]
pub struct FsCheckpointWriter;

impl CheckpointWriter for FsCheckpointWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(data)?;
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> Result<(), CheckpointError> {
        let file = File::open(path)?;
        file.sync_all()?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), CheckpointError> {
        std::fs::rename(from, to)?;
        Ok(())
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), CheckpointError> {
        let dir = File::open(path)?;
        dir.sync_all()?;
        Ok(())
    }

    fn file_size(&self, path: &Path) -> Result<u64, CheckpointError> {
        Ok(std::fs::metadata(path)?.len())
    }
}

/// Handle to a running checkpoint operation.
pub struct CheckpointHandle {
    /// Cursor being checkpointed
    pub cursor: u64,
    receiver: mpsc::Receiver<Result<CheckpointResult, CheckpointError>>,
    // NOTE(lifetime): Keep thread alive
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl CheckpointHandle {
    /// Wait for the checkpoint to complete.
    ///
    /// This blocks until the snapshot is fully durable (including
    /// directory fsync). Only after this returns successfully is it safe
    /// to truncate the event log.
    pub fn wait(self) -> Result<CheckpointResult, CheckpointError> {
        self.receiver
            .recv()
            .map_err(|_| CheckpointError::Failed("checkpoint thread panicked".into()))?
    }
}

/// Checkpointer manages background snapshot operations.
pub struct Checkpointer<W: CheckpointWriter = FsCheckpointWriter> {
    writer: W,
    snapshot_path: PathBuf,
    compression_level: i32,
}

impl Checkpointer<FsCheckpointWriter> {
    /// Create a new checkpointer with the default filesystem writer.
    pub fn new(snapshot_path: PathBuf) -> Self {
        Self::with_writer(FsCheckpointWriter, snapshot_path)
    }
}

impl<W: CheckpointWriter + Clone> Checkpointer<W> {
    /// Create a checkpointer with a custom writer (for testing).
    pub fn with_writer(writer: W, snapshot_path: PathBuf) -> Self {
        Self {
            writer,
            snapshot_path,
            // zstd level 3 is a good balance of speed and compression
            compression_level: 3,
        }
    }

    /// Start a background checkpoint.
    ///
    /// The returned handle must be waited on before truncating the log.
    pub fn start(&self, cursor: u64, state: &PersistedState) -> CheckpointHandle {
        let state_clone = state.clone();
        let writer = self.writer.clone();
        let snapshot_path = self.snapshot_path.clone();
        let compression_level = self.compression_level;

        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = checkpoint_blocking(
                &writer,
                cursor,
                &state_clone,
                &snapshot_path,
                compression_level,
            );
            let _ = tx.send(result);
        });

        CheckpointHandle {
            cursor,
            receiver: rx,
            handle,
        }
    }

    /// Perform a synchronous checkpoint (for shutdown).
    pub fn checkpoint_sync(
        &self,
        cursor: u64,
        state: &PersistedState,
    ) -> Result<CheckpointResult, CheckpointError> {
        checkpoint_blocking(
            &self.writer,
            cursor,
            state,
            &self.snapshot_path,
            self.compression_level,
        )
    }
}

/// Perform checkpoint I/O (runs on background thread).
fn checkpoint_blocking<W: CheckpointWriter>(
    writer: &W,
    cursor: u64,
    state: &PersistedState,
    snapshot_path: &Path,
    compression_level: i32,
) -> Result<CheckpointResult, CheckpointError> {
    let tmp_path = snapshot_path.with_extension("tmp");

    // 1. Build snapshot struct
    let snapshot = Snapshot {
        v: CURRENT_SNAPSHOT_VERSION,
        cursor,
        state: state.clone(),
        created_at: Utc::now(),
    };

    // 2. Serialize to JSON
    let json_bytes = serde_json::to_vec(&snapshot)?;

    // 3. Compress with zstd
    let compressed = zstd::encode_all(json_bytes.as_slice(), compression_level)
        .map_err(|e| CheckpointError::Compress(e.to_string()))?;

    // 4. Write to temp file
    writer.write_tmp(&tmp_path, &compressed)?;

    // 5. Fsync temp file (data durable)
    writer.fsync_file(&tmp_path)?;

    // 6. Atomic rename
    writer.rename(&tmp_path, snapshot_path)?;

    // 7. Fsync directory (rename durable) - CRITICAL for log truncation safety
    if let Some(parent) = snapshot_path.parent() {
        writer.fsync_dir(parent)?;
    }

    // 8. Get final size for metrics
    let size_bytes = writer
        .file_size(snapshot_path)
        .unwrap_or(compressed.len() as u64);

    Ok(CheckpointResult { cursor, size_bytes })
}

/// Load a zstd-compressed snapshot.
///
/// Returns `Ok(None)` if the file doesn't exist or is corrupt. Corrupt
/// snapshots are moved to a `.bak` file so the gateway can recover via
/// log replay. Snapshots at an older schema version are run through the
/// migration registry (idempotent for the current version).
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    let decoder = zstd::stream::read::Decoder::new(file)
        .map_err(|e| SnapshotError::Io(std::io::Error::other(e.to_string())))?;
    let value: Result<Value, _> = serde_json::from_reader(decoder);

    let value = match value {
        Ok(v) => v,
        Err(e) => {
            let bak_path = rotate_bak_path(path);
            warn!(
                error = %e,
                path = %path.display(),
                bak = %bak_path.display(),
                "Corrupt snapshot, moving to .bak and starting fresh",
            );
            std::fs::rename(path, &bak_path)?;
            return Ok(None);
        }
    };

    let registry = MigrationRegistry::new();
    let migrated = registry.migrate_to(value, CURRENT_SNAPSHOT_VERSION)?;
    let snapshot: Snapshot = serde_json::from_value(migrated)?;
    Ok(Some(snapshot))
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
