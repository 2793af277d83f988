// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::test_support::{conversation_created, directory_upserted};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[test]
fn checkpoint_sync_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.zst");

    let mut state = PersistedState::default();
    state.apply_event(&directory_upserted("d1", "/p"));
    state.apply_event(&conversation_created("c1", "d1", "x"));

    let checkpointer = Checkpointer::new(path.clone());
    let result = checkpointer.checkpoint_sync(42, &state).unwrap();
    assert_eq!(result.cursor, 42);
    assert!(result.size_bytes > 0);

    let snapshot = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(snapshot.cursor, 42);
    assert!(snapshot.state.conversations.contains_key("c1"));
}

#[test]
fn background_checkpoint_completes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.zst");

    let checkpointer = Checkpointer::new(path.clone());
    let handle = checkpointer.start(9, &PersistedState::default());
    let result = handle.wait().unwrap();

    assert_eq!(result.cursor, 9);
    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn load_missing_snapshot_returns_none() {
    let dir = TempDir::new().unwrap();
    assert!(load_snapshot(&dir.path().join("absent.zst"))
        .unwrap()
        .is_none());
}

#[test]
fn corrupt_snapshot_is_rotated_to_bak() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.zst");
    std::fs::write(&path, b"definitely not zstd json").unwrap();

    let loaded = load_snapshot(&path).unwrap();

    assert!(loaded.is_none());
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

// ── fsync ordering ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct RecordingWriter {
    ops: Arc<Mutex<Vec<String>>>,
}

impl CheckpointWriter for RecordingWriter {
    fn write_tmp(&self, _path: &Path, _data: &[u8]) -> Result<(), CheckpointError> {
        self.ops.lock().unwrap().push("write_tmp".into());
        Ok(())
    }

    fn fsync_file(&self, _path: &Path) -> Result<(), CheckpointError> {
        self.ops.lock().unwrap().push("fsync_file".into());
        Ok(())
    }

    fn rename(&self, _from: &Path, _to: &Path) -> Result<(), CheckpointError> {
        self.ops.lock().unwrap().push("rename".into());
        Ok(())
    }

    fn fsync_dir(&self, _path: &Path) -> Result<(), CheckpointError> {
        self.ops.lock().unwrap().push("fsync_dir".into());
        Ok(())
    }

    fn file_size(&self, _path: &Path) -> Result<u64, CheckpointError> {
        Ok(0)
    }
}

#[test]
fn durability_ordering_is_write_fsync_rename_fsyncdir() {
    let writer = RecordingWriter::default();
    let ops = Arc::clone(&writer.ops);
    let checkpointer =
        Checkpointer::with_writer(writer, PathBuf::from("/tmp/snapshot.zst"));

    checkpointer
        .checkpoint_sync(1, &PersistedState::default())
        .unwrap();

    assert_eq!(
        *ops.lock().unwrap(),
        vec!["write_tmp", "fsync_file", "rename", "fsync_dir"]
    );
}

#[derive(Clone)]
struct FailingWriter;

impl CheckpointWriter for FailingWriter {
    fn write_tmp(&self, _path: &Path, _data: &[u8]) -> Result<(), CheckpointError> {
        Err(CheckpointError::Failed("disk full".into()))
    }

    fn fsync_file(&self, _path: &Path) -> Result<(), CheckpointError> {
        Ok(())
    }

    fn rename(&self, _from: &Path, _to: &Path) -> Result<(), CheckpointError> {
        Ok(())
    }

    fn fsync_dir(&self, _path: &Path) -> Result<(), CheckpointError> {
        Ok(())
    }

    fn file_size(&self, _path: &Path) -> Result<u64, CheckpointError> {
        Ok(0)
    }
}

#[test]
fn write_failure_surfaces_from_wait() {
    let checkpointer =
        Checkpointer::with_writer(FailingWriter, PathBuf::from("/tmp/snapshot.zst"));
    let handle = checkpointer.start(1, &PersistedState::default());
    assert!(handle.wait().is_err());
}
