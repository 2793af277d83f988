// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event log with group commit support.
//!
//! Events are durably stored before replies leave the gateway, enabling
//! crash recovery via snapshot + replay. Group commit batches writes
//! (~10ms) for performance.
//!
//! Each entry is a single line of JSON:
//! `{"cursor":N,"scope":{...},"event":{...}}\n`
//!
//! The cursor is globally monotonic and preserved across restarts: open
//! scans the log tail to recover the highest assigned cursor.

use harness_core::{ObservedEvent, Scope};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit (~10ms batches)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum entries to buffer before forcing flush
const FLUSH_THRESHOLD: usize = 100;

/// Errors that can occur in event-log operations
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialization helper for writing entries without cloning the event.
#[derive(Serialize)]
struct LogRecordRef<'a> {
    cursor: u64,
    scope: &'a Scope,
    event: &'a ObservedEvent,
}

/// Deserialization helper for reading entries.
#[derive(Deserialize)]
struct LogRecord {
    cursor: u64,
    scope: Scope,
    event: ObservedEvent,
}

/// A single log entry with its assigned cursor.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub cursor: u64,
    pub scope: Scope,
    pub event: ObservedEvent,
}

/// JSONL event log for durable observed-event storage with group commit.
///
/// Entries are buffered in memory and flushed to disk either when
/// `needs_flush()` reports the interval elapsed / buffer full, or
/// explicitly via `flush()`.
pub struct EventLog {
    file: File,
    path: PathBuf,
    /// Highest cursor assigned so far
    write_cursor: u64,
    /// Buffered JSON lines waiting to be flushed (without trailing newline)
    write_buffer: Vec<Vec<u8>>,
    /// Last flush timestamp for interval checking
    last_flush: Instant,
}

impl EventLog {
    /// Open or create an event log at the given path.
    ///
    /// Scans the file to recover the highest assigned cursor. A corrupt
    /// tail is rotated to `.bak` with the valid prefix preserved.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (mut write_cursor, corrupt) = Self::scan(&file)?;

        if corrupt {
            let valid_lines = Self::read_valid_lines(&file)?;
            drop(file);

            let bak_path = crate::snapshot::rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = valid_lines.len(),
                "Corrupt event log detected, rotating to .bak and preserving valid entries",
            );
            std::fs::rename(path, &bak_path)?;

            {
                let mut new_file = File::create(path)?;
                for line in &valid_lines {
                    new_file.write_all(line.as_bytes())?;
                    new_file.write_all(b"\n")?;
                }
                new_file.sync_all()?;
            }

            file = OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(path)?;
            write_cursor = Self::scan(&file)?.0;
        }

        Ok(Self {
            file,
            path: path.to_owned(),
            write_cursor,
            write_buffer: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    /// Scan the log for the highest cursor.
    ///
    /// Returns `(max_cursor, corrupt)` where `corrupt` is true if a parse
    /// error was encountered (not just EOF).
    fn scan(file: &File) -> Result<(u64, bool), LogError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut max_cursor = 0u64;
        let mut corrupt = false;
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    corrupt = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let record: LogRecord = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => {
                    corrupt = true;
                    break;
                }
            };

            max_cursor = max_cursor.max(record.cursor);
        }

        Ok((max_cursor, corrupt))
    }

    /// Read all valid (parseable) lines, stopping at the first corrupt entry.
    fn read_valid_lines(file: &File) -> Result<Vec<String>, LogError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut valid_lines = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let _: LogRecord = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => break,
            };

            valid_lines.push(trimmed.to_string());
        }

        Ok(valid_lines)
    }

    /// Append an event to the write buffer.
    ///
    /// Returns the assigned cursor. The entry is NOT durable until
    /// `flush()` is called.
    pub fn append(&mut self, scope: &Scope, event: &ObservedEvent) -> Result<u64, LogError> {
        self.write_cursor += 1;
        let cursor = self.write_cursor;
        let record = LogRecordRef {
            cursor,
            scope,
            event,
        };
        let json_bytes = serde_json::to_vec(&record)?;
        self.write_buffer.push(json_bytes);
        Ok(cursor)
    }

    /// Check if flush is needed (interval elapsed or buffer full).
    pub fn needs_flush(&self) -> bool {
        !self.write_buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.write_buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Flush all buffered entries to disk with a single fsync.
    pub fn flush(&mut self) -> Result<(), LogError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }

        for mut json_bytes in self.write_buffer.drain(..) {
            json_bytes.push(b'\n');
            self.file.write_all(&json_bytes)?;
        }

        self.file.sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Highest cursor assigned so far.
    pub fn write_cursor(&self) -> u64 {
        self.write_cursor
    }

    /// Raise the cursor floor to the snapshot's cursor.
    ///
    /// A checkpoint may truncate every entry out of the file; without
    /// this, the next open would re-issue old cursors and break cursor
    /// monotonicity across restarts.
    pub fn ensure_cursor(&mut self, cursor: u64) {
        self.write_cursor = self.write_cursor.max(cursor);
    }

    /// Iterate over all entries with cursor greater than `cursor`.
    ///
    /// Used for recovery (replaying from a snapshot's cursor).
    pub fn entries_after(&mut self, cursor: u64) -> Result<Vec<LogEntry>, LogError> {
        self.flush()?;

        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut entries = Vec::new();
        let mut line = String::new();
        let mut offset = 0u64;

        loop {
            line.clear();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                offset += bytes_read as u64;
                continue;
            }

            let record: LogRecord = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        offset,
                        error = %e,
                        "Corrupt log entry during replay, stopping at corruption point",
                    );
                    break;
                }
            };

            offset += bytes_read as u64;

            if record.cursor > cursor {
                entries.push(LogEntry {
                    cursor: record.cursor,
                    scope: record.scope,
                    event: record.event,
                });
            }
        }

        Ok(entries)
    }

    /// Truncate entries at or below the given cursor.
    ///
    /// Called after a durable checkpoint to reclaim disk space. Creates a
    /// new log file with only entries above `cursor`.
    pub fn truncate_through(&mut self, cursor: u64) -> Result<(), LogError> {
        self.flush()?;

        let kept: Vec<String> = {
            let mut reader = BufReader::new(self.file.try_clone()?);
            reader.seek(SeekFrom::Start(0))?;

            let mut kept = Vec::new();
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                    Err(e) => return Err(e.into()),
                }

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let record: LogRecord = match serde_json::from_str(trimmed) {
                    Ok(r) => r,
                    Err(_) => break,
                };

                if record.cursor > cursor {
                    // Keep the raw line (no re-serialize)
                    kept.push(trimmed.to_string());
                }
            }
            kept
        };

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp_file = File::create(&tmp_path)?;
            for line in &kept {
                tmp_file.write_all(line.as_bytes())?;
                tmp_file.write_all(b"\n")?;
            }
            tmp_file.sync_all()?;
        }

        std::fs::rename(&tmp_path, &self.path)?;

        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
