// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity circular byte buffer for raw PTY output.
//!
//! Tracks the total number of bytes ever written so consumers can request
//! replay from a global cursor. When the buffer wraps, oldest bytes are
//! evicted; a replay below the earliest retained cursor is clamped and
//! reported as truncated so clients can request a snapshot instead.

/// Result of a replay request against the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    /// Replayed bytes, in write order.
    pub bytes: Vec<u8>,
    /// Cursor the replay actually starts from (>= the requested cursor).
    pub from_cursor: u64,
    /// Cursor after the last byte in the buffer.
    pub latest_cursor: u64,
    /// True when bytes below `from_cursor` were already evicted.
    pub truncated: bool,
}

/// Single-writer, many-reader circular buffer tagged with a strictly
/// monotonic byte cursor.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Vec<u8>,
    capacity: usize,
    write_pos: usize,
    total_written: u64,
}

impl RingBuffer {
    /// Create a new ring buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            capacity,
            write_pos: 0,
            total_written: 0,
        }
    }

    /// Append data, advancing the cursor by `data.len()`.
    pub fn write(&mut self, data: &[u8]) {
        for chunk in data.chunks(self.capacity) {
            let start = self.write_pos;
            let end = start + chunk.len();

            if end <= self.capacity {
                self.buf[start..end].copy_from_slice(chunk);
            } else {
                let first = self.capacity - start;
                self.buf[start..self.capacity].copy_from_slice(&chunk[..first]);
                self.buf[..chunk.len() - first].copy_from_slice(&chunk[first..]);
            }

            self.write_pos = end % self.capacity;
            self.total_written += chunk.len() as u64;
        }
    }

    /// Replay all retained bytes with cursor strictly greater than
    /// `cursor` (i.e. starting at offset `cursor`).
    ///
    /// A request beyond the current cursor yields an empty, non-truncated
    /// replay anchored at the latest cursor.
    pub fn replay_from(&self, cursor: u64) -> Replay {
        let latest = self.total_written;
        if cursor >= latest {
            return Replay {
                bytes: Vec::new(),
                from_cursor: latest,
                latest_cursor: latest,
                truncated: false,
            };
        }

        let earliest = self.earliest_cursor();
        let from = cursor.max(earliest);
        let available = (latest - from) as usize;

        // Start position in the circular buffer for `from`
        let start = if self.write_pos >= available {
            self.write_pos - available
        } else {
            self.capacity - (available - self.write_pos)
        };

        let mut bytes = Vec::with_capacity(available);
        if start + available <= self.capacity {
            bytes.extend_from_slice(&self.buf[start..start + available]);
        } else {
            let first = self.capacity - start;
            bytes.extend_from_slice(&self.buf[start..self.capacity]);
            bytes.extend_from_slice(&self.buf[..available - first]);
        }

        Replay {
            bytes,
            from_cursor: from,
            latest_cursor: latest,
            truncated: from > cursor,
        }
    }

    /// Earliest cursor still retained in the buffer.
    pub fn earliest_cursor(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity as u64)
    }

    /// Cursor after the last byte ever written.
    pub fn latest_cursor(&self) -> u64 {
        self.total_written
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
