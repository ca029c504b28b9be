//! Per-test message buffer
//!
//! Writers push onto a lock-free [`SegQueue`]; they never take a lock. The
//! reader folds whatever is pending into an archive `Vec` (guarded by a mutex
//! only readers touch) and clones it. A snapshot therefore never blocks a
//! writer, and a write racing with a snapshot simply shows up in the next one.
//!
//! Entries from one thread keep their order. Entries from different threads
//! interleave in whatever order the queue received them.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam::queue::SegQueue;

use crate::message::LogMessage;

/// Unbounded, thread-safe, append-only store of captured messages.
#[derive(Debug, Default)]
pub struct LogMessageBuffer {
    pending: SegQueue<LogMessage>,
    archive: Mutex<Vec<LogMessage>>,
}

impl LogMessageBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Safe from any number of threads.
    pub fn add(&self, message: LogMessage) {
        self.pending.push(message);
    }

    /// Point-in-time copy of every message, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<LogMessage> {
        self.drain_pending().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drain_pending().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored message. Later snapshots start empty.
    pub fn clear(&self) {
        let mut archive = self.lock_archive();
        archive.clear();
        while self.pending.pop().is_some() {}
    }

    fn drain_pending(&self) -> MutexGuard<'_, Vec<LogMessage>> {
        let mut archive = self.lock_archive();
        while let Some(message) = self.pending.pop() {
            archive.push(message);
        }
        archive
    }

    // A panic while holding the archive cannot leave it half-written:
    // every mutation is a single push or clear.
    fn lock_archive(&self) -> MutexGuard<'_, Vec<LogMessage>> {
        self.archive.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
