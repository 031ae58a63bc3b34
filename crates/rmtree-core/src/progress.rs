//! Deletion progress reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Shared count of successfully deleted entries.
///
/// Cloning yields another handle to the same counter. The count only ever
/// increases; concurrent readers may observe a value that is already stale.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    deleted: Arc<AtomicU64>,
}

impl ProgressCounter {
    /// Create a new counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one deleted entry.
    pub fn increment(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Current number of deleted entries.
    pub fn get(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    /// Take a snapshot of a deletion that started at `started`.
    pub fn snapshot(&self, started: Instant) -> DeletionProgress {
        DeletionProgress {
            entries_deleted: self.get(),
            elapsed: started.elapsed(),
        }
    }
}

/// Point-in-time view of a running deletion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeletionProgress {
    /// Entries (files, symlinks, directories) deleted so far.
    pub entries_deleted: u64,
    /// Time since the deletion started.
    pub elapsed: Duration,
}

impl DeletionProgress {
    /// Deletion rate in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.entries_deleted as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for DeletionProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} files deleted", self.entries_deleted)
    }
}
