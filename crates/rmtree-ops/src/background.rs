//! Background deletion with periodic progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use rmtree_core::{DeleteError, DeletionProgress};

use crate::DELETE_CHANNEL_SIZE;
use crate::deleter::TreeDeleter;

/// Event sent through the channel while a deletion runs.
#[derive(Debug)]
pub enum DeleteEvent {
    /// Periodic progress update.
    Progress(DeletionProgress),
    /// The deletion finished. Always the last event.
    Complete(DeleteOutcome),
}

/// Final result of a background deletion.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    /// The tree that was deleted.
    pub root: PathBuf,
    /// Entries removed, the root included when it was removed.
    pub entries_deleted: u64,
    /// Wall time spent.
    pub elapsed: Duration,
    /// When the deletion finished.
    pub finished_at: DateTime<Utc>,
    /// Whether the deletion was cancelled.
    pub cancelled: bool,
    /// The error message, if the deletion failed.
    pub error: Option<String>,
}

impl DeleteOutcome {
    fn new(
        root: PathBuf,
        entries_deleted: u64,
        elapsed: Duration,
        result: Result<(), DeleteError>,
    ) -> Self {
        let (cancelled, error) = match result {
            Ok(()) => (false, None),
            Err(err) => (err.is_cancelled(), Some(err.to_string())),
        };
        Self {
            root,
            entries_deleted,
            elapsed,
            finished_at: Utc::now(),
            cancelled,
            error,
        }
    }

    /// Check if the whole tree was removed.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Get a human-readable summary of the deletion.
    pub fn summary(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        match &self.error {
            None => format!(
                "Deleted {} ({} entries in {:.2}s)",
                self.root.display(),
                self.entries_deleted,
                secs
            ),
            Some(_) if self.cancelled => format!(
                "Cancelled after deleting {} entries of {}",
                self.entries_deleted,
                self.root.display()
            ),
            Some(message) => format!(
                "Failed after deleting {} entries: {}",
                self.entries_deleted, message
            ),
        }
    }
}

/// Start deleting `root` in the background.
///
/// Returns a receiver for progress updates and the final outcome. Progress
/// updates are dropped rather than delaying the deletion when the receiver
/// falls behind; the completion event is always delivered while the
/// receiver is alive.
pub fn start_delete(
    deleter: TreeDeleter,
    root: PathBuf,
    cancel: CancellationToken,
) -> mpsc::Receiver<DeleteEvent> {
    let (tx, rx) = mpsc::channel(DELETE_CHANNEL_SIZE);

    tokio::spawn(async move {
        let progress = deleter.progress();
        let start = Instant::now();

        let mut ticker = tokio::time::interval(deleter.config().progress_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let deletion = deleter.delete_tree(root.clone(), cancel);
        tokio::pin!(deletion);

        let result = loop {
            tokio::select! {
                result = &mut deletion => break result,
                _ = ticker.tick() => {
                    let _ = tx.try_send(DeleteEvent::Progress(progress.snapshot(start)));
                }
            }
        };

        let outcome = DeleteOutcome::new(root, progress.get(), start.elapsed(), result);
        let _ = tx.send(DeleteEvent::Complete(outcome)).await;
    });

    rx
}
