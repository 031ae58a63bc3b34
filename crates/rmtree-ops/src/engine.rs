//! Recursive traversal engine.
//!
//! Each directory is handled by one [`delete_dir`] future. It streams the
//! directory's children in batches and spawns one task per child into a
//! [`JoinSet`] without waiting for siblings: leaves are unlinked, directories
//! recurse. The loop reacts to whichever happens first, a new batch or a
//! finished child, and feeds both into the directory's [`DeletionTask`].
//! Once the task is ready the directory itself is removed.
//!
//! The first failure anywhere ends the whole call tree: it is recorded, the
//! call's token is cancelled and in-flight children are detached. Operations
//! already dispatched may still finish, but nothing new is issued.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use rmtree_core::{
    DeleteError, DeleteResult, Entry, EntryKind, FsOperation, IoPriority, ProgressCounter,
};
use rmtree_fs::{ChildEnumerator, FileSystem, check_cancelled};

use crate::task::{DeletionTask, TransitionError};

/// Everything a traversal needs, shared by every directory of one call tree.
pub(crate) struct EngineContext {
    pub fs: Arc<dyn FileSystem>,
    /// Scoped to one call: cancelled by the caller or by the first failure.
    pub cancel: CancellationToken,
    pub progress: ProgressCounter,
    pub batch_size: usize,
    pub priority: IoPriority,
    failure: Mutex<Option<DeleteError>>,
}

impl EngineContext {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cancel: CancellationToken,
        progress: ProgressCounter,
        batch_size: usize,
        priority: IoPriority,
    ) -> Self {
        Self {
            fs,
            cancel,
            progress,
            batch_size,
            priority,
            failure: Mutex::new(None),
        }
    }

    /// Stop the whole call tree after `err`.
    ///
    /// The first real failure is kept for the caller; what the failing
    /// directory reports upwards is a cancellation.
    fn abort(&self, err: DeleteError) -> DeleteError {
        if err.is_cancelled() {
            self.cancel.cancel();
            return err;
        }
        {
            let mut failure = self
                .failure
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if failure.is_none() {
                *failure = Some(err);
            }
        }
        self.cancel.cancel();
        DeleteError::Cancelled
    }

    /// The first failure recorded by [`abort`](Self::abort), if any.
    pub fn take_failure(&self) -> Option<DeleteError> {
        self.failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// A batch fetch in flight. Owns the enumerator and hands it back with the
/// result so the next fetch can be issued.
type PendingFetch =
    Pin<Box<dyn Future<Output = (Box<dyn ChildEnumerator>, DeleteResult<Vec<Entry>>)> + Send>>;

impl From<TransitionError> for DeleteError {
    fn from(err: TransitionError) -> Self {
        DeleteError::Internal {
            message: err.to_string(),
        }
    }
}

/// Remove the directory at `path` and everything below it.
pub(crate) fn delete_dir(
    ctx: Arc<EngineContext>,
    path: PathBuf,
) -> BoxFuture<'static, DeleteResult<()>> {
    Box::pin(async move {
        let mut task = DeletionTask::new(path);

        match remove_directory(&ctx, &mut task).await {
            Ok(()) => Ok(()),
            Err(err) => {
                task.mark_failed();
                if err.is_cancelled() {
                    debug!(path = %task.path().display(), "directory deletion cancelled");
                } else {
                    warn!(path = %task.path().display(), error = %err, "directory deletion failed");
                }
                Err(ctx.abort(err))
            }
        }
    })
}

async fn remove_directory(ctx: &Arc<EngineContext>, task: &mut DeletionTask) -> DeleteResult<()> {
    check_cancelled(&ctx.cancel)?;
    let enumerator = ctx
        .fs
        .open_children(task.path(), &ctx.cancel, ctx.priority)
        .await?;
    debug!(path = %task.path().display(), "opened directory");

    let mut children = JoinSet::new();
    let joined = join_children(ctx, task, &mut children, enumerator).await;
    if joined.is_err() {
        // In-flight siblings stop at their next dispatch; outcomes are ignored.
        children.detach_all();
    }
    joined?;

    check_cancelled(&ctx.cancel)?;
    ctx.fs
        .remove_entry(task.path(), EntryKind::Directory, &ctx.cancel, ctx.priority)
        .await?;
    ctx.progress.increment();
    task.mark_done()?;
    debug!(path = %task.path().display(), "removed directory");
    Ok(())
}

/// Drive enumeration and child completions until the task is ready.
async fn join_children(
    ctx: &Arc<EngineContext>,
    task: &mut DeletionTask,
    children: &mut JoinSet<DeleteResult<()>>,
    enumerator: Box<dyn ChildEnumerator>,
) -> DeleteResult<()> {
    let mut fetch = Some(fetch_next(ctx, enumerator)?);

    while !task.is_ready() {
        tokio::select! {
            // Drain completions before dispatching more work.
            biased;

            Some(joined) = children.join_next(), if !children.is_empty() => {
                child_outcome(joined, task.path())?;
                task.child_completed()?;
            }

            (enumerator, batch) = poll_fetch(&mut fetch), if fetch.is_some() => {
                fetch = None;
                let batch = batch?;

                if batch.is_empty() {
                    task.enumeration_exhausted()?;
                    close_detached(ctx, enumerator, task.path());
                    continue;
                }

                trace!(path = %task.path().display(), entries = batch.len(), "fetched batch");
                for entry in batch {
                    task.child_discovered()?;
                    spawn_child(ctx, children, task.path(), entry)?;
                }
                fetch = Some(fetch_next(ctx, enumerator)?);
            }

            else => {
                return Err(DeleteError::Internal {
                    message: format!(
                        "{} stalled in state {} with {} pending",
                        task.path().display(),
                        task.state(),
                        task.pending()
                    ),
                });
            }
        }
    }

    Ok(())
}

fn fetch_next(
    ctx: &Arc<EngineContext>,
    mut enumerator: Box<dyn ChildEnumerator>,
) -> DeleteResult<PendingFetch> {
    check_cancelled(&ctx.cancel)?;
    let ctx = Arc::clone(ctx);
    Ok(Box::pin(async move {
        let batch = enumerator
            .next_batch(ctx.batch_size, &ctx.cancel, ctx.priority)
            .await;
        (enumerator, batch)
    }))
}

async fn poll_fetch(
    fetch: &mut Option<PendingFetch>,
) -> (Box<dyn ChildEnumerator>, DeleteResult<Vec<Entry>>) {
    match fetch.as_mut() {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

fn spawn_child(
    ctx: &Arc<EngineContext>,
    children: &mut JoinSet<DeleteResult<()>>,
    parent: &Path,
    entry: Entry,
) -> DeleteResult<()> {
    check_cancelled(&ctx.cancel)?;
    let path = entry.path_in(parent);

    if entry.kind.is_dir() {
        children.spawn(delete_dir(Arc::clone(ctx), path));
        return Ok(());
    }

    let ctx = Arc::clone(ctx);
    children.spawn(async move {
        ctx.fs
            .remove_entry(&path, entry.kind, &ctx.cancel, ctx.priority)
            .await?;
        ctx.progress.increment();
        trace!(path = %path.display(), kind = %entry.kind, "removed entry");
        Ok(())
    });
    Ok(())
}

fn child_outcome(
    joined: Result<DeleteResult<()>, JoinError>,
    parent: &Path,
) -> DeleteResult<()> {
    match joined {
        Ok(result) => result,
        Err(err) => Err(DeleteError::io(
            FsOperation::ChildTask,
            parent,
            io::Error::other(err.to_string()),
        )),
    }
}

/// Close an exhausted enumerator without waiting for it. A close failure is
/// never reported to the caller.
fn close_detached(ctx: &EngineContext, enumerator: Box<dyn ChildEnumerator>, path: &Path) {
    let close = enumerator.close(ctx.cancel.clone(), ctx.priority);
    let path = path.to_path_buf();
    tokio::spawn(async move {
        if let Err(err) = close.await {
            debug!(path = %path.display(), error = %err, "ignoring enumerator close failure");
        }
    });
}
