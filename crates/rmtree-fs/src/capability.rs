//! The asynchronous filesystem capability consumed by the deletion engine.

use std::path::Path;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use rmtree_core::{DeleteError, DeleteResult, Entry, EntryKind, IoPriority};

/// Asynchronous filesystem primitives needed to remove a tree.
///
/// Every call receives the cancellation token and a priority hint. An
/// implementation must fail with [`DeleteError::Cancelled`] when the token is
/// already cancelled at the time of the call; operations that are already
/// running are allowed to finish.
pub trait FileSystem: Send + Sync + 'static {
    /// Open a streaming enumerator over the direct children of `path`.
    ///
    /// Entries report their name and kind only. Symlinks are never followed:
    /// a symlink to a directory is reported as [`EntryKind::Symlink`].
    fn open_children<'a>(
        &'a self,
        path: &'a Path,
        cancel: &'a CancellationToken,
        priority: IoPriority,
    ) -> BoxFuture<'a, DeleteResult<Box<dyn ChildEnumerator>>>;

    /// Remove a single entry.
    ///
    /// Leaves are unlinked; directories are removed with `rmdir` semantics
    /// and must already be empty.
    fn remove_entry<'a>(
        &'a self,
        path: &'a Path,
        kind: EntryKind,
        cancel: &'a CancellationToken,
        priority: IoPriority,
    ) -> BoxFuture<'a, DeleteResult<()>>;
}

/// A streaming cursor over the children of one directory.
pub trait ChildEnumerator: Send + 'static {
    /// Fetch up to `max` further entries. An empty batch means the stream is
    /// exhausted.
    fn next_batch<'a>(
        &'a mut self,
        max: usize,
        cancel: &'a CancellationToken,
        priority: IoPriority,
    ) -> BoxFuture<'a, DeleteResult<Vec<Entry>>>;

    /// Release the enumerator.
    fn close(
        self: Box<Self>,
        cancel: CancellationToken,
        priority: IoPriority,
    ) -> BoxFuture<'static, DeleteResult<()>>;
}

/// Fail with [`DeleteError::Cancelled`] if the token is already cancelled.
pub fn check_cancelled(cancel: &CancellationToken) -> DeleteResult<()> {
    if cancel.is_cancelled() {
        Err(DeleteError::Cancelled)
    } else {
        Ok(())
    }
}
