//! Local disk backend built on `tokio::fs`.

use std::io;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use rmtree_core::{DeleteError, DeleteResult, Entry, EntryKind, FsOperation, IoPriority};

use crate::capability::{ChildEnumerator, FileSystem, check_cancelled};

/// The local filesystem.
///
/// Tokio runs the blocking syscalls on its blocking pool, so the priority
/// hint has no effect here.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Create a new local filesystem handle.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn open_children<'a>(
        &'a self,
        path: &'a Path,
        cancel: &'a CancellationToken,
        _priority: IoPriority,
    ) -> BoxFuture<'a, DeleteResult<Box<dyn ChildEnumerator>>> {
        Box::pin(async move {
            check_cancelled(cancel)?;

            // read_dir would follow a symlinked root; refuse anything that is
            // not a real directory.
            let metadata = fs::symlink_metadata(path)
                .await
                .map_err(|e| DeleteError::io(FsOperation::OpenEnumerator, path, e))?;
            if !metadata.is_dir() {
                return Err(DeleteError::io(
                    FsOperation::OpenEnumerator,
                    path,
                    io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
                ));
            }

            let read_dir = fs::read_dir(path)
                .await
                .map_err(|e| DeleteError::io(FsOperation::OpenEnumerator, path, e))?;

            Ok(Box::new(LocalEnumerator {
                path: path.to_path_buf(),
                read_dir: Some(read_dir),
            }) as Box<dyn ChildEnumerator>)
        })
    }

    fn remove_entry<'a>(
        &'a self,
        path: &'a Path,
        kind: EntryKind,
        cancel: &'a CancellationToken,
        _priority: IoPriority,
    ) -> BoxFuture<'a, DeleteResult<()>> {
        Box::pin(async move {
            check_cancelled(cancel)?;

            if kind.is_dir() {
                fs::remove_dir(path)
                    .await
                    .map_err(|e| DeleteError::io(FsOperation::RemoveDirectory, path, e))
            } else {
                fs::remove_file(path)
                    .await
                    .map_err(|e| DeleteError::io(FsOperation::RemoveEntry, path, e))
            }
        })
    }
}

/// Enumerator over a `tokio::fs::ReadDir`.
struct LocalEnumerator {
    path: PathBuf,
    read_dir: Option<fs::ReadDir>,
}

impl ChildEnumerator for LocalEnumerator {
    fn next_batch<'a>(
        &'a mut self,
        max: usize,
        cancel: &'a CancellationToken,
        _priority: IoPriority,
    ) -> BoxFuture<'a, DeleteResult<Vec<Entry>>> {
        Box::pin(async move {
            check_cancelled(cancel)?;

            let mut batch = Vec::with_capacity(max);
            let Some(read_dir) = self.read_dir.as_mut() else {
                return Ok(batch);
            };

            while batch.len() < max {
                let next = read_dir
                    .next_entry()
                    .await
                    .map_err(|e| DeleteError::io(FsOperation::FetchBatch, &self.path, e))?;

                let Some(dir_entry) = next else {
                    // End of stream; release the handle early.
                    self.read_dir = None;
                    break;
                };

                // DirEntry::file_type does not traverse symlinks.
                let file_type = dir_entry
                    .file_type()
                    .await
                    .map_err(|e| DeleteError::io(FsOperation::FetchBatch, dir_entry.path(), e))?;

                batch.push(Entry::new(
                    dir_entry.file_name(),
                    EntryKind::from_file_type(file_type),
                ));
            }

            Ok(batch)
        })
    }

    fn close(
        self: Box<Self>,
        _cancel: CancellationToken,
        _priority: IoPriority,
    ) -> BoxFuture<'static, DeleteResult<()>> {
        // Dropping the ReadDir closes the underlying handle.
        Box::pin(async move {
            drop(self);
            Ok(())
        })
    }
}
