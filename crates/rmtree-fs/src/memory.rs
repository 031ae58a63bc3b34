//! In-memory backend with fault injection and an operation log.
//!
//! Used to exercise the deletion engine deterministically: errors can be
//! injected on any primitive for any path, a cancellation can be triggered
//! from inside an enumeration, and every call is recorded in dispatch order.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use rmtree_core::{DeleteError, DeleteResult, Entry, EntryKind, FsOperation, IoPriority};

use crate::capability::{ChildEnumerator, FileSystem};

/// A node of the in-memory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    File,
    Symlink,
    Directory { children: BTreeSet<OsString> },
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self {
            Self::File => EntryKind::File,
            Self::Symlink => EntryKind::Symlink,
            Self::Directory { .. } => EntryKind::Directory,
        }
    }
}

/// One recorded call into the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsCall {
    /// The primitive that was called.
    pub operation: FsOperation,
    /// The path it was called on.
    pub path: PathBuf,
    /// False if the call was rejected because the token was already cancelled.
    pub accepted: bool,
}

#[derive(Debug, Default)]
struct CallLog {
    calls: Vec<FsCall>,
    cancel_mark: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    log: Mutex<CallLog>,
    faults: DashMap<(FsOperation, PathBuf), io::ErrorKind>,
    cancel_hooks: DashMap<PathBuf, CancellationToken>,
    jitter: bool,
}

/// An in-memory filesystem.
///
/// Cloning yields another handle to the same tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    inner: Arc<Inner>,
}

impl MemoryFileSystem {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty filesystem whose operations yield to the scheduler a
    /// path-dependent number of times, so completions interleave.
    pub fn with_jitter() -> Self {
        Self {
            inner: Arc::new(Inner {
                jitter: true,
                ..Default::default()
            }),
        }
    }

    /// Create a directory and any missing ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        let mut nodes = self.nodes();
        insert_node(&mut nodes, path.as_ref(), Node::Directory {
            children: BTreeSet::new(),
        });
        self
    }

    /// Create a file and any missing ancestors.
    pub fn add_file(&self, path: impl AsRef<Path>) -> &Self {
        let mut nodes = self.nodes();
        insert_node(&mut nodes, path.as_ref(), Node::File);
        self
    }

    /// Create a symlink and any missing ancestors. Symlinks have no target
    /// here; they are only ever removed.
    pub fn add_symlink(&self, path: impl AsRef<Path>) -> &Self {
        let mut nodes = self.nodes();
        insert_node(&mut nodes, path.as_ref(), Node::Symlink);
        self
    }

    /// Make `operation` on `path` fail with the given error kind.
    pub fn inject_fault(
        &self,
        operation: FsOperation,
        path: impl Into<PathBuf>,
        kind: io::ErrorKind,
    ) -> &Self {
        self.inner.faults.insert((operation, path.into()), kind);
        self
    }

    /// Make removal of the leaf at `path` fail with permission denied.
    pub fn fail_remove(&self, path: impl Into<PathBuf>) -> &Self {
        self.inject_fault(FsOperation::RemoveEntry, path, io::ErrorKind::PermissionDenied)
    }

    /// Make opening the directory at `path` fail with permission denied.
    pub fn fail_open(&self, path: impl Into<PathBuf>) -> &Self {
        self.inject_fault(
            FsOperation::OpenEnumerator,
            path,
            io::ErrorKind::PermissionDenied,
        )
    }

    /// Make closing the enumerator of `path` fail.
    pub fn fail_close(&self, path: impl Into<PathBuf>) -> &Self {
        self.inject_fault(FsOperation::CloseEnumerator, path, io::ErrorKind::Other)
    }

    /// Cancel `token` right after the first non-empty batch of `path` is
    /// served.
    pub fn cancel_on_fetch(&self, path: impl Into<PathBuf>, token: CancellationToken) -> &Self {
        self.inner.cancel_hooks.insert(path.into(), token);
        self
    }

    /// Check if a path exists.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.nodes().contains_key(path.as_ref())
    }

    /// Number of nodes in the tree, ancestors included.
    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    /// Check if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }

    /// Every call made so far, in dispatch order.
    pub fn operations(&self) -> Vec<FsCall> {
        self.log().calls.clone()
    }

    /// Calls made after a `cancel_on_fetch` hook fired.
    pub fn operations_after_cancel(&self) -> Option<Vec<FsCall>> {
        let log = self.log();
        log.cancel_mark.map(|mark| log.calls[mark..].to_vec())
    }

    fn nodes(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.inner
            .nodes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn log(&self) -> MutexGuard<'_, CallLog> {
        self.inner
            .log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a call, rejecting it if the token is already cancelled.
    ///
    /// The check and the append happen under the log lock so a cancellation
    /// from a hook is totally ordered with respect to every dispatch.
    fn dispatch(
        &self,
        operation: FsOperation,
        path: &Path,
        cancel: &CancellationToken,
    ) -> DeleteResult<()> {
        let mut log = self.log();
        let accepted = !cancel.is_cancelled();
        log.calls.push(FsCall {
            operation,
            path: path.to_path_buf(),
            accepted,
        });
        if accepted {
            Ok(())
        } else {
            Err(DeleteError::Cancelled)
        }
    }

    fn fault(&self, operation: FsOperation, path: &Path) -> DeleteResult<()> {
        match self.inner.faults.get(&(operation, path.to_path_buf())) {
            Some(kind) => Err(DeleteError::io(
                operation,
                path,
                io::Error::new(*kind, format!("injected {operation} failure")),
            )),
            None => Ok(()),
        }
    }

    fn fire_cancel_hook(&self, path: &Path) {
        if let Some((_, token)) = self.inner.cancel_hooks.remove(path) {
            let mut log = self.log();
            token.cancel();
            log.cancel_mark = Some(log.calls.len());
        }
    }

    async fn jitter(&self, path: &Path) {
        if !self.inner.jitter {
            return;
        }
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        for _ in 0..(hasher.finish() % 4) {
            tokio::task::yield_now().await;
        }
    }

    fn remove_node(&self, path: &Path, kind: EntryKind) -> DeleteResult<()> {
        let operation = if kind.is_dir() {
            FsOperation::RemoveDirectory
        } else {
            FsOperation::RemoveEntry
        };
        let fail = |error_kind: io::ErrorKind, message: &str| {
            DeleteError::io(operation, path, io::Error::new(error_kind, message.to_string()))
        };

        let mut nodes = self.nodes();
        match (nodes.get(path), kind.is_dir()) {
            (None, _) => return Err(fail(io::ErrorKind::NotFound, "no such entry")),
            (Some(Node::Directory { children }), true) if !children.is_empty() => {
                return Err(fail(io::ErrorKind::DirectoryNotEmpty, "directory not empty"));
            }
            (Some(Node::Directory { .. }), false) => {
                return Err(fail(io::ErrorKind::IsADirectory, "is a directory"));
            }
            (Some(node), true) if !node.kind().is_dir() => {
                return Err(fail(io::ErrorKind::NotADirectory, "not a directory"));
            }
            _ => {}
        }

        nodes.remove(path);
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(Node::Directory { children }) = nodes.get_mut(parent) {
                children.remove(name);
            }
        }
        Ok(())
    }
}

fn insert_node(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path, node: Node) {
    let mut child = path.to_path_buf();
    for ancestor in path.ancestors().skip(1) {
        let entry = nodes
            .entry(ancestor.to_path_buf())
            .or_insert_with(|| Node::Directory {
                children: BTreeSet::new(),
            });
        if let (Node::Directory { children }, Some(name)) = (entry, child.file_name()) {
            children.insert(name.to_os_string());
        }
        child = ancestor.to_path_buf();
    }
    nodes.entry(path.to_path_buf()).or_insert(node);
}

impl FileSystem for MemoryFileSystem {
    fn open_children<'a>(
        &'a self,
        path: &'a Path,
        cancel: &'a CancellationToken,
        _priority: IoPriority,
    ) -> BoxFuture<'a, DeleteResult<Box<dyn ChildEnumerator>>> {
        Box::pin(async move {
            self.dispatch(FsOperation::OpenEnumerator, path, cancel)?;
            self.jitter(path).await;
            self.fault(FsOperation::OpenEnumerator, path)?;

            let pending = {
                let nodes = self.nodes();
                let children = match nodes.get(path) {
                    Some(Node::Directory { children }) => children,
                    Some(_) => {
                        return Err(DeleteError::io(
                            FsOperation::OpenEnumerator,
                            path,
                            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
                        ));
                    }
                    None => {
                        return Err(DeleteError::io(
                            FsOperation::OpenEnumerator,
                            path,
                            io::Error::new(io::ErrorKind::NotFound, "no such directory"),
                        ));
                    }
                };
                children
                    .iter()
                    .filter_map(|name| {
                        nodes
                            .get(&path.join(name))
                            .map(|node| Entry::new(name.clone(), node.kind()))
                    })
                    .collect::<Vec<_>>()
            };

            Ok(Box::new(MemoryEnumerator {
                fs: self.clone(),
                path: path.to_path_buf(),
                pending: pending.into_iter(),
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
            let operation = if kind.is_dir() {
                FsOperation::RemoveDirectory
            } else {
                FsOperation::RemoveEntry
            };
            self.dispatch(operation, path, cancel)?;
            self.jitter(path).await;
            self.fault(operation, path)?;
            self.remove_node(path, kind)
        })
    }
}

/// Enumerator over a snapshot of a directory taken when it was opened.
struct MemoryEnumerator {
    fs: MemoryFileSystem,
    path: PathBuf,
    pending: std::vec::IntoIter<Entry>,
}

impl ChildEnumerator for MemoryEnumerator {
    fn next_batch<'a>(
        &'a mut self,
        max: usize,
        cancel: &'a CancellationToken,
        _priority: IoPriority,
    ) -> BoxFuture<'a, DeleteResult<Vec<Entry>>> {
        Box::pin(async move {
            self.fs.dispatch(FsOperation::FetchBatch, &self.path, cancel)?;
            self.fs.jitter(&self.path).await;
            self.fs.fault(FsOperation::FetchBatch, &self.path)?;

            let batch: Vec<Entry> = self.pending.by_ref().take(max).collect();
            if !batch.is_empty() {
                self.fs.fire_cancel_hook(&self.path);
            }
            Ok(batch)
        })
    }

    fn close(
        self: Box<Self>,
        cancel: CancellationToken,
        _priority: IoPriority,
    ) -> BoxFuture<'static, DeleteResult<()>> {
        Box::pin(async move {
            self.fs
                .dispatch(FsOperation::CloseEnumerator, &self.path, &cancel)?;
            self.fs.fault(FsOperation::CloseEnumerator, &self.path)
        })
    }
}
