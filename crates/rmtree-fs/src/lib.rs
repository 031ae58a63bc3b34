//! Asynchronous filesystem capability for rmtree.
//!
//! The deletion engine never touches the disk directly. It talks to a
//! [`FileSystem`], which provides four primitives:
//!
//! - **open** a streaming enumerator over a directory's children
//! - **fetch** the next bounded batch of entries from it
//! - **close** the enumerator (the engine never waits for this)
//! - **remove** a single entry
//!
//! Two backends are provided: [`LocalFileSystem`] for the real disk and
//! [`MemoryFileSystem`] for deterministic tests with fault injection.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use rmtree_fs::{FileSystem, IoPriority, LocalFileSystem};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> rmtree_fs::DeleteResult<()> {
//! let fs = LocalFileSystem::new();
//! let cancel = CancellationToken::new();
//! let mut children = fs
//!     .open_children(Path::new("/tmp/build"), &cancel, IoPriority::DEFAULT)
//!     .await?;
//! let batch = children.next_batch(20, &cancel, IoPriority::DEFAULT).await?;
//! println!("{} entries", batch.len());
//! # Ok(())
//! # }
//! ```

mod capability;
mod local;
mod memory;

pub use capability::{ChildEnumerator, FileSystem, check_cancelled};
pub use local::LocalFileSystem;
pub use memory::{FsCall, MemoryFileSystem};

// Re-export core types for convenience
pub use rmtree_core::{DeleteError, DeleteResult, Entry, EntryKind, FsOperation, IoPriority};
