//! Concurrent tree deletion engine for rmtree.
//!
//! This crate removes a directory tree while overlapping enumeration with
//! deletion: every directory streams its children in batches, unlinks files
//! and recurses into subdirectories concurrently, and removes itself as soon
//! as its last child is gone. Progress is counted in a shared atomic counter
//! and the whole call resolves to a single result, the first error winning.
//!
//! # Example
//!
//! ```rust,no_run
//! use rmtree_ops::TreeDeleter;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> rmtree_core::DeleteResult<()> {
//! let deleter = TreeDeleter::local();
//! deleter.delete_tree("/tmp/build", CancellationToken::new()).await?;
//! println!("{} files deleted", deleter.progress().get());
//! # Ok(())
//! # }
//! ```

mod background;
mod deleter;
mod engine;
mod task;

pub use background::{DeleteEvent, DeleteOutcome, start_delete};
pub use deleter::TreeDeleter;
pub use task::{DeletionTask, TaskState, TransitionError};

/// Default channel buffer size for deletion events.
pub const DELETE_CHANNEL_SIZE: usize = 100;
