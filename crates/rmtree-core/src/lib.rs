//! Core types for rmtree.
//!
//! This crate provides the data structures shared by the filesystem
//! adapters and the deletion engine: errors, configuration, directory
//! entries and the shared progress counter.

mod config;
mod entry;
mod error;
mod progress;

pub use config::{
    DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL_MS, DeleteConfig, DeleteConfigBuilder,
    IoPriority,
};
pub use entry::{Entry, EntryKind};
pub use error::{DeleteError, DeleteResult, FsOperation};
pub use progress::{DeletionProgress, ProgressCounter};
