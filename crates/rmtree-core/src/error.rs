//! Error types for deletion operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Result type for deletion operations.
pub type DeleteResult<T> = Result<T, DeleteError>;

/// The filesystem primitive that was being performed when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum FsOperation {
    /// Opening a directory for enumeration.
    #[strum(to_string = "open directory")]
    OpenEnumerator,
    /// Reading the next batch of directory entries.
    #[strum(to_string = "read directory")]
    FetchBatch,
    /// Removing a file, symlink or other non-directory entry.
    #[strum(to_string = "remove")]
    RemoveEntry,
    /// Removing a directory after all of its children are gone.
    #[strum(to_string = "remove directory")]
    RemoveDirectory,
    /// Closing a directory enumerator.
    #[strum(to_string = "close directory")]
    CloseEnumerator,
    /// A spawned child deletion did not run to completion.
    #[strum(to_string = "join child task")]
    ChildTask,
}

/// Errors that can occur while deleting a tree.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// A filesystem operation failed.
    #[error("Failed to {operation} {path}: {source}")]
    OperationFailed {
        operation: FsOperation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operation was cancelled before it was issued.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Engine bookkeeping reached an impossible state.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DeleteError {
    /// Create an operation failure with path context.
    pub fn io(operation: FsOperation, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OperationFailed {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Check if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The path the error refers to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::OperationFailed { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The failed operation, if any.
    pub fn operation(&self) -> Option<FsOperation> {
        match self {
            Self::OperationFailed { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// The underlying I/O error kind, if any.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::OperationFailed { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_error_io() {
        let err = DeleteError::io(
            FsOperation::RemoveEntry,
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.operation(), Some(FsOperation::RemoveEntry));
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::PermissionDenied));
        assert_eq!(err.path(), Some(std::path::Path::new("/test/path")));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_delete_error_display() {
        let err = DeleteError::io(
            FsOperation::RemoveDirectory,
            "/t/sub",
            std::io::Error::new(std::io::ErrorKind::Other, "busy"),
        );
        assert_eq!(err.to_string(), "Failed to remove directory /t/sub: busy");
        assert_eq!(DeleteError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_cancelled_has_no_path() {
        let err = DeleteError::Cancelled;
        assert!(err.is_cancelled());
        assert!(err.path().is_none());
        assert!(err.operation().is_none());
    }
}
