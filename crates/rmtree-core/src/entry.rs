//! Directory entry types produced by enumeration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::Display;

/// The kind of a directory entry, as reported without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link. Never followed, always removed as a leaf.
    Symlink,
    /// Anything else (sockets, fifos, devices).
    Other,
}

impl EntryKind {
    /// Check if this is a directory that must be descended into.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Check if this entry is removed with a single unlink.
    pub fn is_leaf(&self) -> bool {
        !self.is_dir()
    }

    /// Classify a `std::fs::FileType` obtained without following symlinks.
    pub fn from_file_type(file_type: std::fs::FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// One child encountered while enumerating a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry name (last path component). Kept as an `OsString` so names that
    /// are not valid UTF-8 can still be removed.
    pub name: OsString,
    /// Entry kind.
    pub kind: EntryKind,
}

impl Entry {
    /// Create a new entry.
    pub fn new(name: impl Into<OsString>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<OsString>) -> Self {
        Self::new(name, EntryKind::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<OsString>) -> Self {
        Self::new(name, EntryKind::Directory)
    }

    /// Full path of this entry below `parent`.
    pub fn path_in(&self, parent: &Path) -> PathBuf {
        parent.join(&self.name)
    }
}
