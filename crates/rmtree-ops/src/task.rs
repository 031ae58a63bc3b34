//! Per-directory join barrier.
//!
//! A [`DeletionTask`] counts the children of one directory that are still in
//! flight. The set of children is not known up front: it grows with every
//! enumeration batch. The directory itself may only be removed once the
//! enumeration is exhausted *and* every discovered child has completed, and
//! that condition has to be detected exactly once, whichever of the two
//! events happens last.

use std::path::{Path, PathBuf};

use strum::Display;
use thiserror::Error;

/// Lifecycle of a [`DeletionTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TaskState {
    /// Batches are still being fetched.
    Enumerating,
    /// Enumeration is exhausted; some children are still in flight.
    AwaitingChildren,
    /// All children are gone; the directory itself may be removed.
    ReadyToDelete,
    /// The directory was removed.
    Done,
    /// A child, an enumeration step or the directory removal failed.
    Failed,
}

impl TaskState {
    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// An event that is not valid in the task's current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event} is not valid for {path} in state {state} ({pending} pending)")]
pub struct TransitionError {
    pub path: PathBuf,
    pub event: &'static str,
    pub state: TaskState,
    pub pending: usize,
}

/// Bookkeeping for the removal of one directory.
#[derive(Debug)]
pub struct DeletionTask {
    path: PathBuf,
    pending: usize,
    exhausted: bool,
    state: TaskState,
}

impl DeletionTask {
    /// Start tracking the removal of `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pending: 0,
            exhausted: false,
            state: TaskState::Enumerating,
        }
    }

    /// The directory being removed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Children discovered but not yet completed.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Check if the directory itself may now be removed.
    pub fn is_ready(&self) -> bool {
        self.state == TaskState::ReadyToDelete
    }

    /// Record one newly discovered child.
    pub fn child_discovered(&mut self) -> Result<(), TransitionError> {
        if self.state != TaskState::Enumerating {
            return Err(self.reject("child discovered"));
        }
        self.pending += 1;
        Ok(())
    }

    /// Record the successful completion of one child.
    ///
    /// Returns `true` if this completion made the directory ready.
    pub fn child_completed(&mut self) -> Result<bool, TransitionError> {
        let accepting = matches!(
            self.state,
            TaskState::Enumerating | TaskState::AwaitingChildren
        );
        if !accepting || self.pending == 0 {
            return Err(self.reject("child completed"));
        }
        self.pending -= 1;
        Ok(self.check_ready())
    }

    /// Record that an empty batch was fetched.
    ///
    /// Returns `true` if every child had already completed.
    pub fn enumeration_exhausted(&mut self) -> Result<bool, TransitionError> {
        if self.state != TaskState::Enumerating {
            return Err(self.reject("enumeration exhausted"));
        }
        self.exhausted = true;
        self.state = TaskState::AwaitingChildren;
        Ok(self.check_ready())
    }

    /// Record that the directory itself was removed.
    pub fn mark_done(&mut self) -> Result<(), TransitionError> {
        if self.state != TaskState::ReadyToDelete {
            return Err(self.reject("directory removed"));
        }
        self.state = TaskState::Done;
        Ok(())
    }

    /// Record a failure. Has no effect once the task is terminal.
    pub fn mark_failed(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::Failed;
        }
    }

    fn check_ready(&mut self) -> bool {
        if self.exhausted && self.pending == 0 {
            self.state = TaskState::ReadyToDelete;
            true
        } else {
            false
        }
    }

    fn reject(&self, event: &'static str) -> TransitionError {
        TransitionError {
            path: self.path.clone(),
            event,
            state: self.state,
            pending: self.pending,
        }
    }
}
