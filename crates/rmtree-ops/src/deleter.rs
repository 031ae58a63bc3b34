//! Top-level tree deletion.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use rmtree_core::{DeleteConfig, DeleteResult, ProgressCounter};
use rmtree_fs::{FileSystem, LocalFileSystem};

use crate::engine::{EngineContext, delete_dir};

/// Removes directory trees through a [`FileSystem`].
///
/// Every successful removal (file, symlink, directory, and the root itself)
/// increments the deleter's [`ProgressCounter`].
#[derive(Clone)]
pub struct TreeDeleter {
    fs: Arc<dyn FileSystem>,
    config: DeleteConfig,
    progress: ProgressCounter,
}

impl std::fmt::Debug for TreeDeleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeDeleter")
            .field("config", &self.config)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl TreeDeleter {
    /// Create a deleter over the given filesystem with default settings.
    pub fn new(fs: impl FileSystem) -> Self {
        Self {
            fs: Arc::new(fs),
            config: DeleteConfig::default(),
            progress: ProgressCounter::new(),
        }
    }

    /// Create a deleter for the local disk.
    pub fn local() -> Self {
        Self::new(LocalFileSystem::new())
    }

    /// Use the given configuration.
    pub fn with_config(mut self, config: DeleteConfig) -> Self {
        self.config = config;
        self
    }

    /// Report into an existing counter instead of a fresh one.
    pub fn with_progress(mut self, progress: ProgressCounter) -> Self {
        self.progress = progress;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &DeleteConfig {
        &self.config
    }

    /// Handle to the shared progress counter.
    pub fn progress(&self) -> ProgressCounter {
        self.progress.clone()
    }

    /// Remove `root` and everything below it.
    ///
    /// Returns once the whole tree is gone or the first error is observed.
    /// Symlinks are removed, never followed. On failure no further operation
    /// is issued; removals that were already in flight may still complete.
    pub async fn delete_tree(
        &self,
        root: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> DeleteResult<()> {
        self.config.validate()?;

        let root = root.into();
        let ctx = Arc::new(EngineContext::new(
            Arc::clone(&self.fs),
            cancel.child_token(),
            self.progress.clone(),
            self.config.batch_size,
            self.config.priority,
        ));

        debug!(root = %root.display(), batch_size = self.config.batch_size, "starting tree deletion");
        delete_dir(Arc::clone(&ctx), root.clone())
            .await
            .map_err(|err| ctx.take_failure().unwrap_or(err))?;
        info!(root = %root.display(), entries = self.progress.get(), "tree deleted");
        Ok(())
    }
}
