//! Deletion configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{DeleteError, DeleteResult};

/// Default number of entries requested per enumeration batch.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default interval between progress reports, in milliseconds.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

/// Scheduling hint forwarded to every filesystem call.
///
/// Lower values are more urgent. Backends that have no notion of I/O
/// priority are free to ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IoPriority(pub i32);

impl IoPriority {
    /// The default priority.
    pub const DEFAULT: Self = Self(0);

    /// Create a new priority.
    pub fn new(value: i32) -> Self {
        Self(value)
    }
}

/// Configuration for a tree deletion.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct DeleteConfig {
    /// Maximum number of entries fetched per enumeration batch.
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Priority hint passed to the filesystem.
    #[builder(default)]
    #[serde(default)]
    pub priority: IoPriority,

    /// Interval between progress reports in milliseconds.
    #[builder(default = "DEFAULT_PROGRESS_INTERVAL_MS")]
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_progress_interval_ms() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_MS
}

impl DeleteConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.batch_size == Some(0) {
            return Err("Batch size must be greater than zero".to_string());
        }
        if self.progress_interval_ms == Some(0) {
            return Err("Progress interval must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl DeleteConfig {
    /// Create a new config builder.
    pub fn builder() -> DeleteConfigBuilder {
        DeleteConfigBuilder::default()
    }

    /// Location of the user configuration file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rmtree").join("config.toml"))
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> DeleteResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DeleteError::InvalidConfig {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml(&contents)
    }

    /// Load the user configuration file, falling back to defaults when absent.
    pub fn load_default() -> DeleteResult<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse a config from TOML text.
    pub fn from_toml(contents: &str) -> DeleteResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| DeleteError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config for values the engine cannot work with.
    pub fn validate(&self) -> DeleteResult<()> {
        if self.batch_size == 0 {
            return Err(DeleteError::InvalidConfig {
                message: "Batch size must be greater than zero".to_string(),
            });
        }
        if self.progress_interval_ms == 0 {
            return Err(DeleteError::InvalidConfig {
                message: "Progress interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the progress interval.
    pub fn with_progress_interval_ms(mut self, interval_ms: u64) -> Self {
        self.progress_interval_ms = interval_ms;
        self
    }

    /// Progress interval as a duration.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            priority: IoPriority::DEFAULT,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}
