use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};

/// Directory name of the append logs under a base directory.
pub const LOG_DIR_NAME: &str = "persistence-log";

/// Largest payload a frame can describe.
pub const DEFAULT_MAX_RECORD_SIZE: u64 = u32::MAX as u64;

/// Flush/sync strategy for appends and drains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `sync_data` after every append and every truncation.
    EveryWrite,
    /// Rely on the OS page cache.
    #[default]
    OsDefault,
}

/// What a drain does with an incomplete frame at the end of the file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TornTailPolicy {
    /// Drop the partial frame with a warning and return the complete records.
    #[default]
    Discard,
    /// Fail with `CorruptLog` and leave the file as it is.
    Error,
}

/// Configuration for an [`AppendLog`](crate::AppendLog).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory holding one file per log.
    pub dir: PathBuf,
    #[serde(default)]
    pub sync_mode: SyncMode,
    #[serde(default)]
    pub torn_tail: TornTailPolicy,
    /// Maximum encoded size of one record, in bytes.
    #[serde(default = "default_max_record_size")]
    pub max_record_size: u64,
}

fn default_max_record_size() -> u64 {
    DEFAULT_MAX_RECORD_SIZE
}

impl LogConfig {
    /// Config for logs kept in `dir`, with default settings.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sync_mode: SyncMode::default(),
            torn_tail: TornTailPolicy::default(),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }

    /// Config for logs kept in `<base>/persistence-log`.
    pub fn under(base: &Path) -> Self {
        Self::new(base.join(LOG_DIR_NAME))
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_torn_tail(mut self, torn_tail: TornTailPolicy) -> Self {
        self.torn_tail = torn_tail;
        self
    }

    pub fn with_max_record_size(mut self, max_record_size: u64) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    /// Check the values for consistency.
    pub fn validate(&self) -> LogResult<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(LogError::Config("dir must not be empty".into()));
        }
        if self.max_record_size == 0 || self.max_record_size > DEFAULT_MAX_RECORD_SIZE {
            return Err(LogError::Config(format!(
                "max_record_size must be between 1 and {DEFAULT_MAX_RECORD_SIZE}"
            )));
        }
        Ok(())
    }
}
