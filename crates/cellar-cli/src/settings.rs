use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use cellar_log::{LogConfig, SyncMode, TornTailPolicy, DEFAULT_MAX_RECORD_SIZE};
use cellar_store::{StoreConfig, DEFAULT_LOCK_STRIPES};

/// Base directory used when neither `--root` nor the settings file name one.
pub const DEFAULT_ROOT: &str = ".cellar";

/// Contents of the `--config` TOML file. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub root: Option<PathBuf>,
    pub store: StoreSettings,
    pub log: LogSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub sync_writes: bool,
    pub lock_stripes: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sync_writes: false,
            lock_stripes: DEFAULT_LOCK_STRIPES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub sync_mode: SyncMode,
    pub torn_tail: TornTailPolicy,
    pub max_record_size: u64,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::default(),
            torn_tail: TornTailPolicy::default(),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no file was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read settings file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// `--root` wins over the file, the file over [`DEFAULT_ROOT`].
    pub fn base_dir(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    pub fn store_config(&self, base: &Path) -> StoreConfig {
        StoreConfig {
            sync_writes: self.store.sync_writes,
            lock_stripes: self.store.lock_stripes,
            ..StoreConfig::under(base)
        }
    }

    pub fn log_config(&self, base: &Path) -> LogConfig {
        LogConfig::under(base)
            .with_sync_mode(self.log.sync_mode)
            .with_torn_tail(self.log.torn_tail)
            .with_max_record_size(self.log.max_record_size)
    }
}
