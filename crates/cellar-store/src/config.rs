use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Directory name of the object store under a base directory.
pub const OBJECTS_DIR_NAME: &str = "file-object-store";

/// Default number of slot lock stripes.
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Configuration for a file-backed [`ObjectStore`](crate::ObjectStore).
///
/// There is no implicit default location; the root directory is always
/// supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory; one subdirectory per namespace lives under it.
    pub root_dir: PathBuf,
    /// `fsync` each object file before it replaces the previous version.
    #[serde(default)]
    pub sync_writes: bool,
    /// Number of per-slot lock stripes.
    #[serde(default = "default_lock_stripes")]
    pub lock_stripes: usize,
}

fn default_lock_stripes() -> usize {
    DEFAULT_LOCK_STRIPES
}

impl StoreConfig {
    /// Config rooted at `root_dir` with default settings.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            sync_writes: false,
            lock_stripes: DEFAULT_LOCK_STRIPES,
        }
    }

    /// Config rooted at `<base>/file-object-store`.
    pub fn under(base: &Path) -> Self {
        Self::new(base.join(OBJECTS_DIR_NAME))
    }

    /// Check the values for consistency.
    pub fn validate(&self) -> StoreResult<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(StoreError::Config("root_dir must not be empty".into()));
        }
        if self.lock_stripes == 0 {
            return Err(StoreError::Config("lock_stripes must be at least 1".into()));
        }
        Ok(())
    }
}
