use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use cellar_types::{Key, Namespace, SlotAddr};

use crate::error::{StoreError, StoreResult};
use crate::traits::ByteStore;

/// Prefix of in-flight temporary files. Valid keys never start with `.`, so
/// listings can skip these safely.
const TEMP_PREFIX: &str = ".tmp-";

/// Flat-file byte store.
///
/// Layout under the root directory:
/// ```text
/// <root>/<namespace>/<key>    exactly the codec's bytes, no framing
/// ```
///
/// Writes go to a temporary file in the namespace directory that is renamed
/// over the target, so a reader sees either the old or the new payload.
#[derive(Debug)]
pub struct FsByteStore {
    root: PathBuf,
    sync_writes: bool,
}

impl FsByteStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| StoreError::Creation {
                path: root.clone(),
                source,
            })?;
        info!(root = %root.display(), "file byte store opened");
        Ok(Self {
            root,
            sync_writes: false,
        })
    }

    /// `fsync` every object file before it replaces the old one.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &Namespace) -> PathBuf {
        self.root.join(namespace.as_str())
    }

    fn slot_path(&self, addr: &SlotAddr) -> PathBuf {
        self.namespace_dir(&addr.namespace).join(addr.key.as_str())
    }
}

#[async_trait]
impl ByteStore for FsByteStore {
    async fn exists(&self, addr: &SlotAddr) -> StoreResult<bool> {
        Ok(fs::try_exists(self.slot_path(addr)).await?)
    }

    async fn read(&self, addr: &SlotAddr) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.slot_path(addr)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, addr: &SlotAddr, bytes: &[u8]) -> StoreResult<()> {
        let dir = self.namespace_dir(&addr.namespace);
        let target = self.slot_path(addr);
        let bytes = bytes.to_vec();
        let sync = self.sync_writes;

        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .tempfile_in(&dir)?;
            tmp.write_all(&bytes)?;
            if sync {
                tmp.as_file().sync_all()?;
            }
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)??;

        Ok(())
    }

    async fn delete(&self, addr: &SlotAddr) -> StoreResult<bool> {
        match fs::remove_file(self.slot_path(addr)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_namespace_if_absent(&self, namespace: &Namespace) -> StoreResult<()> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Creation { path: dir, source })
    }

    async fn list_children(&self, namespace: &Namespace) -> StoreResult<Vec<Key>> {
        let mut entries = match fs::read_dir(self.namespace_dir(namespace)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                debug!(namespace = %namespace, "skipping non-UTF-8 file name");
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            match Key::new(name) {
                Ok(key) => keys.push(key),
                Err(e) => debug!(namespace = %namespace, error = %e, "skipping foreign file"),
            }
        }
        Ok(keys)
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> StoreResult<bool> {
        match fs::remove_dir_all(self.namespace_dir(namespace)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
