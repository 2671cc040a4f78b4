use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use cellar_types::{Key, Namespace, SlotAddr};

use crate::error::StoreResult;
use crate::traits::ByteStore;

/// In-memory, HashMap-based byte store.
///
/// The fallback backend when the file system is unavailable, and the usual
/// choice for tests. Everything is held behind a `RwLock`; payloads are
/// cloned on read and write.
pub struct InMemoryByteStore {
    namespaces: RwLock<HashMap<Namespace, HashMap<Key, Vec<u8>>>>,
}

impl InMemoryByteStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Number of slots currently stored, across all namespaces.
    pub fn len(&self) -> usize {
        self.namespaces
            .read()
            .expect("lock poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Returns `true` if no slot holds bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes across all slots.
    pub fn total_bytes(&self) -> u64 {
        self.namespaces
            .read()
            .expect("lock poisoned")
            .values()
            .flat_map(HashMap::values)
            .map(|bytes| bytes.len() as u64)
            .sum()
    }
}

impl Default for InMemoryByteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteStore for InMemoryByteStore {
    async fn exists(&self, addr: &SlotAddr) -> StoreResult<bool> {
        let map = self.namespaces.read().expect("lock poisoned");
        Ok(map
            .get(&addr.namespace)
            .is_some_and(|slots| slots.contains_key(&addr.key)))
    }

    async fn read(&self, addr: &SlotAddr) -> StoreResult<Option<Vec<u8>>> {
        let map = self.namespaces.read().expect("lock poisoned");
        Ok(map
            .get(&addr.namespace)
            .and_then(|slots| slots.get(&addr.key))
            .cloned())
    }

    async fn write(&self, addr: &SlotAddr, bytes: &[u8]) -> StoreResult<()> {
        let mut map = self.namespaces.write().expect("lock poisoned");
        map.entry(addr.namespace.clone())
            .or_default()
            .insert(addr.key.clone(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, addr: &SlotAddr) -> StoreResult<bool> {
        let mut map = self.namespaces.write().expect("lock poisoned");
        Ok(map
            .get_mut(&addr.namespace)
            .is_some_and(|slots| slots.remove(&addr.key).is_some()))
    }

    async fn create_namespace_if_absent(&self, namespace: &Namespace) -> StoreResult<()> {
        let mut map = self.namespaces.write().expect("lock poisoned");
        map.entry(namespace.clone()).or_default();
        Ok(())
    }

    async fn list_children(&self, namespace: &Namespace) -> StoreResult<Vec<Key>> {
        let map = self.namespaces.read().expect("lock poisoned");
        Ok(map
            .get(namespace)
            .map(|slots| slots.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> StoreResult<bool> {
        let mut map = self.namespaces.write().expect("lock poisoned");
        Ok(map.remove(namespace).is_some())
    }
}

impl std::fmt::Debug for InMemoryByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryByteStore")
            .field("slot_count", &self.len())
            .finish()
    }
}
