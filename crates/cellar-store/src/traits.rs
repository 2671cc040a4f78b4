use async_trait::async_trait;
use cellar_types::{Key, Namespace, SlotAddr};

use crate::error::StoreResult;

/// Byte-level storage addressed by `(namespace, key)`.
///
/// The object store never touches files directly; everything goes through
/// this capability. All implementations must satisfy these invariants:
/// - A missing slot is not an error: `read` returns `Ok(None)` and `delete`
///   returns `Ok(false)`.
/// - A namespace that was never created lists as empty.
/// - `write` replaces the slot's bytes as a whole; readers never observe a
///   partially written payload.
/// - All other I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait ByteStore: Send + Sync + 'static {
    /// Check whether a slot holds bytes.
    async fn exists(&self, addr: &SlotAddr) -> StoreResult<bool>;

    /// Read a slot's bytes. Returns `Ok(None)` if the slot is absent.
    async fn read(&self, addr: &SlotAddr) -> StoreResult<Option<Vec<u8>>>;

    /// Replace a slot's bytes. The namespace must already exist.
    async fn write(&self, addr: &SlotAddr, bytes: &[u8]) -> StoreResult<()>;

    /// Delete a slot. Returns `true` if it existed.
    async fn delete(&self, addr: &SlotAddr) -> StoreResult<bool>;

    /// Create the namespace container if it does not exist yet.
    async fn create_namespace_if_absent(&self, namespace: &Namespace) -> StoreResult<()>;

    /// List the keys currently stored under a namespace.
    async fn list_children(&self, namespace: &Namespace) -> StoreResult<Vec<Key>>;

    /// Delete a namespace and every slot in it. Returns `true` if it existed.
    async fn delete_namespace(&self, namespace: &Namespace) -> StoreResult<bool>;
}
