use std::collections::hash_map::RandomState;
use std::collections::BTreeSet;
use std::hash::BuildHasher;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::debug;

use cellar_types::{Codec, CodecError, Expirable, JsonCodec, Namespace, SlotAddr, SubscriptionId};

use crate::config::{StoreConfig, DEFAULT_LOCK_STRIPES};
use crate::error::{StoreError, StoreResult};
use crate::fs::FsByteStore;
use crate::memory::InMemoryByteStore;
use crate::registry::ObserverRegistry;
use crate::subscription::Subscription;
use crate::traits::ByteStore;

/// Striped per-slot locks. Persist-then-publish of one slot runs under its
/// stripe, so subscribers see changes in the order they hit the byte store.
struct SlotLocks {
    stripes: Vec<Mutex<()>>,
    hasher: RandomState,
}

impl SlotLocks {
    fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
            hasher: RandomState::new(),
        }
    }

    async fn lock(&self, addr: &SlotAddr) -> MutexGuard<'_, ()> {
        let index = (self.hasher.hash_one(addr) % self.stripes.len() as u64) as usize;
        self.stripes[index].lock().await
    }

    /// Always acquired in index order; single-slot callers hold one stripe.
    async fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        let mut guards = Vec::with_capacity(self.stripes.len());
        for stripe in &self.stripes {
            guards.push(stripe.lock().await);
        }
        guards
    }
}

/// Namespaced object store with live change subscriptions.
///
/// Objects are encoded with the store's [`Codec`] and kept in a
/// [`ByteStore`] under `(namespace, key)`. Every successful write or removal
/// is then published to the slot's subscribers. A write that fails to
/// persist publishes nothing.
///
/// ```no_run
/// # async fn demo() -> cellar_store::StoreResult<()> {
/// use cellar_store::{ObjectStore, StoreConfig};
///
/// let store = ObjectStore::open(StoreConfig::new("/tmp/cellar")).await?;
/// store.write("100", "Cats", &"Tom".to_string()).await?;
/// let cat: Option<String> = store.read("100", "Cats").await?;
/// # Ok(())
/// # }
/// ```
pub struct ObjectStore<B = FsByteStore, C = JsonCodec> {
    bytes: B,
    codec: Arc<C>,
    registry: Arc<ObserverRegistry>,
    locks: SlotLocks,
}

impl ObjectStore<FsByteStore, JsonCodec> {
    /// Open a file-backed store with the JSON codec.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        Self::open_with_codec(config, JsonCodec).await
    }
}

impl<C: Codec> ObjectStore<FsByteStore, C> {
    /// Open a file-backed store with a custom codec.
    pub async fn open_with_codec(config: StoreConfig, codec: C) -> StoreResult<Self> {
        config.validate()?;
        let bytes = FsByteStore::open(&config.root_dir)
            .await?
            .with_sync_writes(config.sync_writes);
        Ok(Self::with_stripes(bytes, codec, config.lock_stripes))
    }
}

impl ObjectStore<InMemoryByteStore, JsonCodec> {
    /// A store that lives entirely in memory. Same semantics as the
    /// file-backed store; contents vanish with the process.
    pub fn in_memory() -> Self {
        Self::new(InMemoryByteStore::new(), JsonCodec)
    }
}

impl<B: ByteStore, C: Codec> ObjectStore<B, C> {
    /// Build a store over any byte store and codec.
    pub fn new(bytes: B, codec: C) -> Self {
        Self::with_stripes(bytes, codec, DEFAULT_LOCK_STRIPES)
    }

    /// Build a store with an explicit number of slot lock stripes.
    pub fn with_stripes(bytes: B, codec: C, lock_stripes: usize) -> Self {
        Self {
            bytes,
            codec: Arc::new(codec),
            registry: Arc::new(ObserverRegistry::new()),
            locks: SlotLocks::new(lock_stripes),
        }
    }

    /// The underlying byte store.
    pub fn byte_store(&self) -> &B {
        &self.bytes
    }

    /// The codec used for every object.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Read and decode an object. Absence is `Ok(None)`, not an error.
    pub async fn read<T>(&self, key: &str, namespace: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let addr = SlotAddr::parse(namespace, key)?;
        self.read_slot(&addr).await
    }

    /// Returns `true` if the slot holds bytes. Does not decode.
    pub async fn contains(&self, key: &str, namespace: &str) -> StoreResult<bool> {
        let addr = SlotAddr::parse(namespace, key)?;
        self.bytes.exists(&addr).await
    }

    /// Encode and persist an object, then notify the slot's subscribers.
    ///
    /// Creates the namespace if needed. Nothing is published unless the bytes
    /// were persisted.
    pub async fn write<T>(&self, key: &str, namespace: &str, object: &T) -> StoreResult<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let addr = SlotAddr::parse(namespace, key)?;
        let bytes = self
            .codec
            .encode(object)
            .map_err(|e| StoreError::Serialize(e.reason().to_string()))?;

        let _slot = self.locks.lock(&addr).await;
        self.bytes.create_namespace_if_absent(&addr.namespace).await?;
        self.bytes.write(&addr, &bytes).await?;
        let notified = self.registry.publish(&addr, object, &bytes);

        debug!(slot = %addr, len = bytes.len(), notified, "object written");
        Ok(())
    }

    /// Delete an object. Removing an absent slot is a no-op; subscribers are
    /// told the slot is absent either way.
    pub async fn remove(&self, key: &str, namespace: &str) -> StoreResult<()> {
        let addr = SlotAddr::parse(namespace, key)?;

        let _slot = self.locks.lock(&addr).await;
        self.remove_slot(&addr).await
    }

    /// Delete every object under a namespace and notify all of its
    /// subscribers. Other namespaces are untouched.
    pub async fn remove_all(&self, namespace: &str) -> StoreResult<()> {
        let namespace = Namespace::new(namespace)?;

        let _all = self.locks.lock_all().await;
        let existed = self.bytes.delete_namespace(&namespace).await?;
        let notified = self.registry.publish_namespace_removal(&namespace);

        debug!(%namespace, existed, notified, "namespace removed");
        Ok(())
    }

    /// Keys currently stored under a namespace. Empty if the namespace was
    /// never written; any other listing failure is an error.
    pub async fn read_all_keys(&self, namespace: &str) -> StoreResult<BTreeSet<String>> {
        let namespace = Namespace::new(namespace)?;
        let keys = self.bytes.list_children(&namespace).await?;
        Ok(keys.into_iter().map(String::from).collect())
    }

    /// Subscribe to a slot.
    ///
    /// The first item is the current value (or `None`), then every later
    /// write and removal of this exact slot. The snapshot read and the
    /// registration happen under the slot lock, so a concurrent write is
    /// delivered exactly once: either as the snapshot or as a live item.
    pub async fn observe<T>(&self, key: &str, namespace: &str) -> StoreResult<Subscription<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let addr = SlotAddr::parse(namespace, key)?;

        let _slot = self.locks.lock(&addr).await;
        let current = self.read_slot::<T>(&addr).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = sender.send(Ok(current));
        let id = SubscriptionId::new();
        let codec = Arc::clone(&self.codec);
        self.registry
            .register(&addr, id, sender, move |bytes: &[u8]| codec.decode::<T>(bytes))?;

        Ok(Subscription::new(id, addr, receiver, Arc::clone(&self.registry)))
    }

    /// Read an object that can expire. An expired object is removed (and its
    /// subscribers notified) and reported as absent.
    ///
    /// The read, the expiry check and the removal happen under one slot lock,
    /// so a fresh object written concurrently is never removed.
    pub async fn read_expirable<T>(&self, key: &str, namespace: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Expirable + Send,
    {
        let addr = SlotAddr::parse(namespace, key)?;

        let _slot = self.locks.lock(&addr).await;
        let Some(object) = self.read_slot::<T>(&addr).await? else {
            return Ok(None);
        };
        if object.is_expired(Utc::now()) {
            debug!(slot = %addr, "object expired");
            self.remove_slot(&addr).await?;
            return Ok(None);
        }
        Ok(Some(object))
    }

    /// Number of slots with at least one live subscription.
    pub fn observer_count(&self) -> usize {
        self.registry.observer_count()
    }

    /// Number of live subscriptions on one slot.
    pub fn subscription_count(&self, key: &str, namespace: &str) -> StoreResult<usize> {
        let addr = SlotAddr::parse(namespace, key)?;
        Ok(self.registry.subscription_count(&addr))
    }

    /// Delete and publish absence. Caller holds the slot lock.
    async fn remove_slot(&self, addr: &SlotAddr) -> StoreResult<()> {
        let existed = self.bytes.delete(addr).await?;
        let notified = self.registry.publish_removal(addr);

        debug!(slot = %addr, existed, notified, "object removed");
        Ok(())
    }

    async fn read_slot<T: DeserializeOwned>(&self, addr: &SlotAddr) -> StoreResult<Option<T>> {
        match self.bytes.read(addr).await? {
            None => Ok(None),
            Some(bytes) => self
                .codec
                .decode(&bytes)
                .map(Some)
                .map_err(|e: CodecError| StoreError::Decode {
                    addr: addr.clone(),
                    reason: e.reason().to_string(),
                }),
        }
    }
}

impl<B, C> Drop for ObjectStore<B, C> {
    fn drop(&mut self) {
        // Ends every open subscription instead of leaving it waiting forever.
        self.registry.close();
    }
}

impl<B: std::fmt::Debug, C: Codec> std::fmt::Debug for ObjectStore<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("bytes", &self.bytes)
            .field("codec", &self.codec.name())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cellar_types::Key;
    use chrono::{DateTime, Duration};
    use serde::Deserialize;
    use std::io;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct TestObject {
        value: i64,
    }

    fn obj(value: i64) -> TestObject {
        TestObject { value }
    }

    async fn fs_store() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(StoreConfig::under(dir.path())).await.unwrap();
        (dir, store)
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let (_dir, store) = fs_store().await;
        store.write("test", "test", &obj(2)).await.unwrap();
        let read: Option<TestObject> = store.read("test", "test").await.unwrap();
        assert_eq!(read, Some(obj(2)));
    }

    #[tokio::test]
    async fn object_file_holds_exact_codec_bytes() {
        let (dir, store) = fs_store().await;
        store.write("100", "Cats", &obj(9)).await.unwrap();
        let path = dir.path().join("file-object-store").join("Cats").join("100");
        assert_eq!(std::fs::read(path).unwrap(), br#"{"value":9}"#);
    }

    #[tokio::test]
    async fn read_never_written_is_none() {
        let (_dir, store) = fs_store().await;
        let read: Option<TestObject> = store.read("nothing", "nowhere").await.unwrap();
        assert!(read.is_none());
        assert!(!store.contains("nothing", "nowhere").await.unwrap());
    }

    #[tokio::test]
    async fn read_with_wrong_type_is_decode_error() {
        let store = ObjectStore::in_memory();
        store.write("k", "ns", &"plain string".to_string()).await.unwrap();
        let err = store.read::<TestObject>("k", "ns").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[tokio::test]
    async fn remove_object() {
        let (_dir, store) = fs_store().await;
        store.write("test", "test", &obj(1)).await.unwrap();
        assert!(store.contains("test", "test").await.unwrap());

        store.remove("test", "test").await.unwrap();
        let read: Option<TestObject> = store.read("test", "test").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn remove_absent_is_noop() {
        let (_dir, store) = fs_store().await;
        store.remove("ghost", "test").await.unwrap();
        store.remove("ghost", "never-created").await.unwrap();
    }

    #[tokio::test]
    async fn remove_all_deletes_namespace_only() {
        let (_dir, store) = fs_store().await;
        store.write("test", "test", &obj(1)).await.unwrap();
        store.write("test2", "test", &obj(2)).await.unwrap();
        store.write("test", "other", &obj(3)).await.unwrap();

        store.remove_all("test").await.unwrap();

        assert!(store.read::<TestObject>("test", "test").await.unwrap().is_none());
        assert!(store.read::<TestObject>("test2", "test").await.unwrap().is_none());
        assert_eq!(
            store.read::<TestObject>("test", "other").await.unwrap(),
            Some(obj(3))
        );
    }

    #[tokio::test]
    async fn remove_all_absent_namespace_is_noop() {
        let (_dir, store) = fs_store().await;
        store.remove_all("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn read_all_keys_lists_exact_set() {
        let (_dir, store) = fs_store().await;
        store.write("a", "ns", &obj(1)).await.unwrap();
        store.write("b", "ns", &obj(2)).await.unwrap();
        store.write("c", "elsewhere", &obj(3)).await.unwrap();

        let keys = store.read_all_keys("ns").await.unwrap();
        assert_eq!(keys, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn read_all_keys_of_unknown_namespace_is_empty() {
        let (_dir, store) = fs_store().await;
        assert!(store.read_all_keys("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_before_io() {
        let store = ObjectStore::in_memory();
        assert!(matches!(
            store.write("../escape", "ns", &obj(1)).await,
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.read::<TestObject>("k", "").await,
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(store.remove_all(".hidden").await, Err(StoreError::InvalidName(_))));
        assert!(store.byte_store().is_empty());
    }

    #[tokio::test]
    async fn bincode_codec_store() {
        let store = ObjectStore::new(InMemoryByteStore::new(), cellar_types::BincodeCodec);
        store.write("k", "ns", &obj(-5)).await.unwrap();
        assert_eq!(store.read::<TestObject>("k", "ns").await.unwrap(), Some(obj(-5)));
        assert_eq!(store.byte_store().total_bytes(), 8);
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn observe_snapshot_then_live() {
        let (_dir, store) = fs_store().await;
        let store = Arc::new(store);

        let mut stream = store.observe::<TestObject>("test", "test").await.unwrap();
        let consumer = tokio::spawn(async move {
            let mut values = Vec::new();
            while let Some(item) = stream.next().await {
                values.push(item.unwrap());
                if values.len() == 3 {
                    break;
                }
            }
            values
        });

        store.write("test", "test", &obj(1)).await.unwrap();
        store.write("test", "test", &obj(2)).await.unwrap();

        let values = consumer.await.unwrap();
        assert_eq!(values, vec![None, Some(obj(1)), Some(obj(2))]);
    }

    #[tokio::test]
    async fn observe_starts_with_current_value() {
        let store = ObjectStore::in_memory();
        store.write("k", "ns", &obj(7)).await.unwrap();

        let mut stream = store.observe::<TestObject>("k", "ns").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), Some(obj(7)));
        assert!(stream.try_next().is_none());
    }

    #[tokio::test]
    async fn observe_reports_removals() {
        let store = ObjectStore::in_memory();
        store.write("a", "ns", &obj(1)).await.unwrap();
        let mut a = store.observe::<TestObject>("a", "ns").await.unwrap();
        let mut b = store.observe::<TestObject>("b", "ns").await.unwrap();
        assert_eq!(a.next().await.unwrap().unwrap(), Some(obj(1)));
        assert_eq!(b.next().await.unwrap().unwrap(), None);

        store.remove("a", "ns").await.unwrap();
        assert_eq!(a.next().await.unwrap().unwrap(), None);
        assert!(b.try_next().is_none());

        store.remove_all("ns").await.unwrap();
        assert_eq!(a.next().await.unwrap().unwrap(), None);
        assert_eq!(b.next().await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn observe_only_sees_its_own_slot() {
        let store = ObjectStore::in_memory();
        let mut stream = store.observe::<TestObject>("k", "ns").await.unwrap();
        stream.next().await;

        store.write("other", "ns", &obj(1)).await.unwrap();
        store.write("k", "other-ns", &obj(2)).await.unwrap();
        store.remove_all("other-ns").await.unwrap();
        assert!(stream.try_next().is_none());
    }

    #[tokio::test]
    async fn cancel_prunes_observer_and_stops_delivery() {
        let store = ObjectStore::in_memory();
        let stream = store.observe::<TestObject>("k", "ns").await.unwrap();
        assert_eq!(store.observer_count(), 1);
        assert_eq!(store.subscription_count("k", "ns").unwrap(), 1);

        stream.cancel();
        assert_eq!(store.observer_count(), 0);

        // No resurrection, no panic.
        store.write("k", "ns", &obj(1)).await.unwrap();
        assert_eq!(store.observer_count(), 0);
    }

    #[tokio::test]
    async fn drop_one_of_two_subscriptions() {
        let store = ObjectStore::in_memory();
        let first = store.observe::<TestObject>("k", "ns").await.unwrap();
        let mut second = store.observe::<TestObject>("k", "ns").await.unwrap();
        assert_eq!(store.subscription_count("k", "ns").unwrap(), 2);

        drop(first);
        assert_eq!(store.subscription_count("k", "ns").unwrap(), 1);

        store.write("k", "ns", &obj(3)).await.unwrap();
        assert_eq!(second.next().await.unwrap().unwrap(), None);
        assert_eq!(second.next().await.unwrap().unwrap(), Some(obj(3)));
    }

    #[tokio::test]
    async fn observe_with_other_type_is_rejected() {
        let store = ObjectStore::in_memory();
        let _numbers = store.observe::<TestObject>("k", "ns").await.unwrap();
        let err = store.observe::<String>("k", "ns").await.unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn write_of_other_type_terminates_stream() {
        let store = ObjectStore::in_memory();
        let mut stream = store.observe::<TestObject>("k", "ns").await.unwrap();
        stream.next().await;

        store.write("k", "ns", &"surprise".to_string()).await.unwrap();
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        assert!(stream.next().await.is_none());
        assert!(stream.is_finished());
        assert_eq!(store.observer_count(), 0);
    }

    #[tokio::test]
    async fn borrowed_str_reaches_string_observer() {
        let store = ObjectStore::in_memory();
        let mut stream = store.observe::<String>("k", "ns").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), None);

        store.write("k", "ns", &"hello").await.unwrap();
        assert_eq!(
            store.read::<String>("k", "ns").await.unwrap(),
            Some("hello".to_string())
        );
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            Some("hello".to_string())
        );
        assert!(!stream.is_finished());
    }

    #[tokio::test]
    async fn same_shape_type_is_delivered_decoded() {
        #[derive(Serialize)]
        struct Mirror {
            value: i64,
        }

        let store = ObjectStore::in_memory();
        let mut stream = store.observe::<TestObject>("k", "ns").await.unwrap();
        stream.next().await;

        store.write("k", "ns", &Mirror { value: 11 }).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), Some(obj(11)));
        assert_eq!(store.subscription_count("k", "ns").unwrap(), 1);
    }

    #[tokio::test]
    async fn observe_undecodable_value_fails() {
        let store = ObjectStore::in_memory();
        store.write("k", "ns", &"text".to_string()).await.unwrap();
        let err = store.observe::<TestObject>("k", "ns").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
        assert_eq!(store.observer_count(), 0);
    }

    #[tokio::test]
    async fn dropping_store_ends_streams() {
        let store = ObjectStore::in_memory();
        let mut stream = store.observe::<TestObject>("k", "ns").await.unwrap();
        drop(store);
        assert_eq!(stream.next().await.unwrap().unwrap(), None);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_are_observed_in_persist_order() {
        let store = Arc::new(ObjectStore::in_memory());
        let mut stream = store.observe::<TestObject>("hot", "ns").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), None);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.write("hot", "ns", &obj(i)).await.unwrap() })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let mut seen = Vec::new();
        while let Some(item) = stream.try_next() {
            seen.push(item.unwrap().unwrap().value);
        }
        assert_eq!(seen.len(), 32);
        // The last delivery is what the byte store holds.
        let stored = store.read::<TestObject>("hot", "ns").await.unwrap().unwrap();
        assert_eq!(*seen.last().unwrap(), stored.value);
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    /// Byte store whose writes always fail.
    struct FailingWrites(InMemoryByteStore);

    #[async_trait]
    impl ByteStore for FailingWrites {
        async fn exists(&self, addr: &SlotAddr) -> StoreResult<bool> {
            self.0.exists(addr).await
        }
        async fn read(&self, addr: &SlotAddr) -> StoreResult<Option<Vec<u8>>> {
            self.0.read(addr).await
        }
        async fn write(&self, _addr: &SlotAddr, _bytes: &[u8]) -> StoreResult<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
        }
        async fn delete(&self, addr: &SlotAddr) -> StoreResult<bool> {
            self.0.delete(addr).await
        }
        async fn create_namespace_if_absent(&self, namespace: &Namespace) -> StoreResult<()> {
            self.0.create_namespace_if_absent(namespace).await
        }
        async fn list_children(&self, namespace: &Namespace) -> StoreResult<Vec<Key>> {
            self.0.list_children(namespace).await
        }
        async fn delete_namespace(&self, namespace: &Namespace) -> StoreResult<bool> {
            self.0.delete_namespace(namespace).await
        }
    }

    #[tokio::test]
    async fn failed_write_publishes_nothing() {
        let store = ObjectStore::new(FailingWrites(InMemoryByteStore::new()), JsonCodec);
        let mut stream = store.observe::<TestObject>("k", "ns").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), None);

        let err = store.write("k", "ns", &obj(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(stream.try_next().is_none());
        assert!(!stream.is_finished());
    }

    #[tokio::test]
    async fn unserializable_object_is_serialize_error() {
        let store = ObjectStore::in_memory();
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], 1u8);
        let err = store.write("k", "ns", &map).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialize(_)));
        assert!(!store.contains("k", "ns").await.unwrap());
    }

    // -----------------------------------------------------------------------
    // Expiry
    // -----------------------------------------------------------------------

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Session {
        token: String,
        expires_at: DateTime<Utc>,
    }

    impl Expirable for Session {
        fn is_expired(&self, at: DateTime<Utc>) -> bool {
            at >= self.expires_at
        }
    }

    #[tokio::test]
    async fn read_expirable_keeps_fresh_objects() {
        let store = ObjectStore::in_memory();
        let session = Session {
            token: "fresh".into(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        store.write("s", "sessions", &session).await.unwrap();
        assert_eq!(
            store.read_expirable::<Session>("s", "sessions").await.unwrap(),
            Some(session)
        );
        assert!(store.contains("s", "sessions").await.unwrap());
    }

    #[tokio::test]
    async fn read_expirable_removes_stale_objects() {
        let store = ObjectStore::in_memory();
        let session = Session {
            token: "stale".into(),
            expires_at: Utc::now() - Duration::hours(1),
        };
        store.write("s", "sessions", &session).await.unwrap();
        let mut stream = store.observe::<Session>("s", "sessions").await.unwrap();
        assert!(stream.next().await.unwrap().unwrap().is_some());

        assert!(store.read_expirable::<Session>("s", "sessions").await.unwrap().is_none());
        assert!(!store.contains("s", "sessions").await.unwrap());
        assert_eq!(stream.next().await.unwrap().unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn read_expirable_never_removes_a_fresh_write() {
        let store = Arc::new(ObjectStore::in_memory());
        let stale = Session {
            token: "stale".into(),
            expires_at: Utc::now() - Duration::hours(1),
        };
        let fresh = Session {
            token: "fresh".into(),
            expires_at: Utc::now() + Duration::hours(1),
        };

        for _ in 0..200 {
            store.write("s", "sessions", &stale).await.unwrap();

            let reader = {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.read_expirable::<Session>("s", "sessions").await })
            };
            let writer = {
                let store = Arc::clone(&store);
                let fresh = fresh.clone();
                tokio::spawn(async move { store.write("s", "sessions", &fresh).await })
            };

            let seen = reader.await.unwrap().unwrap();
            writer.await.unwrap().unwrap();
            // The reader saw either the stale object (and removed it before the
            // write) or the fresh one; the fresh object always survives.
            assert!(seen.is_none() || seen.as_ref() == Some(&fresh));
            assert_eq!(
                store.read::<Session>("s", "sessions").await.unwrap(),
                Some(fresh.clone())
            );
        }
    }

    #[tokio::test]
    async fn read_expirable_absent_is_none() {
        let store = ObjectStore::in_memory();
        assert!(store.read_expirable::<Session>("s", "sessions").await.unwrap().is_none());
    }
}
