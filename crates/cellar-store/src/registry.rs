use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use cellar_types::{CodecError, Key, Namespace, SlotAddr, SubscriptionId};

use crate::error::{StoreError, StoreResult};

/// Item delivered to a subscription: the slot's value, absence, or a
/// terminating error.
pub type Delivery<T> = StoreResult<Option<T>>;

/// What happened to a slot. A write carries both the writer's value and the
/// bytes that were persisted for it.
enum Change<'a> {
    Written {
        value: &'a (dyn Any + Send + Sync),
        bytes: &'a [u8],
        type_name: &'static str,
    },
    Removed,
}

/// Per-subscription delivery callback. Returns `false` once the subscriber
/// is gone or has been terminated, which removes the callback.
type Callback = Box<dyn Fn(&SlotAddr, &Change<'_>) -> bool + Send + Sync>;

fn boxed<F>(f: F) -> Callback
where
    F: Fn(&SlotAddr, &Change<'_>) -> bool + Send + Sync + 'static,
{
    Box::new(f)
}

/// Fan-out node for one slot.
struct Observer {
    element_type: TypeId,
    type_name: &'static str,
    callbacks: HashMap<SubscriptionId, Callback>,
}

impl Observer {
    fn fan_out(&mut self, addr: &SlotAddr, change: &Change<'_>) -> usize {
        let before = self.callbacks.len();
        self.callbacks.retain(|_, callback| callback(addr, change));
        let pruned = before - self.callbacks.len();
        if pruned > 0 {
            debug!(slot = %addr, pruned, "pruned closed subscriptions");
        }
        self.callbacks.len()
    }
}

/// Registry of live observers, keyed by namespace then key.
///
/// Registration, lookup, pruning, and fan-out all happen under one mutex.
/// Callbacks only push into unbounded channels, so the critical section never
/// blocks on a subscriber, and no delivery can happen after `unregister`
/// returns.
pub struct ObserverRegistry {
    observers: Mutex<HashMap<Namespace, HashMap<Key, Observer>>>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a subscription for `addr`, creating the observer lazily.
    ///
    /// The first subscription fixes the observer's element type; later
    /// subscriptions with another type are rejected with
    /// [`StoreError::TypeMismatch`].
    ///
    /// A published value of type `T` is cloned straight into the channel.
    /// Any other value is recovered from its persisted bytes with `decode`;
    /// only if that fails does the subscription end with `TypeMismatch`.
    pub(crate) fn register<T, D>(
        &self,
        addr: &SlotAddr,
        id: SubscriptionId,
        sender: mpsc::UnboundedSender<Delivery<T>>,
        decode: D,
    ) -> StoreResult<()>
    where
        T: Clone + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        let mut observers = self.observers.lock().expect("registry lock poisoned");
        let observer = observers
            .entry(addr.namespace.clone())
            .or_default()
            .entry(addr.key.clone())
            .or_insert_with(|| Observer {
                element_type: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                callbacks: HashMap::new(),
            });

        if observer.element_type != TypeId::of::<T>() {
            return Err(StoreError::TypeMismatch {
                addr: addr.clone(),
                expected: observer.type_name,
                found: std::any::type_name::<T>(),
            });
        }

        let expected = observer.type_name;
        let callback = boxed(move |addr, change| match change {
            Change::Removed => sender.send(Ok(None)).is_ok(),
            Change::Written {
                value,
                bytes,
                type_name,
            } => {
                let decoded = match value.downcast_ref::<T>() {
                    Some(value) => Ok(value.clone()),
                    None => decode(bytes),
                };
                match decoded {
                    Ok(value) => sender.send(Ok(Some(value))).is_ok(),
                    Err(e) => {
                        warn!(
                            slot = %addr,
                            expected,
                            found = *type_name,
                            error = %e,
                            "published value does not decode as observer type"
                        );
                        // Terminal: the sender is dropped together with the callback.
                        let _ = sender.send(Err(StoreError::TypeMismatch {
                            addr: addr.clone(),
                            expected,
                            found: *type_name,
                        }));
                        false
                    }
                }
            }
        });
        observer.callbacks.insert(id, callback);

        debug!(slot = %addr, subscription = %id, "subscription registered");
        Ok(())
    }

    /// Remove a subscription. Prunes the observer (and the namespace entry)
    /// when it was the last one. Returns `true` if the subscription existed.
    pub fn unregister(&self, addr: &SlotAddr, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().expect("registry lock poisoned");
        let Some(keys) = observers.get_mut(&addr.namespace) else {
            return false;
        };
        let Some(observer) = keys.get_mut(&addr.key) else {
            return false;
        };

        let removed = observer.callbacks.remove(&id).is_some();
        if observer.callbacks.is_empty() {
            keys.remove(&addr.key);
            debug!(slot = %addr, "observer pruned");
        }
        if keys.is_empty() {
            observers.remove(&addr.namespace);
        }
        removed
    }

    /// Deliver a new value to every subscription on `addr`. `bytes` is the
    /// value's persisted encoding.
    /// Returns the number of subscriptions still live afterwards.
    pub fn publish<T>(&self, addr: &SlotAddr, value: &T, bytes: &[u8]) -> usize
    where
        T: Send + Sync + 'static,
    {
        let change = Change::Written {
            value,
            bytes,
            type_name: std::any::type_name::<T>(),
        };
        self.publish_change(addr, &change)
    }

    /// Deliver an absence event to every subscription on `addr`.
    pub fn publish_removal(&self, addr: &SlotAddr) -> usize {
        self.publish_change(addr, &Change::Removed)
    }

    /// Deliver an absence event to every observer under `namespace`.
    pub fn publish_namespace_removal(&self, namespace: &Namespace) -> usize {
        let mut observers = self.observers.lock().expect("registry lock poisoned");
        let Some(keys) = observers.get_mut(namespace) else {
            return 0;
        };

        let mut live = 0;
        keys.retain(|key, observer| {
            let addr = SlotAddr::new(namespace.clone(), key.clone());
            let remaining = observer.fan_out(&addr, &Change::Removed);
            live += remaining;
            remaining > 0
        });
        if keys.is_empty() {
            observers.remove(namespace);
        }
        live
    }

    /// Number of slots with at least one live subscription.
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .expect("registry lock poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Number of live subscriptions on `addr`.
    pub fn subscription_count(&self, addr: &SlotAddr) -> usize {
        self.observers
            .lock()
            .expect("registry lock poisoned")
            .get(&addr.namespace)
            .and_then(|keys| keys.get(&addr.key))
            .map_or(0, |observer| observer.callbacks.len())
    }

    /// Drop every observer. Open subscriptions end after draining what was
    /// already delivered.
    pub fn close(&self) {
        let mut observers = self.observers.lock().expect("registry lock poisoned");
        if !observers.is_empty() {
            debug!(namespaces = observers.len(), "registry closed");
        }
        observers.clear();
    }

    fn publish_change(&self, addr: &SlotAddr, change: &Change<'_>) -> usize {
        let mut observers = self.observers.lock().expect("registry lock poisoned");
        let Some(keys) = observers.get_mut(&addr.namespace) else {
            return 0;
        };
        let Some(observer) = keys.get_mut(&addr.key) else {
            return 0;
        };

        let live = observer.fan_out(addr, change);
        if live == 0 {
            keys.remove(&addr.key);
            if keys.is_empty() {
                observers.remove(&addr.namespace);
            }
        }
        live
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observer_count", &self.observer_count())
            .finish()
    }
}
