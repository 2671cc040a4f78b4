use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use cellar_types::{SlotAddr, SubscriptionId};

use crate::registry::{Delivery, ObserverRegistry};

/// A live stream of changes to one slot.
///
/// The first item is the slot's value at subscription time (`None` when
/// absent), followed by every later write (`Some(value)`) and removal
/// (`None`), in the order they were persisted. A
/// [`StoreError::TypeMismatch`](crate::StoreError::TypeMismatch) item ends
/// the stream.
///
/// Dropping the subscription (or calling [`Subscription::cancel`]) removes it
/// from the registry; nothing is delivered after that.
pub struct Subscription<T> {
    id: SubscriptionId,
    addr: SlotAddr,
    receiver: mpsc::UnboundedReceiver<Delivery<T>>,
    registry: Arc<ObserverRegistry>,
    finished: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        id: SubscriptionId,
        addr: SlotAddr,
        receiver: mpsc::UnboundedReceiver<Delivery<T>>,
        registry: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            id,
            addr,
            receiver,
            registry,
            finished: false,
        }
    }

    /// This subscription's id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The slot being observed.
    pub fn addr(&self) -> &SlotAddr {
        &self.addr
    }

    /// Wait for the next item. Returns `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Delivery<T>> {
        if self.finished {
            return None;
        }
        let item = self.receiver.recv().await;
        self.track(&item);
        item
    }

    /// Take the next item if one is already queued.
    pub fn try_next(&mut self) -> Option<Delivery<T>> {
        if self.finished {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(item) => {
                let item = Some(item);
                self.track(&item);
                item
            }
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// Returns `true` once the stream has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop receiving changes.
    pub fn cancel(self) {
        drop(self);
    }

    fn track(&mut self, item: &Option<Delivery<T>>) {
        if matches!(item, None | Some(Err(_))) {
            self.finished = true;
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if self.registry.unregister(&self.addr, self.id) {
            debug!(slot = %self.addr, subscription = %self.id, "subscription cancelled");
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("finished", &self.finished)
            .finish()
    }
}
