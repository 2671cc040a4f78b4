//! Namespaced object storage for Cellar.
//!
//! Objects are addressed by `(namespace, key)` and stored as codec-encoded
//! bytes, one file per object, one directory per namespace:
//!
//! ```text
//! <root>/<namespace>/<key>
//! ```
//!
//! Every write and removal is published to the slot's live subscribers after
//! it has been persisted.
//!
//! # Storage Backends
//!
//! All backends implement the [`ByteStore`] trait:
//!
//! - [`FsByteStore`] -- directory-per-namespace, atomic file replacement
//! - [`InMemoryByteStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A failed write publishes nothing.
//! 2. Changes to one slot reach subscribers in the order they were persisted.
//! 3. A new subscription sees the current value first, then every later change.
//! 4. A cancelled subscription is removed before `cancel` returns.
//! 5. Reading an absent slot is `Ok(None)`, never an error.

pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod registry;
pub mod store;
pub mod subscription;
pub mod traits;

pub use config::{StoreConfig, DEFAULT_LOCK_STRIPES, OBJECTS_DIR_NAME};
pub use error::{StoreError, StoreResult};
pub use fs::FsByteStore;
pub use memory::InMemoryByteStore;
pub use registry::{Delivery, ObserverRegistry};
pub use store::ObjectStore;
pub use subscription::Subscription;
pub use traits::ByteStore;
