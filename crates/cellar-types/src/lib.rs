//! Foundation types for Cellar.
//!
//! Every other Cellar crate depends on `cellar-types`. It defines how objects
//! are addressed and how they are turned into bytes, but performs no I/O.
//!
//! # Key Types
//!
//! - [`Namespace`] / [`Key`] -- validated names that map onto directory and file names
//! - [`SlotAddr`] -- the `(namespace, key)` address of one object slot
//! - [`Codec`] -- object <-> bytes conversion ([`JsonCodec`], [`BincodeCodec`])
//! - [`SubscriptionId`] -- opaque id of one live subscription
//! - [`Expirable`] -- objects that know when they go stale

pub mod codec;
pub mod error;
pub mod expiry;
pub mod names;
pub mod slot;
pub mod subscription;

pub use codec::{BincodeCodec, Codec, CodecError, JsonCodec};
pub use error::TypeError;
pub use expiry::Expirable;
pub use names::{validate_key, validate_log_name, validate_namespace, MAX_NAME_LEN};
pub use slot::{Key, Namespace, SlotAddr};
pub use subscription::SubscriptionId;
