use std::io;
use std::path::PathBuf;

use cellar_types::{SlotAddr, TypeError};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A namespace or key breaks the naming rules. Raised before any I/O.
    #[error(transparent)]
    InvalidName(#[from] TypeError),

    /// The object could not be serialized by the store's codec.
    #[error("serialize error: {0}")]
    Serialize(String),

    /// Bytes exist for the slot but do not decode as the requested type.
    #[error("decode error for {addr}: {reason}")]
    Decode { addr: SlotAddr, reason: String },

    /// I/O error from the underlying byte store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A subscriber and the slot's observer disagree about the element type.
    /// Terminates only the affected subscription.
    #[error("type mismatch on {addr}: observer carries {expected}, got {found}")]
    TypeMismatch {
        addr: SlotAddr,
        expected: &'static str,
        found: &'static str,
    },

    /// The store root or a namespace directory could not be created.
    #[error("cannot create {}: {source}", path.display())]
    Creation { path: PathBuf, source: io::Error },

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
