use std::io;
use std::path::PathBuf;

use cellar_types::TypeError;

/// Errors produced by the append log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The log name is not a valid file name.
    #[error(transparent)]
    InvalidName(#[from] TypeError),

    /// An element could not be encoded.
    #[error("serialize error: {0}")]
    Serialize(String),

    /// The record at `index` (in file order) could not be decoded.
    #[error("record {index} could not be decoded: {reason}")]
    Decode { index: usize, reason: String },

    /// An encoded element does not fit in one frame.
    #[error("record of {len} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge { len: usize, limit: u64 },

    /// The file does not parse as a sequence of frames.
    #[error("corrupt log at offset {offset}: {reason}")]
    CorruptLog { offset: u64, reason: String },

    /// Invalid configuration values.
    #[error("invalid log config: {0}")]
    Config(String),

    /// I/O error while appending or draining.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The log directory or file could not be created.
    #[error("cannot create log at {}: {source}", path.display())]
    Creation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Convenience alias used throughout the log crate.
pub type LogResult<T> = std::result::Result<T, LogError>;
