//! Durable append log for Cellar.
//!
//! An [`AppendLog`] is a named, file-backed queue of typed records. Records
//! are appended one frame at a time and drained all at once with
//! [`AppendLog::flush`], which returns them in append order and leaves the
//! log empty.
//!
//! Logs live in `<base>/persistence-log/<name>`; see [`LogConfig`].

pub mod config;
pub mod error;
pub mod frame;
pub mod log;

pub use config::{LogConfig, SyncMode, TornTailPolicy, DEFAULT_MAX_RECORD_SIZE, LOG_DIR_NAME};
pub use error::{LogError, LogResult};
pub use frame::{encode_frame, parse_frames, ParsedFrames, TornTail};
pub use log::AppendLog;
