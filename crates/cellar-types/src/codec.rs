//! Object <-> byte payload conversion.
//!
//! A [`Codec`] is supplied to every store and log. Object types opt in by
//! deriving `serde::Serialize` / `serde::Deserialize`; the codec decides the
//! byte format. The bytes a codec produces are stored verbatim, with no extra
//! framing, so the codec also fixes the on-disk format of object files.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors from encoding or decoding an object.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The object could not be turned into bytes.
    #[error("serialize error: {0}")]
    Serialize(String),

    /// The bytes could not be turned back into the requested type.
    #[error("decode error: {0}")]
    Decode(String),
}

impl CodecError {
    /// The underlying message, without the error-kind prefix.
    pub fn reason(&self) -> &str {
        match self {
            Self::Serialize(reason) | Self::Decode(reason) => reason,
        }
    }
}

/// Converts typed objects to and from byte payloads.
pub trait Codec: Send + Sync + 'static {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Encode an object into bytes.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes into an object of type `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec. The default: human-readable files, tolerant of added fields.
///
/// For large objects prefer [`BincodeCodec`]; JSON is not the most compact
/// or fastest option.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Compact binary codec (bincode 1.x, default options).
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
