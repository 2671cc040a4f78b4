//! Record framing.
//!
//! On-disk format, repeated until end of file:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [N bytes: payload]
//! ```
//! There is no header, checksum, or trailer.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{LogError, LogResult};

/// Size of the length prefix.
pub const LEN_PREFIX: usize = 4;

/// Frame one payload. Fails if the payload is longer than `max_record_size`
/// or than a `u32` can describe.
pub fn encode_frame(payload: &[u8], max_record_size: u64) -> LogResult<Bytes> {
    let limit = max_record_size.min(u64::from(u32::MAX));
    if payload.len() as u64 > limit {
        return Err(LogError::FrameTooLarge {
            len: payload.len(),
            limit,
        });
    }

    let mut buf = BytesMut::with_capacity(LEN_PREFIX + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// An incomplete frame at the end of the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TornTail {
    /// Offset of the incomplete frame's first byte.
    pub offset: u64,
    /// Payload length from the prefix, if the prefix itself is complete.
    pub declared: Option<u32>,
    /// Bytes present from `offset` to the end.
    pub available: usize,
}

impl fmt::Display for TornTail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.declared {
            None => write!(
                f,
                "partial length prefix ({} of {LEN_PREFIX} bytes)",
                self.available
            ),
            Some(declared) => write!(
                f,
                "frame declares {declared} payload bytes, only {} present",
                self.available - LEN_PREFIX
            ),
        }
    }
}

/// Result of parsing a log file.
#[derive(Debug, Default)]
pub struct ParsedFrames {
    /// Complete payloads, in file order.
    pub records: Vec<Bytes>,
    /// Trailing partial frame, if any.
    pub torn_tail: Option<TornTail>,
}

/// Split `data` into frame payloads. Payloads share `data`'s allocation.
pub fn parse_frames(mut data: Bytes) -> ParsedFrames {
    let mut parsed = ParsedFrames::default();
    let mut offset = 0u64;

    while data.has_remaining() {
        if data.remaining() < LEN_PREFIX {
            parsed.torn_tail = Some(TornTail {
                offset,
                declared: None,
                available: data.remaining(),
            });
            break;
        }

        let declared = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if data.remaining() - LEN_PREFIX < declared as usize {
            parsed.torn_tail = Some(TornTail {
                offset,
                declared: Some(declared),
                available: data.remaining(),
            });
            break;
        }

        data.advance(LEN_PREFIX);
        parsed.records.push(data.split_to(declared as usize));
        offset += (LEN_PREFIX + declared as usize) as u64;
    }

    parsed
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn concat(records: &[Vec<u8>]) -> (Bytes, Vec<usize>) {
        let mut buf = BytesMut::new();
        let mut boundaries = vec![0];
        for record in records {
            buf.extend_from_slice(&encode_frame(record, u64::MAX).unwrap());
            boundaries.push(buf.len());
        }
        (buf.freeze(), boundaries)
    }

    proptest! {
        #[test]
        fn prop_parse_of_concatenation(
            records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16),
        ) {
            let (data, _) = concat(&records);
            let parsed = parse_frames(data);

            prop_assert!(parsed.torn_tail.is_none());
            let got: Vec<Vec<u8>> = parsed.records.iter().map(|r| r.to_vec()).collect();
            prop_assert_eq!(got, records);
        }

        #[test]
        fn prop_cut_keeps_complete_prefix(
            records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16),
            cut in any::<prop::sample::Index>(),
        ) {
            let (data, boundaries) = concat(&records);
            let cut = cut.index(data.len() + 1);
            let parsed = parse_frames(data.slice(..cut));

            let complete = boundaries.iter().skip(1).filter(|&&b| b <= cut).count();
            let got: Vec<Vec<u8>> = parsed.records.iter().map(|r| r.to_vec()).collect();
            prop_assert_eq!(&got[..], &records[..complete]);

            match parsed.torn_tail {
                None => prop_assert!(boundaries.contains(&cut)),
                Some(torn) => {
                    prop_assert!(!boundaries.contains(&cut));
                    prop_assert_eq!(torn.offset, boundaries[complete] as u64);
                }
            }
        }
    }
}
