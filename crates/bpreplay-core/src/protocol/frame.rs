//! Reply frame codec.
//!
//! Every bulk read from the programmer is one frame:
//!
//! ```text
//! +--------+----------------------+-----------------+
//! | prefix | body (+ zero pad)    | length (u16 LE) |
//! +--------+----------------------+-----------------+
//! ```
//!
//! The length field counts body bytes only. Some frames arrive padded, in
//! which case the length is shorter than the bytes between prefix and length.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;
use tracing::trace;

use super::constants::FRAME_OVERHEAD;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame too short: {len} bytes, minimum 3")]
    FrameTooShort { len: usize },

    #[error("Malformed frame: declares {declared} body bytes, only {available} available")]
    MalformedFrame { declared: usize, available: usize },

    #[error("Unexpected frame prefix 0x{observed:02X}, expected 0x{expected:02X}")]
    UnexpectedFramePrefix { observed: u8, expected: u8 },

    #[error("Frame body of {len} bytes does not fit the u16 length field")]
    BodyTooLong { len: usize },
}

/// Decoded bulk-read frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub prefix: u8,
    pub body: Vec<u8>,
    pub declared_length: u16,
    /// Padding was present and dropped.
    pub truncated: bool,
    /// Number of padding bytes dropped.
    pub discarded: usize,
}

impl Frame {
    /// Check the prefix byte.
    pub fn expect_prefix(&self, expected: u8) -> Result<&Self, FrameError> {
        if self.prefix != expected {
            return Err(FrameError::UnexpectedFramePrefix {
                observed: self.prefix,
                expected,
            });
        }
        Ok(self)
    }
}

/// Split a raw bulk-read payload into prefix and body.
///
/// Padding after a short declared length is dropped without checking that it
/// is zero.
pub fn decode_frame(raw: &[u8]) -> Result<Frame, FrameError> {
    if raw.len() < FRAME_OVERHEAD {
        return Err(FrameError::FrameTooShort { len: raw.len() });
    }
    let declared = LittleEndian::read_u16(&raw[raw.len() - 2..]);
    let available = raw.len() - FRAME_OVERHEAD;
    let declared_len = declared as usize;

    if declared_len > available {
        return Err(FrameError::MalformedFrame {
            declared: declared_len,
            available,
        });
    }

    let padding = &raw[1 + declared_len..raw.len() - 2];
    if !padding.is_empty() {
        trace!(
            discarded = padding.len(),
            nonzero = padding.iter().any(|&b| b != 0),
            "Dropping frame padding"
        );
    }

    Ok(Frame {
        prefix: raw[0],
        body: raw[1..1 + declared_len].to_vec(),
        declared_length: declared,
        truncated: declared_len < available,
        discarded: padding.len(),
    })
}

/// Build an exact (unpadded) frame around `body`.
pub fn encode_frame(prefix: u8, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let declared =
        u16::try_from(body.len()).map_err(|_| FrameError::BodyTooLong { len: body.len() })?;
    let mut raw = Vec::with_capacity(body.len() + FRAME_OVERHEAD);
    raw.push(prefix);
    raw.extend_from_slice(body);
    let mut len = [0u8; 2];
    LittleEndian::write_u16(&mut len, declared);
    raw.extend_from_slice(&len);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::FRAME_PREFIX;
    use proptest::prelude::*;

    #[test]
    fn test_exact_frame() {
        let frame = decode_frame(&[0x08, 0xAA, 0xBB, 0x02, 0x00]).unwrap();
        assert_eq!(frame.prefix, 0x08);
        assert_eq!(frame.body, vec![0xAA, 0xBB]);
        assert_eq!(frame.declared_length, 2);
        assert!(!frame.truncated);
        assert_eq!(frame.discarded, 0);
    }

    #[test]
    fn test_padded_frame() {
        let frame = decode_frame(&[0x08, 0xAA, 0x00, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(frame.body, vec![0xAA]);
        assert!(frame.truncated);
        assert_eq!(frame.discarded, 2);
    }

    #[test]
    fn test_padding_not_verified() {
        // Non-zero padding is still accepted.
        let frame = decode_frame(&[0x08, 0xAA, 0x55, 0x01, 0x00]).unwrap();
        assert_eq!(frame.body, vec![0xAA]);
        assert!(frame.truncated);
    }

    #[test]
    fn test_declared_too_long() {
        let err = decode_frame(&[0x08, 0xAA, 0x02, 0x00]).unwrap_err();
        assert_eq!(
            err,
            FrameError::MalformedFrame {
                declared: 2,
                available: 1
            }
        );
    }

    #[test]
    fn test_empty_body() {
        let frame = decode_frame(&[0x08, 0x00, 0x00]).unwrap();
        assert!(frame.body.is_empty());
        assert!(!frame.truncated);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            decode_frame(&[0x08, 0x00]).unwrap_err(),
            FrameError::FrameTooShort { len: 2 }
        );
    }

    #[test]
    fn test_prefix_check() {
        let frame = decode_frame(&[0x09, 0x00, 0x00]).unwrap();
        assert_eq!(
            frame.expect_prefix(FRAME_PREFIX).unwrap_err(),
            FrameError::UnexpectedFramePrefix {
                observed: 0x09,
                expected: 0x08
            }
        );
        let ok = decode_frame(&encode_frame(FRAME_PREFIX, &[1, 2, 3]).unwrap()).unwrap();
        assert_eq!(ok.expect_prefix(FRAME_PREFIX).unwrap().body, vec![1, 2, 3]);
    }

    #[test]
    fn test_encode_rejects_oversized_body() {
        let body = vec![0u8; u16::MAX as usize + 1];
        assert_eq!(
            encode_frame(FRAME_PREFIX, &body).unwrap_err(),
            FrameError::BodyTooLong { len: 65536 }
        );
        let max = encode_frame(FRAME_PREFIX, &body[1..]).unwrap();
        assert_eq!(&max[max.len() - 2..], &[0xFF, 0xFF]);
    }

    proptest! {
        #[test]
        fn length_trichotomy(
            prefix in any::<u8>(),
            between in prop::collection::vec(any::<u8>(), 0..64),
            declared in 0u16..80,
        ) {
            let mut raw = vec![prefix];
            raw.extend_from_slice(&between);
            raw.extend_from_slice(&declared.to_le_bytes());
            let available = between.len();
            let declared_len = declared as usize;

            match decode_frame(&raw) {
                Ok(frame) => {
                    prop_assert!(declared_len <= available);
                    prop_assert_eq!(frame.prefix, prefix);
                    prop_assert_eq!(&frame.body[..], &between[..declared_len]);
                    prop_assert_eq!(frame.truncated, declared_len < available);
                    prop_assert_eq!(frame.discarded, available - declared_len);
                }
                Err(FrameError::MalformedFrame { declared: d, available: a }) => {
                    prop_assert!(declared_len > available);
                    prop_assert_eq!((d, a), (declared_len, available));
                }
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }

        #[test]
        fn encoded_frames_decode_exactly(
            prefix in any::<u8>(),
            body in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let frame = decode_frame(&encode_frame(prefix, &body).unwrap()).unwrap();
            prop_assert_eq!(frame.prefix, prefix);
            prop_assert_eq!(frame.body, body);
            prop_assert!(!frame.truncated);
        }
    }
}
