//! Fatal decode errors.
//!
//! Anything surfacing here aborts the whole decode pass. Recoverable
//! classification mismatches are [`PatternMismatch`](crate::classify::PatternMismatch)
//! and never reach this type.

use thiserror::Error;

use crate::blob::BlobError;
use crate::protocol::FrameError;
use crate::trace::{PacketNumber, TraceError};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Frame error at packet {packet}: {source}")]
    Frame {
        packet: PacketNumber,
        #[source]
        source: FrameError,
    },

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("Unexpected endpoint 0x{actual:02X} at packet {packet}, expected 0x{expected:02X}")]
    UnexpectedEndpoint {
        packet: PacketNumber,
        expected: u8,
        actual: u8,
    },

    #[error("No bulk reply follows the write at packet {packet}")]
    NoReply { packet: PacketNumber },
}
