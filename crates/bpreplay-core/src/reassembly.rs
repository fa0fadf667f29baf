//! Reassembly of multi-packet bulk replies.
//!
//! A command written to the command endpoint may be answered by several
//! consecutive bulk reads. Their frame bodies, in order, form one logical
//! reply.

use tracing::debug;

use crate::error::DecodeError;
use crate::protocol::constants::FRAME_PREFIX;
use crate::protocol::frame::{Frame, decode_frame};
use crate::trace::{BulkTransfer, PacketNumber, Transaction, TraceCursor};

/// Frames answering one command, and their concatenated bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalResponse {
    pub frames: Vec<Frame>,
    pub packets: Vec<PacketNumber>,
    pub bytes: Vec<u8>,
}

impl LogicalResponse {
    /// Number of bulk reads that contributed.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last_packet(&self) -> Option<PacketNumber> {
        self.packets.last().copied()
    }

    fn push(&mut self, packet: PacketNumber, frame: Frame) {
        self.bytes.extend_from_slice(&frame.body);
        self.packets.push(packet);
        self.frames.push(frame);
    }
}

/// Concatenate frame bodies in order.
pub fn reassemble(frames: &[Frame]) -> Vec<u8> {
    frames.iter().flat_map(|f| f.body.iter().copied()).collect()
}

/// Decode one bulk read and check its prefix.
pub fn decode_reply(read: &BulkTransfer) -> Result<Frame, DecodeError> {
    let frame = decode_frame(&read.payload).map_err(|source| DecodeError::Frame {
        packet: read.sequence,
        source,
    })?;
    frame
        .expect_prefix(FRAME_PREFIX)
        .map_err(|source| DecodeError::Frame {
            packet: read.sequence,
            source,
        })?;
    Ok(frame)
}

/// Consume every bulk read directly ahead of the cursor.
///
/// `initial` is a read the caller already fetched. Stops at the first
/// non-read transaction or at the end of the trace; the result may be empty.
pub fn collect_reads(
    cursor: &mut TraceCursor<'_>,
    initial: Option<&BulkTransfer>,
) -> Result<LogicalResponse, DecodeError> {
    let mut response = LogicalResponse::default();
    if let Some(read) = initial {
        response.push(read.sequence, decode_reply(read)?);
    }
    while let Ok(Transaction::BulkRead(_)) = cursor.peek_next() {
        if let Transaction::BulkRead(read) = cursor.advance_next()? {
            response.push(read.sequence, decode_reply(read)?);
        }
    }
    Ok(response)
}

/// Reassemble the reply to the write at `write_packet`. At least one read is required.
pub fn reassemble_bulk_response(
    cursor: &mut TraceCursor<'_>,
    initial: Option<&BulkTransfer>,
    write_packet: PacketNumber,
) -> Result<LogicalResponse, DecodeError> {
    let response = collect_reads(cursor, initial)?;
    if response.is_empty() {
        return Err(DecodeError::NoReply {
            packet: write_packet,
        });
    }
    debug!(
        frames = response.len(),
        bytes = response.bytes.len(),
        "Reassembled bulk reply"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{FrameError, encode_frame};
    use crate::trace::Trace;
    use proptest::prelude::*;

    fn read(n: u32, body: &[u8]) -> Transaction {
        Transaction::BulkRead(BulkTransfer {
            endpoint: 0x86,
            payload: encode_frame(FRAME_PREFIX, body).unwrap(),
            sequence: PacketNumber::new(n, 20),
        })
    }

    fn write(n: u32, payload: &[u8]) -> Transaction {
        Transaction::BulkWrite(BulkTransfer {
            endpoint: 0x02,
            payload: payload.to_vec(),
            sequence: PacketNumber::new(n, 20),
        })
    }

    #[test]
    fn test_reassemble_concatenates_in_order() {
        let frames: Vec<Frame> = [&[1u8, 2][..], &[3], &[4, 5, 6]]
            .iter()
            .map(|b| decode_frame(&encode_frame(FRAME_PREFIX, b).unwrap()).unwrap())
            .collect();
        assert_eq!(reassemble(&frames), vec![1, 2, 3, 4, 5, 6]);

        // Piecewise reassembly gives the same bytes.
        let mut piecewise = Vec::new();
        for f in &frames {
            piecewise.extend(reassemble(std::slice::from_ref(f)));
        }
        assert_eq!(piecewise, reassemble(&frames));
    }

    #[test]
    fn test_collect_stops_at_next_write() {
        let trace = Trace::new(vec![
            write(1, &[0x01]),
            read(2, &[0xAA]),
            Transaction::Comment("mid".into()),
            read(3, &[0xBB, 0xCC]),
            write(4, &[0x02]),
        ]);
        let mut cursor = trace.cursor();
        cursor.step();
        let response = reassemble_bulk_response(&mut cursor, None, PacketNumber::new(1, 20)).unwrap();
        assert_eq!(response.len(), 2);
        assert_eq!(response.bytes, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(response.last_packet(), Some(PacketNumber::new(3, 20)));
        assert_eq!(cursor.take_skipped(), vec!["mid"]);
        assert_eq!(cursor.peek_next().unwrap(), &write(4, &[0x02]));
    }

    #[test]
    fn test_collect_with_initial_read_until_end() {
        let trace = Trace::new(vec![read(1, &[0x01]), read(2, &[0x02])]);
        let mut cursor = trace.cursor();
        let first = cursor.step().and_then(|t| t.as_bulk_read()).unwrap();
        let response = collect_reads(&mut cursor, Some(first)).unwrap();
        assert_eq!(response.bytes, vec![0x01, 0x02]);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_empty_lookahead() {
        let trace = Trace::new(vec![write(1, &[0x01]), write(2, &[0x02])]);
        let mut cursor = trace.cursor();
        cursor.step();
        assert!(collect_reads(&mut cursor, None).unwrap().is_empty());
        assert!(matches!(
            reassemble_bulk_response(&mut cursor, None, PacketNumber::new(1, 20)),
            Err(DecodeError::NoReply { .. })
        ));
    }

    #[test]
    fn test_bad_prefix_is_fatal() {
        let trace = Trace::new(vec![Transaction::BulkRead(BulkTransfer {
            endpoint: 0x86,
            payload: encode_frame(0x0A, &[0x00]).unwrap(),
            sequence: PacketNumber::new(7, 20),
        })]);
        let mut cursor = trace.cursor();
        match collect_reads(&mut cursor, None) {
            Err(DecodeError::Frame { packet, source }) => {
                assert_eq!(packet, PacketNumber::new(7, 20));
                assert_eq!(
                    source,
                    FrameError::UnexpectedFramePrefix {
                        observed: 0x0A,
                        expected: FRAME_PREFIX
                    }
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    fn frames_of(bodies: &[Vec<u8>]) -> Vec<Frame> {
        bodies
            .iter()
            .map(|b| decode_frame(&encode_frame(FRAME_PREFIX, b).unwrap()).unwrap())
            .collect()
    }

    proptest! {
        #[test]
        fn reassembly_splits_anywhere(
            bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..8),
            split in any::<prop::sample::Index>(),
        ) {
            let frames = frames_of(&bodies);
            let at = split.index(frames.len() + 1);
            let (left, right) = frames.split_at(at);

            let mut joined = reassemble(left);
            joined.extend(reassemble(right));
            prop_assert_eq!(&joined, &reassemble(&frames));
            prop_assert_eq!(joined, bodies.concat());
        }

        #[test]
        fn collected_reads_match_reassembly(
            bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..8),
        ) {
            let mut txns: Vec<Transaction> = bodies
                .iter()
                .enumerate()
                .map(|(i, b)| read(i as u32 + 1, b))
                .collect();
            txns.push(write(19, &[0x01]));
            let trace = Trace::new(txns);
            let mut cursor = trace.cursor();
            let response = collect_reads(&mut cursor, None).unwrap();
            prop_assert_eq!(response.len(), bodies.len());
            prop_assert_eq!(&response.bytes, &reassemble(&response.frames));
            prop_assert_eq!(response.bytes, bodies.concat());
        }
    }
}
