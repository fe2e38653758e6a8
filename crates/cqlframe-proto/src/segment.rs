//! v5 segment framing.
//!
//! When the v5 handshake completes, the transport switches to
//! self-delimiting segments. Each segment is:
//!
//! ```text
//! [3 bytes, little-endian: payload_length (17 bits) | self_contained (bit 17)]
//! [3 bytes, little-endian: CRC-24 of the previous 3 bytes]
//! [payload]
//! [4 bytes, little-endian: seeded CRC-32 of the payload]
//! ```
//!
//! A self-contained segment holds one or more complete frames. A frame
//! larger than [`MAX_PAYLOAD_LENGTH`] is split into consecutive
//! non-self-contained slices; the receiver concatenates slices until the
//! frame's own header length is satisfied. CRC mismatches are fatal: the
//! connection cannot be resynchronized and must be closed.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    crc,
    errors::{ProtocolViolation, Result},
    frame::HEADER_LENGTH,
    primitives,
};

/// Maximum payload bytes one segment can carry (17 bits).
pub const MAX_PAYLOAD_LENGTH: usize = 0x1FFFF;

/// Size of the segment header (length bits plus CRC-24).
pub const SEGMENT_HEADER_LENGTH: usize = 6;

/// Size of the payload CRC-32 trailer.
pub const TRAILER_LENGTH: usize = 4;

const SELF_CONTAINED_BIT: u32 = 1 << 17;

/// One transport segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Frame bytes (whole frames, or a slice of one large frame)
    pub payload: Bytes,
    /// True when the payload holds only complete frames
    pub self_contained: bool,
}

/// Stateless encoder/decoder for [`Segment`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentCodec;

impl SegmentCodec {
    /// Encode one segment, header and trailer included.
    pub fn encode<B: BufMut + ?Sized>(&self, segment: &Segment, dst: &mut B) -> Result<()> {
        if segment.payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(ProtocolViolation::SegmentTooLong(segment.payload.len()).into());
        }

        let mut header_bits = segment.payload.len() as u32;
        if segment.self_contained {
            header_bits |= SELF_CONTAINED_BIT;
        }
        let header = [
            (header_bits & 0xFF) as u8,
            ((header_bits >> 8) & 0xFF) as u8,
            ((header_bits >> 16) & 0xFF) as u8,
        ];
        dst.put_slice(&header);
        dst.put_slice(&crc::crc24(&header).to_le_bytes()[..3]);
        dst.put_slice(&segment.payload);
        dst.put_u32_le(crc::crc32(&segment.payload));
        Ok(())
    }

    /// Exact number of bytes [`SegmentCodec::encode`] will write.
    #[must_use]
    pub fn encoded_size(&self, segment: &Segment) -> usize {
        SEGMENT_HEADER_LENGTH + segment.payload.len() + TRAILER_LENGTH
    }

    /// Decode one segment, verifying both checksums.
    pub fn decode<B: Buf + ?Sized>(&self, src: &mut B) -> Result<Segment> {
        if src.remaining() < SEGMENT_HEADER_LENGTH {
            return Err(ProtocolViolation::Truncated {
                needed: SEGMENT_HEADER_LENGTH,
                remaining: src.remaining(),
            }
            .into());
        }
        let mut header = [0u8; 3];
        src.copy_to_slice(&mut header);
        let mut received_crc24 = [0u8; 4];
        src.copy_to_slice(&mut received_crc24[..3]);
        let received_crc24 = u32::from_le_bytes(received_crc24);

        let computed_crc24 = crc::crc24(&header);
        if computed_crc24 != received_crc24 {
            return Err(ProtocolViolation::HeaderCrcMismatch {
                computed: computed_crc24,
                received: received_crc24,
            }
            .into());
        }

        let header_bits =
            u32::from(header[0]) | u32::from(header[1]) << 8 | u32::from(header[2]) << 16;
        let payload_length = (header_bits & MAX_PAYLOAD_LENGTH as u32) as usize;
        let self_contained = header_bits & SELF_CONTAINED_BIT != 0;

        if src.remaining() < payload_length + TRAILER_LENGTH {
            return Err(ProtocolViolation::Truncated {
                needed: payload_length + TRAILER_LENGTH,
                remaining: src.remaining(),
            }
            .into());
        }
        let payload = src.copy_to_bytes(payload_length);
        let received_crc32 = src.get_u32_le();
        let computed_crc32 = crc::crc32(&payload);
        if computed_crc32 != received_crc32 {
            return Err(ProtocolViolation::PayloadCrcMismatch {
                computed: computed_crc32,
                received: received_crc32,
            }
            .into());
        }

        Ok(Segment { payload, self_contained })
    }
}

/// Split already-encoded frame bytes into outbound segments.
///
/// Frames that fit yield one self-contained segment; larger frames are
/// sliced into non-self-contained segments of maximum size (the last slice
/// may be shorter).
#[must_use]
pub fn segment_frame(mut frame_bytes: Bytes) -> Vec<Segment> {
    if frame_bytes.len() <= MAX_PAYLOAD_LENGTH {
        return vec![Segment { payload: frame_bytes, self_contained: true }];
    }
    let mut segments = Vec::with_capacity(frame_bytes.len().div_ceil(MAX_PAYLOAD_LENGTH));
    while !frame_bytes.is_empty() {
        let take = frame_bytes.len().min(MAX_PAYLOAD_LENGTH);
        segments.push(Segment { payload: frame_bytes.split_to(take), self_contained: false });
    }
    segments
}

/// Reassembles frame byte sequences from inbound segments.
///
/// Self-contained payloads are handed out as-is; slices of a large frame
/// are concatenated until the length in the leading frame header is
/// satisfied. Feed every decoded segment in arrival order.
#[derive(Debug, Default)]
pub struct SegmentAccumulator {
    partial: BytesMut,
}

impl SegmentAccumulator {
    /// A fresh accumulator with no partial frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one segment; returns the frame byte sequences completed by it.
    ///
    /// A self-contained segment may complete several small frames at once.
    /// Interleaving a self-contained segment into an unfinished large frame
    /// is a protocol violation.
    pub fn push(&mut self, segment: Segment) -> Result<Vec<Bytes>> {
        if segment.self_contained {
            if !self.partial.is_empty() {
                return Err(ProtocolViolation::Truncated {
                    needed: self.expected_len()?,
                    remaining: self.partial.len(),
                }
                .into());
            }
            return Self::split_frames(segment.payload);
        }

        self.partial.extend_from_slice(&segment.payload);
        if self.partial.len() < HEADER_LENGTH {
            return Ok(Vec::new());
        }
        let expected = self.expected_len()?;
        if self.partial.len() < expected {
            return Ok(Vec::new());
        }
        if self.partial.len() > expected {
            // Slices of a large frame carry exactly one frame between them.
            return Err(ProtocolViolation::Truncated {
                needed: expected,
                remaining: self.partial.len(),
            }
            .into());
        }
        Ok(vec![std::mem::take(&mut self.partial).freeze()])
    }

    /// True when a partial frame is pending.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }

    fn expected_len(&self) -> Result<usize> {
        let mut header = &self.partial[..];
        if header.len() < HEADER_LENGTH {
            return Err(ProtocolViolation::Truncated {
                needed: HEADER_LENGTH,
                remaining: header.len(),
            }
            .into());
        }
        header.advance(5);
        let body_length = primitives::read_int(&mut header)?;
        if body_length < 0 {
            return Err(ProtocolViolation::NegativeLength(body_length).into());
        }
        Ok(HEADER_LENGTH + body_length as usize)
    }

    fn split_frames(mut payload: Bytes) -> Result<Vec<Bytes>> {
        let mut frames = Vec::new();
        while !payload.is_empty() {
            if payload.len() < HEADER_LENGTH {
                return Err(ProtocolViolation::Truncated {
                    needed: HEADER_LENGTH,
                    remaining: payload.len(),
                }
                .into());
            }
            let mut header = &payload[5..HEADER_LENGTH];
            let body_length = primitives::read_int(&mut header)?;
            if body_length < 0 {
                return Err(ProtocolViolation::NegativeLength(body_length).into());
            }
            let frame_length = HEADER_LENGTH + body_length as usize;
            if payload.len() < frame_length {
                return Err(ProtocolViolation::Truncated {
                    needed: frame_length,
                    remaining: payload.len(),
                }
                .into());
            }
            frames.push(payload.split_to(frame_length));
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(segment: &Segment) -> Vec<u8> {
        let mut wire = Vec::new();
        SegmentCodec.encode(segment, &mut wire).unwrap();
        assert_eq!(wire.len(), SegmentCodec.encoded_size(segment));
        wire
    }

    fn frame_bytes(stream: i16, body: &[u8]) -> Bytes {
        let mut bytes = Vec::new();
        bytes.push(0x85);
        bytes.push(0x00);
        bytes.extend_from_slice(&stream.to_be_bytes());
        bytes.push(0x02);
        bytes.extend_from_slice(&(body.len() as i32).to_be_bytes());
        bytes.extend_from_slice(body);
        Bytes::from(bytes)
    }

    #[test]
    fn segment_round_trip() {
        let segment =
            Segment { payload: Bytes::from_static(b"some frame bytes"), self_contained: true };
        let wire = encode(&segment);

        let mut cursor: &[u8] = &wire;
        let decoded = SegmentCodec.decode(&mut cursor).unwrap();
        assert_eq!(decoded, segment);
        assert!(cursor.is_empty());
    }

    #[test]
    fn empty_segment_round_trip() {
        let segment = Segment { payload: Bytes::new(), self_contained: true };
        let wire = encode(&segment);
        assert_eq!(wire.len(), SEGMENT_HEADER_LENGTH + TRAILER_LENGTH);
        let decoded = SegmentCodec.decode(&mut &wire[..]).unwrap();
        assert_eq!(decoded, segment);
    }

    #[test]
    fn header_bits_are_little_endian_with_flag_at_bit_17() {
        let segment = Segment { payload: Bytes::from_static(&[0xAB; 0x1234]), self_contained: true };
        let wire = encode(&segment);
        // 0x1234 | (1 << 17) = 0x21234, little-endian 34 12 02
        assert_eq!(&wire[..3], &[0x34, 0x12, 0x02]);
    }

    #[test]
    fn oversized_payload_refused() {
        let segment =
            Segment { payload: Bytes::from(vec![0; MAX_PAYLOAD_LENGTH + 1]), self_contained: false };
        let mut wire = Vec::new();
        let err = SegmentCodec.encode(&segment, &mut wire).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::CodecError::Protocol(ProtocolViolation::SegmentTooLong(_))
        ));
        assert!(wire.is_empty());
    }

    #[test]
    fn corrupted_header_crc_detected() {
        let segment = Segment { payload: Bytes::from_static(b"payload"), self_contained: true };
        let mut wire = encode(&segment);
        wire[0] ^= 0x01;
        let err = SegmentCodec.decode(&mut &wire[..]).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::CodecError::Protocol(ProtocolViolation::HeaderCrcMismatch { .. })
        ));
    }

    #[test]
    fn corrupted_payload_crc_detected() {
        let segment = Segment { payload: Bytes::from_static(b"payload"), self_contained: true };
        let mut wire = encode(&segment);
        let payload_start = SEGMENT_HEADER_LENGTH;
        wire[payload_start] ^= 0x80;
        let err = SegmentCodec.decode(&mut &wire[..]).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::CodecError::Protocol(ProtocolViolation::PayloadCrcMismatch { .. })
        ));
    }

    #[test]
    fn self_contained_segment_yields_all_frames() {
        let first = frame_bytes(1, b"abc");
        let second = frame_bytes(2, b"");
        let mut combined = BytesMut::new();
        combined.extend_from_slice(&first);
        combined.extend_from_slice(&second);

        let mut accumulator = SegmentAccumulator::new();
        let frames = accumulator
            .push(Segment { payload: combined.freeze(), self_contained: true })
            .unwrap();
        assert_eq!(frames, vec![first, second]);
        assert!(!accumulator.has_partial());
    }

    #[test]
    fn large_frame_splits_and_reassembles() {
        let body = vec![0x5A; MAX_PAYLOAD_LENGTH + 1000];
        let frame = frame_bytes(9, &body);

        let segments = segment_frame(frame.clone());
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| !s.self_contained));
        assert_eq!(segments[0].payload.len(), MAX_PAYLOAD_LENGTH);

        let mut accumulator = SegmentAccumulator::new();
        let mut produced = Vec::new();
        for segment in segments {
            produced.extend(accumulator.push(segment).unwrap());
        }
        assert_eq!(produced, vec![frame]);
        assert!(!accumulator.has_partial());
    }

    #[test]
    fn small_frame_is_one_self_contained_segment() {
        let frame = frame_bytes(1, b"tiny");
        let segments = segment_frame(frame.clone());
        assert_eq!(segments.len(), 1);
        assert!(segments[0].self_contained);
        assert_eq!(segments[0].payload, frame);
    }

    #[test]
    fn segment_wire_round_trip_through_codec() {
        let frame = frame_bytes(3, b"body");
        let segments = segment_frame(frame.clone());

        let mut wire = Vec::new();
        for segment in &segments {
            SegmentCodec.encode(segment, &mut wire).unwrap();
        }

        let mut cursor: &[u8] = &wire;
        let mut accumulator = SegmentAccumulator::new();
        let mut produced = Vec::new();
        while !cursor.is_empty() {
            let segment = SegmentCodec.decode(&mut cursor).unwrap();
            produced.extend(accumulator.push(segment).unwrap());
        }
        assert_eq!(produced, vec![frame]);
    }
}
