//! Frame codec: the nine-byte header, envelopes, and compression hook.
//!
//! Header layout (Big Endian): version byte (direction in the high bit),
//! flags byte, stream id (signed short), opcode byte, body length (int).
//!
//! Encode builds the body in a scratch buffer: envelopes first (tracing id,
//! warnings, custom payload), then the message, then optional compression of
//! the whole region, so the caller's output buffer is only touched once the
//! entire frame is known good. Decode runs the same steps in reverse.
//!
//! # Invariants
//!
//! - Envelope flag bits are derived from envelope presence, so a decoded
//!   frame re-encodes with identical flags.
//! - The body length field always matches the bytes that follow it.
//! - Codec instances are immutable; one instance serves one
//!   `(version, role)` pair.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;
use uuid::Uuid;

use crate::{
    collections::OrderedMap,
    compression::{Compressor, wrap_failure},
    errors::{CodecError, ProtocolViolation, Result},
    message::{Message, Opcode},
    primitives,
    registry::{CodecRegistry, CodecRegistryBuilder, PeerRole},
    version::{Direction, ProtocolVersion},
};

/// Size of the frame header in bytes.
pub const HEADER_LENGTH: usize = 9;

/// Header flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Body is compressed.
    pub const COMPRESSED: Self = Self(0x01);
    /// Tracing requested (request) or tracing id present (response).
    pub const TRACING: Self = Self(0x02);
    /// A custom payload envelope precedes the body.
    pub const CUSTOM_PAYLOAD: Self = Self(0x04);
    /// A warnings envelope precedes the body.
    pub const WARNING: Self = Self(0x08);
    /// The client opts into a beta protocol version.
    pub const USE_BETA: Self = Self(0x10);

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Interpret a wire byte; unknown bits are preserved verbatim.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// The wire byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// True when every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set every bit of `other`.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Clear every bit of `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

/// A complete protocol frame.
///
/// Envelope fields and their flag bits are kept consistent by the
/// constructors and mutators; `encode` re-derives the envelope bits, so a
/// round trip preserves `flags` exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Protocol version of the frame
    pub version: ProtocolVersion,
    /// Request or response
    pub direction: Direction,
    /// Header flag bits
    pub flags: FrameFlags,
    /// Stream id; negative values are reserved for server events
    pub stream: i16,
    /// Tracing session id (responses to traced requests)
    pub tracing_id: Option<Uuid>,
    /// Server warnings (v4 and later responses)
    pub warnings: Vec<String>,
    /// Opaque key/value payload (v4 and later); values may be null
    pub custom_payload: OrderedMap<String, Option<Bytes>>,
    /// The message body
    pub message: Message,
}

impl Frame {
    /// A request frame with no envelopes.
    #[must_use]
    pub fn request(version: ProtocolVersion, stream: i16, message: Message) -> Self {
        Self {
            version,
            direction: Direction::Request,
            flags: FrameFlags::empty(),
            stream,
            tracing_id: None,
            warnings: Vec::new(),
            custom_payload: OrderedMap::new(),
            message,
        }
    }

    /// A response frame with no envelopes.
    #[must_use]
    pub fn response(version: ProtocolVersion, stream: i16, message: Message) -> Self {
        Self { direction: Direction::Response, ..Self::request(version, stream, message) }
    }

    /// The opcode of the carried message.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.message.opcode()
    }

    /// Attach a tracing id and set the TRACING flag.
    #[must_use]
    pub fn with_tracing_id(mut self, tracing_id: Uuid) -> Self {
        self.tracing_id = Some(tracing_id);
        self.flags = self.flags.with(FrameFlags::TRACING);
        self
    }

    /// Attach warnings and set the WARNING flag.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.flags = if warnings.is_empty() {
            self.flags.without(FrameFlags::WARNING)
        } else {
            self.flags.with(FrameFlags::WARNING)
        };
        self.warnings = warnings;
        self
    }

    /// Attach a custom payload and set the CUSTOM_PAYLOAD flag.
    #[must_use]
    pub fn with_custom_payload(mut self, payload: OrderedMap<String, Option<Bytes>>) -> Self {
        self.flags = if payload.is_empty() {
            self.flags.without(FrameFlags::CUSTOM_PAYLOAD)
        } else {
            self.flags.with(FrameFlags::CUSTOM_PAYLOAD)
        };
        self.custom_payload = payload;
        self
    }
}

/// Configures and builds a [`FrameCodec`].
pub struct FrameCodecBuilder {
    version: ProtocolVersion,
    role: PeerRole,
    registry: Option<CodecRegistryBuilder>,
    compressor: Option<Box<dyn Compressor>>,
    beta: bool,
}

impl FrameCodecBuilder {
    /// Use a custom registry instead of the default codec set.
    #[must_use]
    pub fn registry(mut self, registry: CodecRegistryBuilder) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Compress frame bodies with this adapter when the COMPRESSED flag is
    /// set, and decompress incoming flagged bodies.
    #[must_use]
    pub fn compression(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    /// Accept and emit the USE_BETA flag.
    #[must_use]
    pub fn allow_beta(mut self) -> Self {
        self.beta = true;
        self
    }

    /// Freeze the codec.
    pub fn build(self) -> Result<FrameCodec> {
        let registry = self
            .registry
            .unwrap_or_else(|| CodecRegistry::builder(self.version, self.role))
            .build()?;
        Ok(FrameCodec {
            version: self.version,
            registry,
            compressor: self.compressor,
            beta: self.beta,
        })
    }
}

/// Symmetric frame encoder/decoder for one `(version, role)` pair.
///
/// Immutable after construction; share freely across threads.
pub struct FrameCodec {
    version: ProtocolVersion,
    registry: CodecRegistry,
    compressor: Option<Box<dyn Compressor>>,
    beta: bool,
}

impl FrameCodec {
    /// Builder for a client-side codec (encodes requests).
    #[must_use]
    pub fn client(version: ProtocolVersion) -> FrameCodecBuilder {
        FrameCodecBuilder {
            version,
            role: PeerRole::Client,
            registry: None,
            compressor: None,
            beta: false,
        }
    }

    /// Builder for a server-side codec (encodes responses).
    #[must_use]
    pub fn server(version: ProtocolVersion) -> FrameCodecBuilder {
        FrameCodecBuilder {
            version,
            role: PeerRole::Server,
            registry: None,
            compressor: None,
            beta: false,
        }
    }

    /// The version this codec speaks.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    fn check_envelopes(&self, frame: &Frame) -> Result<()> {
        if frame.version != self.version {
            return Err(CodecError::invalid(format!(
                "frame version {} does not match codec version {}",
                frame.version, self.version
            )));
        }
        if frame.tracing_id.is_some() && frame.direction == Direction::Request {
            return Err(CodecError::invalid("a request cannot carry a tracing id"));
        }
        if !frame.warnings.is_empty() {
            if frame.direction == Direction::Request {
                return Err(CodecError::invalid("a request cannot carry warnings"));
            }
            if !self.version.supports_envelopes() {
                return Err(CodecError::invalid(format!(
                    "warnings require protocol v4 or later, have {}",
                    self.version
                )));
            }
        }
        if !frame.custom_payload.is_empty() && !self.version.supports_envelopes() {
            return Err(CodecError::invalid(format!(
                "custom payloads require protocol v4 or later, have {}",
                self.version
            )));
        }
        if frame.flags.contains(FrameFlags::USE_BETA) && !self.beta {
            return Err(CodecError::invalid(
                "USE_BETA flag set but the codec does not allow beta versions",
            ));
        }
        Ok(())
    }

    /// Flag bits the encoder will put on the wire for `frame`.
    fn wire_flags(&self, frame: &Frame) -> FrameFlags {
        let mut flags = frame
            .flags
            .without(FrameFlags::TRACING)
            .without(FrameFlags::WARNING)
            .without(FrameFlags::CUSTOM_PAYLOAD);
        if frame.direction == Direction::Request && frame.flags.contains(FrameFlags::TRACING) {
            // On a request the bit is a plea, not an envelope marker.
            flags = flags.with(FrameFlags::TRACING);
        }
        if frame.tracing_id.is_some() {
            flags = flags.with(FrameFlags::TRACING);
        }
        if !frame.warnings.is_empty() {
            flags = flags.with(FrameFlags::WARNING);
        }
        if !frame.custom_payload.is_empty() {
            flags = flags.with(FrameFlags::CUSTOM_PAYLOAD);
        }
        flags
    }

    fn encode_envelopes(&self, frame: &Frame, body: &mut BytesMut) -> Result<()> {
        if let Some(tracing_id) = &frame.tracing_id {
            primitives::write_uuid(body, tracing_id);
        }
        if !frame.warnings.is_empty() {
            primitives::write_string_list(body, &frame.warnings)?;
        }
        if !frame.custom_payload.is_empty() {
            primitives::write_bytes_map(body, &frame.custom_payload)?;
        }
        Ok(())
    }

    fn envelope_size(&self, frame: &Frame) -> Result<usize> {
        let mut size = 0;
        if frame.tracing_id.is_some() {
            size += primitives::SIZE_OF_UUID;
        }
        if !frame.warnings.is_empty() {
            size += primitives::size_of_string_list(&frame.warnings);
        }
        if !frame.custom_payload.is_empty() {
            size += primitives::size_of_bytes_map(&frame.custom_payload);
        }
        Ok(size)
    }

    /// Encode a frame into `dst`.
    ///
    /// The output buffer is only advanced after the whole frame has been
    /// produced; a failing encode leaves it untouched.
    pub fn encode<B: BufMut + ?Sized>(&self, frame: &Frame, dst: &mut B) -> Result<()> {
        self.check_envelopes(frame)?;
        let flags = self.wire_flags(frame);

        let codec = self.registry.encoder(frame.opcode())?;
        let body_size = self.envelope_size(frame)? + codec.encoded_size(&frame.message)?;
        let mut body = BytesMut::with_capacity(body_size);
        self.encode_envelopes(frame, &mut body)?;
        codec.encode(&frame.message, &mut body)?;
        debug_assert_eq!(body.len(), body_size);

        let (flags, body) = if flags.contains(FrameFlags::COMPRESSED) {
            let Some(compressor) = &self.compressor else {
                return Err(CodecError::invalid(
                    "COMPRESSED flag set but no compressor is configured",
                ));
            };
            let compressed = compressor
                .compress(&body)
                .map_err(|source| wrap_failure(compressor.as_ref(), source))?;
            (flags, compressed)
        } else {
            (flags, body.freeze())
        };

        let length = i32::try_from(body.len())
            .map_err(|_| CodecError::invalid(format!("body of {} bytes exceeds int", body.len())))?;

        primitives::write_byte(dst, frame.direction.version_byte(frame.version));
        primitives::write_byte(dst, flags.to_byte());
        dst.put_i16(frame.stream);
        primitives::write_byte(dst, frame.opcode().to_u8());
        primitives::write_int(dst, length);
        dst.put_slice(&body);

        trace!(
            version = %frame.version,
            opcode = ?frame.opcode(),
            stream = frame.stream,
            length,
            "encoded frame"
        );
        Ok(())
    }

    /// Exact number of bytes [`FrameCodec::encode`] will write for an
    /// uncompressed frame.
    ///
    /// Compressed sizes depend on the adapter's output and cannot be
    /// predicted; asking for one is refused.
    pub fn encoded_size(&self, frame: &Frame) -> Result<usize> {
        self.check_envelopes(frame)?;
        if frame.flags.contains(FrameFlags::COMPRESSED) {
            return Err(CodecError::invalid(
                "the size of a compressed frame is not known before compression",
            ));
        }
        let codec = self.registry.encoder(frame.opcode())?;
        Ok(HEADER_LENGTH + self.envelope_size(frame)? + codec.encoded_size(&frame.message)?)
    }

    /// Decode one frame from `src`.
    ///
    /// On failure the cursor position is unspecified and the frame must be
    /// discarded; wire-level errors mean the connection is no longer usable.
    pub fn decode<B: Buf + ?Sized>(&self, src: &mut B) -> Result<Frame> {
        let version_byte = primitives::read_byte(src)?;
        let (direction, version) = Direction::split_version_byte(version_byte)?;
        if version != self.version {
            return Err(ProtocolViolation::VersionMismatch {
                expected: self.version,
                actual: version,
            }
            .into());
        }

        let flags = FrameFlags::from_byte(primitives::read_byte(src)?);
        if src.remaining() < 2 {
            return Err(
                ProtocolViolation::Truncated { needed: 2, remaining: src.remaining() }.into()
            );
        }
        let stream = src.get_i16();
        let opcode = Opcode::from_u8(primitives::read_byte(src)?)?;
        let length = primitives::read_int(src)?;
        if length < 0 {
            return Err(ProtocolViolation::NegativeLength(length).into());
        }
        let length = length as usize;
        if src.remaining() < length {
            return Err(
                ProtocolViolation::Truncated { needed: length, remaining: src.remaining() }.into()
            );
        }
        let raw_body = src.copy_to_bytes(length);

        let body = if flags.contains(FrameFlags::COMPRESSED) {
            let Some(compressor) = &self.compressor else {
                return Err(ProtocolViolation::CompressedWithoutCompressor.into());
            };
            compressor
                .decompress(&raw_body)
                .map_err(|source| wrap_failure(compressor.as_ref(), source))?
        } else {
            raw_body
        };
        let mut body = &body[..];

        let tracing_id = if direction == Direction::Response && flags.contains(FrameFlags::TRACING)
        {
            Some(primitives::read_uuid(&mut body)?)
        } else {
            None
        };
        let warnings = if flags.contains(FrameFlags::WARNING) {
            primitives::read_string_list(&mut body)?
        } else {
            Vec::new()
        };
        let custom_payload = if flags.contains(FrameFlags::CUSTOM_PAYLOAD) {
            primitives::read_bytes_map(&mut body)?
        } else {
            OrderedMap::new()
        };

        let codec = self.registry.decoder(opcode)?;
        let message = codec.decode(&mut body)?;

        trace!(%version, ?opcode, stream, length, "decoded frame");
        Ok(Frame {
            version,
            direction,
            flags,
            stream,
            tracing_id,
            warnings,
            custom_payload,
            message,
        })
    }
}

impl std::fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCodec")
            .field("version", &self.version)
            .field("registry", &self.registry)
            .field("compression", &self.compressor.as_ref().map(|c| c.algorithm()))
            .field("beta", &self.beta)
            .finish()
    }
}
