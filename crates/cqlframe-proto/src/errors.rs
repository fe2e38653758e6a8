//! Error types for the CQL wire codec.
//!
//! Two layers: [`ProtocolViolation`] describes malformed bytes coming off the
//! wire (fatal for the connection per the native protocol rules), while
//! [`CodecError`] is the failure type of every codec call and additionally
//! covers encode-time misuse, unregistered opcodes, and compression adapter
//! failures.
//!
//! We avoid `std::io::Error` for codec logic: the codec never performs I/O,
//! and typed variants let the transport decide what is fatal.

use thiserror::Error;

use crate::{message::Opcode, version::ProtocolVersion};

/// Result alias used throughout the crate.
pub type Result<T, E = CodecError> = std::result::Result<T, E>;

/// Malformed bytes on the wire.
///
/// Any of these means the stream can no longer be trusted; the transport is
/// expected to close the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Input ended before a fixed-size or length-prefixed element
    #[error("truncated input: needed {needed} byte(s), {remaining} available")]
    Truncated {
        /// Bytes the current element requires
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// A `[string]` or `[long string]` holds invalid UTF-8
    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    /// A length prefix that must be non-negative was negative
    #[error("negative length prefix {0}")]
    NegativeLength(i32),

    /// An `[inet]` length byte outside {4, 16}
    #[error("inet address length {0} (expected 4 or 16)")]
    InvalidInetLength(u8),

    /// An `[inet]` port outside the unsigned 16-bit range
    #[error("inet port {0} out of range")]
    InvalidPort(i32),

    /// Version byte (with the direction bit masked off) not known
    #[error("unknown protocol version {0:#04x}")]
    UnknownVersion(u8),

    /// Frame version differs from the version this codec was built for
    #[error("frame version {actual} does not match negotiated {expected}")]
    VersionMismatch {
        /// Version the codec was built for
        expected: ProtocolVersion,
        /// Version read from the frame header
        actual: ProtocolVersion,
    },

    /// Opcode byte not defined by the protocol
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// Consistency level short not defined by the protocol
    #[error("unknown consistency level {0:#06x}")]
    UnknownConsistency(u16),

    /// Result kind int not defined by the protocol
    #[error("unknown result kind {0}")]
    UnknownResultKind(i32),

    /// Error code int not defined by the protocol
    #[error("unknown error code {0:#010x}")]
    UnknownErrorCode(i32),

    /// Event type string not defined by the protocol
    #[error("unknown event type {0:?}")]
    UnknownEventType(String),

    /// Schema change type string not defined by the protocol
    #[error("unknown schema change type {0:?}")]
    UnknownSchemaChangeType(String),

    /// Schema change target string not defined by the protocol
    #[error("unknown schema change target {0:?}")]
    UnknownSchemaChangeTarget(String),

    /// Topology or status change string not defined by the protocol
    #[error("unknown {kind} change {value:?}")]
    UnknownChange {
        /// "topology" or "status"
        kind: &'static str,
        /// The string read from the wire
        value: String,
    },

    /// Batch statement kind byte outside {0, 1}
    #[error("unknown batch statement kind {0:#04x}")]
    UnknownBatchStatementKind(u8),

    /// Batch kind byte outside {0, 1, 2}
    #[error("unknown batch kind {0:#04x}")]
    UnknownBatchKind(u8),

    /// A batch arrived with a statement count of zero
    #[error("batch contains no statements")]
    EmptyBatch,

    /// Data type option id not defined by the protocol
    #[error("unknown data type option {0:#06x}")]
    UnknownTypeOption(u16),

    /// Nested collection/UDT/tuple types deeper than the decoder allows
    #[error("type nesting exceeds depth limit {0}")]
    TypeDepthExceeded(usize),

    /// The COMPRESSED flag is set but the codec has no compressor
    #[error("COMPRESSED flag set but no compressor is configured")]
    CompressedWithoutCompressor,

    /// A message decoded to a version-gated value the version cannot carry
    #[error("value not valid before protocol v{min_version}: {what}")]
    VersionGatedValue {
        /// Human-readable description of the offending element
        what: &'static str,
        /// First version code that may carry it
        min_version: u8,
    },

    /// Segment header CRC-24 did not match
    #[error("segment header CRC mismatch: computed {computed:#08x}, received {received:#08x}")]
    HeaderCrcMismatch {
        /// CRC computed over the received header bytes
        computed: u32,
        /// CRC carried by the segment
        received: u32,
    },

    /// Segment payload CRC-32 did not match
    #[error("segment payload CRC mismatch: computed {computed:#010x}, received {received:#010x}")]
    PayloadCrcMismatch {
        /// CRC computed over the received payload bytes
        computed: u32,
        /// CRC carried by the segment
        received: u32,
    },

    /// Segment payload length field exceeds the 17-bit maximum
    #[error("segment payload length {0} exceeds maximum")]
    SegmentTooLong(usize),
}

/// Failure type of every codec operation.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Malformed bytes; the connection must be closed
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// The message cannot be represented under the requested version.
    ///
    /// Raised at encode time, before any output bytes are written.
    #[error("cannot encode message: {reason}")]
    InvalidArgument {
        /// Why the encoding was refused
        reason: String,
    },

    /// No codec registered for this opcode under this version
    #[error("no codec registered for {opcode:?} in protocol {version}")]
    Unsupported {
        /// Opcode that failed dispatch
        opcode: Opcode,
        /// Version of the registry consulted
        version: ProtocolVersion,
    },

    /// The compression adapter failed; wraps the adapter's cause
    #[error("compression adapter {algorithm:?} failed: {source}")]
    Compression {
        /// Algorithm name reported by the adapter
        algorithm: &'static str,
        /// Underlying adapter error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CodecError {
    /// Shorthand for an [`CodecError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument { reason: reason.into() }
    }

    /// True when the error means the connection can no longer be used.
    ///
    /// Encode-time refusals ([`CodecError::InvalidArgument`] and
    /// [`CodecError::Unsupported`]) leave the connection healthy; wire-level
    /// violations and compression failures do not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Compression { .. })
    }
}
