//! Version-aware wire codec for the CQL native protocol.
//!
//! `cqlframe-proto` translates between typed [`Message`] values and the
//! frame payload bytes of protocol versions v3, v4, and v5 plus the DSE
//! dialects. It is purely translational: no transport, no query execution,
//! no value interpretation beyond raw bytes.
//!
//! The layers, bottom up:
//!
//! - [`primitives`]: read/write/size functions for the wire primitive
//!   types, generic over [`bytes::Buf`] / [`bytes::BufMut`].
//! - [`message`]: one typed payload and one [`message::MessageCodec`] per
//!   opcode; Result, Error, and Event dispatch inner sub-codec registries.
//! - [`registry`]: per-`(version, role)` opcode dispatch tables, validated
//!   at build time.
//! - [`frame`]: the nine-byte header, tracing/warning/custom-payload
//!   envelopes, and the compression hook.
//! - [`segment`]: v5 self-delimiting transport segments with CRC-24/CRC-32
//!   integrity.
//!
//! Everything is synchronous and stateless per call; codecs are immutable
//! after construction and safe to share across threads.
//!
//! # Example
//!
//! ```
//! use cqlframe_proto::{
//!     Frame, FrameCodec, Message, ProtocolVersion,
//!     message::{params::Consistency, query::Query},
//! };
//!
//! let client = FrameCodec::client(ProtocolVersion::V4).build()?;
//! let server = FrameCodec::server(ProtocolVersion::V4).build()?;
//!
//! let frame = Frame::request(
//!     ProtocolVersion::V4,
//!     1,
//!     Message::Query(Query::new("SELECT cluster_name FROM system.local", Consistency::One)),
//! );
//!
//! let mut wire = Vec::new();
//! client.encode(&frame, &mut wire)?;
//! assert_eq!(wire.len(), client.encoded_size(&frame)?);
//!
//! let decoded = server.decode(&mut wire.as_slice())?;
//! assert_eq!(decoded, frame);
//! # Ok::<(), cqlframe_proto::CodecError>(())
//! ```

pub mod collections;
pub mod compression;
pub mod crc;
pub mod errors;
pub mod frame;
pub mod message;
pub mod primitives;
pub mod registry;
pub mod segment;
pub mod version;

pub use collections::OrderedMap;
pub use compression::Compressor;
pub use errors::{CodecError, ProtocolViolation, Result};
pub use frame::{Frame, FrameCodec, FrameFlags, HEADER_LENGTH};
pub use message::{Message, Opcode};
pub use registry::{CodecRegistry, PeerRole};
pub use segment::{Segment, SegmentAccumulator, SegmentCodec};
pub use version::{Direction, ProtocolVersion};
