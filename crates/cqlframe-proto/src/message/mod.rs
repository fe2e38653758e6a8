//! Typed messages and their per-opcode codecs.
//!
//! A [`Message`] is a tagged variant over the frame opcode; payload structs
//! are immutable plain data. Codecs implement [`MessageCodec`] and are
//! constructed once per `(version, opcode)` pair when a registry is built.
//! Result, Error, and Event dispatch a second lookup on the discriminator
//! that leads their payload.
//!
//! # Invariants
//!
//! - Each variant maps to exactly one opcode ([`Message::opcode`]).
//! - For every codec: `decode(encode(m)) == m` under the codec's version and
//!   `encode(m).len() == encoded_size(m)`, field order identical in both.

pub mod auth;
pub mod batch;
pub mod error;
pub mod event;
pub mod metadata;
pub mod options;
pub mod params;
pub mod prepare;
pub mod query;
pub mod register;
pub mod result;
pub mod schema_change;
pub mod startup;

use std::fmt;

use bytes::{Buf, BufMut};

use crate::errors::{CodecError, ProtocolViolation, Result};

/// Single-byte message identifier in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Opcode {
    Error,
    Startup,
    Ready,
    Authenticate,
    Options,
    Supported,
    Query,
    Result,
    Prepare,
    Execute,
    Register,
    Event,
    Batch,
    AuthChallenge,
    AuthResponse,
    AuthSuccess,
}

impl Opcode {
    /// Every opcode, in wire-value order.
    pub const ALL: [Self; 16] = [
        Self::Error,
        Self::Startup,
        Self::Ready,
        Self::Authenticate,
        Self::Options,
        Self::Supported,
        Self::Query,
        Self::Result,
        Self::Prepare,
        Self::Execute,
        Self::Register,
        Self::Event,
        Self::Batch,
        Self::AuthChallenge,
        Self::AuthResponse,
        Self::AuthSuccess,
    ];

    /// Wire value.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Error => 0x00,
            Self::Startup => 0x01,
            Self::Ready => 0x02,
            Self::Authenticate => 0x03,
            Self::Options => 0x05,
            Self::Supported => 0x06,
            Self::Query => 0x07,
            Self::Result => 0x08,
            Self::Prepare => 0x09,
            Self::Execute => 0x0A,
            Self::Register => 0x0B,
            Self::Event => 0x0C,
            Self::Batch => 0x0D,
            Self::AuthChallenge => 0x0E,
            Self::AuthResponse => 0x0F,
            Self::AuthSuccess => 0x10,
        }
    }

    /// Parse a wire value.
    pub fn from_u8(byte: u8) -> Result<Self, ProtocolViolation> {
        Ok(match byte {
            0x00 => Self::Error,
            0x01 => Self::Startup,
            0x02 => Self::Ready,
            0x03 => Self::Authenticate,
            0x05 => Self::Options,
            0x06 => Self::Supported,
            0x07 => Self::Query,
            0x08 => Self::Result,
            0x09 => Self::Prepare,
            0x0A => Self::Execute,
            0x0B => Self::Register,
            0x0C => Self::Event,
            0x0D => Self::Batch,
            0x0E => Self::AuthChallenge,
            0x0F => Self::AuthResponse,
            0x10 => Self::AuthSuccess,
            other => return Err(ProtocolViolation::UnknownOpcode(other)),
        })
    }

    /// True for opcodes that travel client-to-server.
    #[must_use]
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            Self::Startup
                | Self::Options
                | Self::Query
                | Self::Prepare
                | Self::Execute
                | Self::Register
                | Self::Batch
                | Self::AuthResponse
        )
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Server-side failure report
    Error(error::ErrorBody),
    /// Connection initialization options
    Startup(startup::Startup),
    /// Server is ready for queries
    Ready,
    /// Server requests authentication
    Authenticate(auth::Authenticate),
    /// Ask the server for its supported options
    Options,
    /// Supported options reply
    Supported(options::Supported),
    /// Raw CQL query
    Query(query::Query),
    /// Result of Query, Prepare, Execute, or Batch
    Result(result::ResultBody),
    /// Prepare a statement
    Prepare(prepare::Prepare),
    /// Execute a prepared statement
    Execute(prepare::Execute),
    /// Subscribe to server events
    Register(register::Register),
    /// Server-pushed event
    Event(event::Event),
    /// Batched statements
    Batch(batch::Batch),
    /// SASL challenge
    AuthChallenge(auth::AuthChallenge),
    /// SASL response
    AuthResponse(auth::AuthResponse),
    /// SASL success token
    AuthSuccess(auth::AuthSuccess),
}

impl Message {
    /// The opcode this message travels under.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Error(_) => Opcode::Error,
            Self::Startup(_) => Opcode::Startup,
            Self::Ready => Opcode::Ready,
            Self::Authenticate(_) => Opcode::Authenticate,
            Self::Options => Opcode::Options,
            Self::Supported(_) => Opcode::Supported,
            Self::Query(_) => Opcode::Query,
            Self::Result(_) => Opcode::Result,
            Self::Prepare(_) => Opcode::Prepare,
            Self::Execute(_) => Opcode::Execute,
            Self::Register(_) => Opcode::Register,
            Self::Event(_) => Opcode::Event,
            Self::Batch(_) => Opcode::Batch,
            Self::AuthChallenge(_) => Opcode::AuthChallenge,
            Self::AuthResponse(_) => Opcode::AuthResponse,
            Self::AuthSuccess(_) => Opcode::AuthSuccess,
        }
    }
}

/// A codec for one opcode under one protocol version.
///
/// Implementations are immutable after construction and safe to share across
/// threads. Buffers are borrowed for the duration of a call only.
pub trait MessageCodec: fmt::Debug + Send + Sync {
    /// Opcode this codec serves.
    fn opcode(&self) -> Opcode;

    /// Encode `message` into `dst` in strict wire order.
    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()>;

    /// Exact number of bytes [`MessageCodec::encode`] will write.
    fn encoded_size(&self, message: &Message) -> Result<usize>;

    /// Decode one message body from `src`.
    fn decode(&self, src: &mut dyn Buf) -> Result<Message>;
}

/// Refusal for a codec handed a message of a different opcode.
pub(crate) fn wrong_message(expected: Opcode, got: &Message) -> CodecError {
    CodecError::invalid(format!(
        "codec for {expected:?} cannot encode a {:?} message",
        got.opcode()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trip() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::from_u8(opcode.to_u8()), Ok(opcode));
        }
    }

    #[test]
    fn opcode_4_is_reserved() {
        assert_eq!(Opcode::from_u8(0x04), Err(ProtocolViolation::UnknownOpcode(0x04)));
        assert_eq!(Opcode::from_u8(0x11), Err(ProtocolViolation::UnknownOpcode(0x11)));
    }

    #[test]
    fn request_response_split_is_total() {
        let requests: Vec<_> = Opcode::ALL.iter().filter(|o| o.is_request()).collect();
        assert_eq!(requests.len(), 8);
    }
}
