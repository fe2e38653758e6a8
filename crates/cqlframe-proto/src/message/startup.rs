//! Startup (0x01) and Ready (0x02).
//!
//! Startup carries a `[string map]` of connection options and must be the
//! first message on a connection; the server answers Ready (empty body) or
//! Authenticate.

use bytes::{Buf, BufMut};

use crate::{
    collections::OrderedMap,
    errors::Result,
    message::{Message, MessageCodec, Opcode, wrong_message},
    primitives,
};

/// Connection initialization options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Startup {
    /// Option map; `CQL_VERSION` is mandatory
    pub options: OrderedMap<String, String>,
}

impl Startup {
    /// Mandatory CQL version key.
    pub const CQL_VERSION: &'static str = "CQL_VERSION";
    /// Optional compression algorithm key.
    pub const COMPRESSION: &'static str = "COMPRESSION";
    /// Optional no-compact key.
    pub const NO_COMPACT: &'static str = "NO_COMPACT";
    /// Optional throw-on-overload key.
    pub const THROW_ON_OVERLOAD: &'static str = "THROW_ON_OVERLOAD";

    /// Startup advertising CQL version 3.0.0 and nothing else.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: [(Self::CQL_VERSION.to_owned(), "3.0.0".to_owned())].into_iter().collect(),
        }
    }

    /// Startup that additionally negotiates a compression algorithm.
    #[must_use]
    pub fn with_compression(algorithm: &str) -> Self {
        let mut startup = Self::new();
        startup.options.insert(Self::COMPRESSION.to_owned(), algorithm.to_owned());
        startup
    }
}

impl Default for Startup {
    fn default() -> Self {
        Self::new()
    }
}

/// Codec for Startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartupCodec;

impl MessageCodec for StartupCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Startup
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Startup(startup) = message else {
            return Err(wrong_message(Opcode::Startup, message));
        };
        primitives::write_string_map(dst, &startup.options)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Startup(startup) = message else {
            return Err(wrong_message(Opcode::Startup, message));
        };
        Ok(primitives::size_of_string_map(&startup.options))
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let options = primitives::read_string_map(src)?;
        Ok(Message::Startup(Startup { options }))
    }
}

/// Codec for Ready (zero-byte body).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadyCodec;

impl MessageCodec for ReadyCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Ready
    }

    fn encode(&self, message: &Message, _dst: &mut dyn BufMut) -> Result<()> {
        match message {
            Message::Ready => Ok(()),
            other => Err(wrong_message(Opcode::Ready, other)),
        }
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        match message {
            Message::Ready => Ok(0),
            other => Err(wrong_message(Opcode::Ready, other)),
        }
    }

    fn decode(&self, _src: &mut dyn Buf) -> Result<Message> {
        Ok(Message::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_round_trip() {
        let message = Message::Startup(Startup::with_compression("lz4"));

        let mut wire = Vec::new();
        StartupCodec.encode(&message, &mut wire).unwrap();
        assert_eq!(wire.len(), StartupCodec.encoded_size(&message).unwrap());

        let decoded = StartupCodec.decode(&mut &wire[..]).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn empty_option_map_is_short_zero() {
        let message = Message::Startup(Startup { options: OrderedMap::new() });
        let mut wire = Vec::new();
        StartupCodec.encode(&message, &mut wire).unwrap();
        assert_eq!(wire, [0, 0]);
    }

    #[test]
    fn ready_has_empty_body() {
        let mut wire = Vec::new();
        ReadyCodec.encode(&Message::Ready, &mut wire).unwrap();
        assert!(wire.is_empty());
        assert_eq!(ReadyCodec.encoded_size(&Message::Ready).unwrap(), 0);
        assert_eq!(ReadyCodec.decode(&mut &wire[..]).unwrap(), Message::Ready);
    }

    #[test]
    fn mismatched_message_refused() {
        let mut wire = Vec::new();
        assert!(StartupCodec.encode(&Message::Ready, &mut wire).is_err());
        assert!(wire.is_empty());
    }
}
