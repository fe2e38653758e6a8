//! Options (0x05) and Supported (0x06).
//!
//! Options has no body; Supported answers with a `[string multimap]` of the
//! server's startup options and their accepted values.

use bytes::{Buf, BufMut};

use crate::{
    collections::OrderedMap,
    errors::Result,
    message::{Message, MessageCodec, Opcode, wrong_message},
    primitives,
};

/// Server-advertised startup options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Supported {
    /// Option name to accepted values
    pub options: OrderedMap<String, Vec<String>>,
}

/// Codec for Options (zero-byte body).
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsCodec;

impl MessageCodec for OptionsCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Options
    }

    fn encode(&self, message: &Message, _dst: &mut dyn BufMut) -> Result<()> {
        match message {
            Message::Options => Ok(()),
            other => Err(wrong_message(Opcode::Options, other)),
        }
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        match message {
            Message::Options => Ok(0),
            other => Err(wrong_message(Opcode::Options, other)),
        }
    }

    fn decode(&self, _src: &mut dyn Buf) -> Result<Message> {
        Ok(Message::Options)
    }
}

/// Codec for Supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportedCodec;

impl MessageCodec for SupportedCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Supported
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Supported(supported) = message else {
            return Err(wrong_message(Opcode::Supported, message));
        };
        primitives::write_string_multimap(dst, &supported.options)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Supported(supported) = message else {
            return Err(wrong_message(Opcode::Supported, message));
        };
        Ok(primitives::size_of_string_multimap(&supported.options))
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let options = primitives::read_string_multimap(src)?;
        Ok(Message::Supported(Supported { options }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_round_trip() {
        let message = Message::Supported(Supported {
            options: [
                ("CQL_VERSION".to_owned(), vec!["3.0.0".to_owned(), "3.4.5".to_owned()]),
                ("COMPRESSION".to_owned(), vec!["lz4".to_owned(), "snappy".to_owned()]),
                ("PROTOCOL_VERSIONS".to_owned(), vec![]),
            ]
            .into_iter()
            .collect(),
        });

        let mut wire = Vec::new();
        SupportedCodec.encode(&message, &mut wire).unwrap();
        assert_eq!(wire.len(), SupportedCodec.encoded_size(&message).unwrap());
        assert_eq!(SupportedCodec.decode(&mut &wire[..]).unwrap(), message);
    }

    #[test]
    fn options_has_empty_body() {
        let mut wire = Vec::new();
        OptionsCodec.encode(&Message::Options, &mut wire).unwrap();
        assert!(wire.is_empty());
        assert_eq!(OptionsCodec.decode(&mut &wire[..]).unwrap(), Message::Options);
    }
}
