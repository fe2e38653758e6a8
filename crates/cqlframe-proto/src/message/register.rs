//! Register (0x0B): subscribe the connection to server events.

use bytes::{Buf, BufMut};

use crate::{
    errors::{ProtocolViolation, Result},
    message::{Message, MessageCodec, Opcode, wrong_message},
    primitives,
};

/// The three server event classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Nodes joining or leaving the ring
    TopologyChange,
    /// Nodes going up or down
    StatusChange,
    /// Schema objects created, updated, or dropped
    SchemaChange,
}

impl EventType {
    /// Wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopologyChange => "TOPOLOGY_CHANGE",
            Self::StatusChange => "STATUS_CHANGE",
            Self::SchemaChange => "SCHEMA_CHANGE",
        }
    }

    /// Parse a wire string.
    pub fn parse(value: &str) -> Result<Self, ProtocolViolation> {
        match value {
            "TOPOLOGY_CHANGE" => Ok(Self::TopologyChange),
            "STATUS_CHANGE" => Ok(Self::StatusChange),
            "SCHEMA_CHANGE" => Ok(Self::SchemaChange),
            other => Err(ProtocolViolation::UnknownEventType(other.to_owned())),
        }
    }
}

/// An event subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    /// Event classes to subscribe to
    pub event_types: Vec<EventType>,
}

impl Register {
    /// Subscribe to every event class.
    #[must_use]
    pub fn all() -> Self {
        Self {
            event_types: vec![
                EventType::TopologyChange,
                EventType::StatusChange,
                EventType::SchemaChange,
            ],
        }
    }
}

/// Codec for Register.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterCodec;

impl MessageCodec for RegisterCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Register
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Register(register) = message else {
            return Err(wrong_message(Opcode::Register, message));
        };
        let names: Vec<String> =
            register.event_types.iter().map(|t| t.as_str().to_owned()).collect();
        primitives::write_string_list(dst, &names)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Register(register) = message else {
            return Err(wrong_message(Opcode::Register, message));
        };
        Ok(2 + register
            .event_types
            .iter()
            .map(|t| primitives::size_of_string(t.as_str()))
            .sum::<usize>())
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let names = primitives::read_string_list(src)?;
        let mut event_types = Vec::with_capacity(names.len());
        for name in &names {
            event_types.push(EventType::parse(name)?);
        }
        Ok(Message::Register(Register { event_types }))
    }
}
