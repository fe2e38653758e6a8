//! Event (0x0C): server-initiated notifications.
//!
//! Body: `event_type:string` followed by a type-specific payload. The codec
//! installs one sub-codec entry per event type and dispatches a second
//! lookup after the opcode dispatch, mirroring how Result and Error handle
//! their own discriminators.

use std::{collections::HashMap, net::SocketAddr};

use bytes::{Buf, BufMut};

use crate::{
    errors::{CodecError, ProtocolViolation, Result},
    message::{
        Message, MessageCodec, Opcode, register::EventType, schema_change::SchemaChange,
        wrong_message,
    },
    primitives,
    version::ProtocolVersion,
};

/// Ring membership change kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyChangeType {
    /// A node joined the ring
    NewNode,
    /// A node left the ring
    RemovedNode,
    /// A node changed tokens
    MovedNode,
}

impl TopologyChangeType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NewNode => "NEW_NODE",
            Self::RemovedNode => "REMOVED_NODE",
            Self::MovedNode => "MOVED_NODE",
        }
    }

    fn parse(value: &str) -> Result<Self, ProtocolViolation> {
        match value {
            "NEW_NODE" => Ok(Self::NewNode),
            "REMOVED_NODE" => Ok(Self::RemovedNode),
            "MOVED_NODE" => Ok(Self::MovedNode),
            other => {
                Err(ProtocolViolation::UnknownChange { kind: "topology", value: other.to_owned() })
            }
        }
    }
}

/// Node liveness change kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChangeType {
    /// Node is reachable again
    Up,
    /// Node stopped responding
    Down,
}

impl StatusChangeType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }

    fn parse(value: &str) -> Result<Self, ProtocolViolation> {
        match value {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            other => {
                Err(ProtocolViolation::UnknownChange { kind: "status", value: other.to_owned() })
            }
        }
    }
}

/// A server event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Ring membership changed
    TopologyChange {
        /// What happened
        change: TopologyChangeType,
        /// The node's RPC address
        address: SocketAddr,
    },
    /// Node liveness changed
    StatusChange {
        /// What happened
        change: StatusChangeType,
        /// The node's RPC address
        address: SocketAddr,
    },
    /// Schema changed
    SchemaChange(SchemaChange),
}

impl Event {
    /// The event class this payload belongs to.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::TopologyChange { .. } => EventType::TopologyChange,
            Self::StatusChange { .. } => EventType::StatusChange,
            Self::SchemaChange(_) => EventType::SchemaChange,
        }
    }
}

/// Function-pair entry of the inner event registry.
struct EventSubCodec {
    encode: fn(&Event, &mut dyn BufMut, ProtocolVersion) -> Result<()>,
    encoded_size: fn(&Event, ProtocolVersion) -> Result<usize>,
    decode: fn(&mut dyn Buf, ProtocolVersion) -> Result<Event>,
}

fn topology_sub_codec() -> EventSubCodec {
    EventSubCodec {
        encode: |event, dst, _| {
            let Event::TopologyChange { change, address } = event else {
                return Err(CodecError::invalid("event payload does not match its sub-codec"));
            };
            primitives::write_string(dst, change.as_str())?;
            primitives::write_inet(dst, address);
            Ok(())
        },
        encoded_size: |event, _| {
            let Event::TopologyChange { change, address } = event else {
                return Err(CodecError::invalid("event payload does not match its sub-codec"));
            };
            Ok(primitives::size_of_string(change.as_str()) + primitives::size_of_inet(address))
        },
        decode: |src, _| {
            let change = TopologyChangeType::parse(&primitives::read_string(src)?)?;
            let address = primitives::read_inet(src)?;
            Ok(Event::TopologyChange { change, address })
        },
    }
}

fn status_sub_codec() -> EventSubCodec {
    EventSubCodec {
        encode: |event, dst, _| {
            let Event::StatusChange { change, address } = event else {
                return Err(CodecError::invalid("event payload does not match its sub-codec"));
            };
            primitives::write_string(dst, change.as_str())?;
            primitives::write_inet(dst, address);
            Ok(())
        },
        encoded_size: |event, _| {
            let Event::StatusChange { change, address } = event else {
                return Err(CodecError::invalid("event payload does not match its sub-codec"));
            };
            Ok(primitives::size_of_string(change.as_str()) + primitives::size_of_inet(address))
        },
        decode: |src, _| {
            let change = StatusChangeType::parse(&primitives::read_string(src)?)?;
            let address = primitives::read_inet(src)?;
            Ok(Event::StatusChange { change, address })
        },
    }
}

fn schema_sub_codec() -> EventSubCodec {
    EventSubCodec {
        encode: |event, dst, version| {
            let Event::SchemaChange(change) = event else {
                return Err(CodecError::invalid("event payload does not match its sub-codec"));
            };
            change.write(dst, version)
        },
        encoded_size: |event, version| {
            let Event::SchemaChange(change) = event else {
                return Err(CodecError::invalid("event payload does not match its sub-codec"));
            };
            change.encoded_size(version)
        },
        decode: |src, version| Ok(Event::SchemaChange(SchemaChange::read(src, version)?)),
    }
}

/// Codec for Event under one protocol version.
pub struct EventCodec {
    version: ProtocolVersion,
    sub_codecs: HashMap<EventType, EventSubCodec>,
}

impl EventCodec {
    /// Codec instance for `version` with all three event classes installed.
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        let sub_codecs = HashMap::from([
            (EventType::TopologyChange, topology_sub_codec()),
            (EventType::StatusChange, status_sub_codec()),
            (EventType::SchemaChange, schema_sub_codec()),
        ]);
        Self { version, sub_codecs }
    }

    fn sub_codec(&self, event_type: EventType) -> Result<&EventSubCodec> {
        self.sub_codecs.get(&event_type).ok_or_else(|| {
            ProtocolViolation::UnknownEventType(event_type.as_str().to_owned()).into()
        })
    }
}

impl std::fmt::Debug for EventCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCodec").field("version", &self.version).finish_non_exhaustive()
    }
}

impl MessageCodec for EventCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Event
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Event(event) = message else {
            return Err(wrong_message(Opcode::Event, message));
        };
        let sub = self.sub_codec(event.event_type())?;
        primitives::write_string(dst, event.event_type().as_str())?;
        (sub.encode)(event, dst, self.version)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Event(event) = message else {
            return Err(wrong_message(Opcode::Event, message));
        };
        let sub = self.sub_codec(event.event_type())?;
        Ok(primitives::size_of_string(event.event_type().as_str())
            + (sub.encoded_size)(event, self.version)?)
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let event_type = EventType::parse(&primitives::read_string(src)?)?;
        let sub = self.sub_codec(event_type)?;
        Ok(Message::Event((sub.decode)(src, self.version)?))
    }
}
