//! Prepare (0x09) and Execute (0x0A).
//!
//! Prepare is a long string through v4; version code 5 adds an int flags
//! field whose bit 0x01 gates an optional keyspace. Execute references the
//! prepared id (short bytes) and, from version code 5 on, the result
//! metadata id the client last saw, then the shared parameter block.

use bytes::{Buf, BufMut, Bytes};

use crate::{
    errors::{CodecError, Result},
    message::{Message, MessageCodec, Opcode, params::QueryParams, wrong_message},
    primitives,
    version::ProtocolVersion,
};

const PREPARE_WITH_KEYSPACE: i32 = 0x01;

/// A statement preparation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepare {
    /// CQL statement text
    pub query: String,
    /// Keyspace override, version code 5 and later
    pub keyspace: Option<String>,
}

impl Prepare {
    /// Prepare the given statement with no keyspace override.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), keyspace: None }
    }
}

/// An execution of a previously prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute {
    /// Prepared statement id from the Prepared result
    pub id: Bytes,
    /// Result metadata id last seen, version code 5 and later
    pub result_metadata_id: Option<Bytes>,
    /// Execution parameters
    pub params: QueryParams,
}

/// Codec for Prepare under one protocol version.
#[derive(Debug, Clone, Copy)]
pub struct PrepareCodec {
    version: ProtocolVersion,
}

impl PrepareCodec {
    /// Codec instance for `version`.
    #[must_use]
    pub const fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }
}

impl MessageCodec for PrepareCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Prepare
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Prepare(prepare) = message else {
            return Err(wrong_message(Opcode::Prepare, message));
        };
        if prepare.keyspace.is_some() && !self.version.supports_keyspace_per_statement() {
            return Err(CodecError::invalid(format!(
                "prepare keyspace requires version code 5 or later, have {}",
                self.version
            )));
        }

        primitives::write_long_string(dst, &prepare.query)?;
        if self.version.supports_keyspace_per_statement() {
            match &prepare.keyspace {
                Some(keyspace) => {
                    primitives::write_int(dst, PREPARE_WITH_KEYSPACE);
                    primitives::write_string(dst, keyspace)?;
                }
                None => primitives::write_int(dst, 0),
            }
        }
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Prepare(prepare) = message else {
            return Err(wrong_message(Opcode::Prepare, message));
        };
        let mut size = primitives::size_of_long_string(&prepare.query);
        if self.version.supports_keyspace_per_statement() {
            size += 4;
            if let Some(keyspace) = &prepare.keyspace {
                size += primitives::size_of_string(keyspace);
            }
        } else if prepare.keyspace.is_some() {
            return Err(CodecError::invalid(format!(
                "prepare keyspace requires version code 5 or later, have {}",
                self.version
            )));
        }
        Ok(size)
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let query = primitives::read_long_string(src)?;
        let keyspace = if self.version.supports_keyspace_per_statement() {
            let flags = primitives::read_int(src)?;
            if flags & PREPARE_WITH_KEYSPACE != 0 {
                Some(primitives::read_string(src)?)
            } else {
                None
            }
        } else {
            None
        };
        Ok(Message::Prepare(Prepare { query, keyspace }))
    }
}

/// Codec for Execute under one protocol version.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteCodec {
    version: ProtocolVersion,
}

impl ExecuteCodec {
    /// Codec instance for `version`.
    #[must_use]
    pub const fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    fn require_metadata_id<'a>(&self, execute: &'a Execute) -> Result<Option<&'a Bytes>> {
        if self.version.has_result_metadata_id() {
            match &execute.result_metadata_id {
                Some(id) => Ok(Some(id)),
                None => Err(CodecError::invalid(format!(
                    "execute requires a result metadata id under {}",
                    self.version
                ))),
            }
        } else if execute.result_metadata_id.is_some() {
            Err(CodecError::invalid(format!(
                "result metadata id is not representable under {}",
                self.version
            )))
        } else {
            Ok(None)
        }
    }
}

impl MessageCodec for ExecuteCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Execute
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Execute(execute) = message else {
            return Err(wrong_message(Opcode::Execute, message));
        };
        let metadata_id = self.require_metadata_id(execute)?;

        primitives::write_short_bytes(dst, &execute.id)?;
        if let Some(id) = metadata_id {
            primitives::write_short_bytes(dst, id)?;
        }
        execute.params.write(dst, self.version)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Execute(execute) = message else {
            return Err(wrong_message(Opcode::Execute, message));
        };
        let metadata_id = self.require_metadata_id(execute)?;

        let mut size = primitives::size_of_short_bytes(&execute.id);
        if let Some(id) = metadata_id {
            size += primitives::size_of_short_bytes(id);
        }
        Ok(size + execute.params.encoded_size(self.version)?)
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let id = primitives::read_short_bytes(src)?;
        let result_metadata_id = if self.version.has_result_metadata_id() {
            Some(primitives::read_short_bytes(src)?)
        } else {
            None
        };
        let params = QueryParams::read(src, self.version)?;
        Ok(Message::Execute(Execute { id, result_metadata_id, params }))
    }
}
