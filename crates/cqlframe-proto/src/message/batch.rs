//! Batch (0x0D): several statements executed as one unit.
//!
//! Body: kind byte, short statement count, per statement a kind byte (0 raw
//! CQL long string, 1 prepared short-bytes id) and positional values, then a
//! trailing consistency/flags block. Named values inside a batch are not
//! representable here: the protocol reserves the bit but no server accepts
//! it, so statements carry positional values only.

use bytes::{Buf, BufMut, Bytes};

use crate::{
    errors::{CodecError, ProtocolViolation, Result},
    message::{
        Message, MessageCodec, Opcode,
        params::{self, Consistency, Value, flag},
        wrong_message,
    },
    primitives,
    version::ProtocolVersion,
};

/// Batch atomicity kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// Atomic via the batch log
    Logged,
    /// No batch log
    Unlogged,
    /// Counter mutations
    Counter,
}

impl BatchKind {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Logged => 0,
            Self::Unlogged => 1,
            Self::Counter => 2,
        }
    }

    fn from_u8(byte: u8) -> Result<Self, ProtocolViolation> {
        match byte {
            0 => Ok(Self::Logged),
            1 => Ok(Self::Unlogged),
            2 => Ok(Self::Counter),
            other => Err(ProtocolViolation::UnknownBatchKind(other)),
        }
    }
}

/// One statement inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatement {
    /// Raw CQL with positional values
    Query {
        /// Statement text
        query: String,
        /// Positional bound values
        values: Vec<Value>,
    },
    /// Prepared statement id with positional values
    Prepared {
        /// Prepared id from a Prepared result
        id: Bytes,
        /// Positional bound values
        values: Vec<Value>,
    },
}

impl BatchStatement {
    fn values(&self) -> &[Value] {
        match self {
            Self::Query { values, .. } | Self::Prepared { values, .. } => values,
        }
    }
}

/// A batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Atomicity kind
    pub kind: BatchKind,
    /// Statements, at least one
    pub statements: Vec<BatchStatement>,
    /// Consistency level for the batch
    pub consistency: Consistency,
    /// Consistency for the serial phase of conditional updates
    pub serial_consistency: Option<Consistency>,
    /// Client-chosen mutation timestamp in microseconds
    pub default_timestamp: Option<i64>,
    /// Keyspace override, version code 5 and later
    pub keyspace: Option<String>,
    /// "Now" override in epoch seconds, version code 5 and later
    pub now_in_seconds: Option<i32>,
}

impl Batch {
    /// Logged batch with the given statements and consistency.
    #[must_use]
    pub fn logged(statements: Vec<BatchStatement>, consistency: Consistency) -> Self {
        Self {
            kind: BatchKind::Logged,
            statements,
            consistency,
            serial_consistency: None,
            default_timestamp: None,
            keyspace: None,
            now_in_seconds: None,
        }
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.serial_consistency.is_some() {
            flags |= flag::SERIAL_CONSISTENCY;
        }
        if self.default_timestamp.is_some() {
            flags |= flag::DEFAULT_TIMESTAMP;
        }
        if self.keyspace.is_some() {
            flags |= flag::KEYSPACE;
        }
        if self.now_in_seconds.is_some() {
            flags |= flag::NOW_IN_SECONDS;
        }
        flags
    }
}

/// Codec for Batch under one protocol version.
#[derive(Debug, Clone, Copy)]
pub struct BatchCodec {
    version: ProtocolVersion,
}

impl BatchCodec {
    /// Codec instance for `version`.
    #[must_use]
    pub const fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    fn check(&self, batch: &Batch) -> Result<()> {
        if batch.statements.is_empty() {
            return Err(CodecError::invalid("a batch requires at least one statement"));
        }
        if u16::try_from(batch.statements.len()).is_err() {
            return Err(CodecError::invalid(format!(
                "{} batch statements exceed unsigned short",
                batch.statements.len()
            )));
        }
        if !self.version.supports_keyspace_per_statement()
            && (batch.keyspace.is_some() || batch.now_in_seconds.is_some())
        {
            return Err(CodecError::invalid(format!(
                "batch keyspace and now-in-seconds require version code 5 or later, have {}",
                self.version
            )));
        }
        Ok(())
    }
}

impl MessageCodec for BatchCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Batch
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Batch(batch) = message else {
            return Err(wrong_message(Opcode::Batch, message));
        };
        self.check(batch)?;

        primitives::write_byte(dst, batch.kind.to_u8());
        primitives::write_short(dst, batch.statements.len() as u16);
        for statement in &batch.statements {
            match statement {
                BatchStatement::Query { query, .. } => {
                    primitives::write_byte(dst, 0);
                    primitives::write_long_string(dst, query)?;
                }
                BatchStatement::Prepared { id, .. } => {
                    primitives::write_byte(dst, 1);
                    primitives::write_short_bytes(dst, id)?;
                }
            }
            let values = statement.values();
            let count = u16::try_from(values.len()).map_err(|_| {
                CodecError::invalid(format!("{} bound values exceed unsigned short", values.len()))
            })?;
            primitives::write_short(dst, count);
            for value in values {
                value.write(dst, self.version)?;
            }
        }

        params::write_consistency(dst, batch.consistency);
        let flags = batch.flags();
        if self.version.uses_int_query_flags() {
            primitives::write_int(dst, flags as i32);
        } else {
            primitives::write_byte(dst, flags as u8);
        }
        if let Some(serial) = batch.serial_consistency {
            params::write_consistency(dst, serial);
        }
        if let Some(timestamp) = batch.default_timestamp {
            primitives::write_long(dst, timestamp);
        }
        if let Some(keyspace) = &batch.keyspace {
            primitives::write_string(dst, keyspace)?;
        }
        if let Some(now) = batch.now_in_seconds {
            primitives::write_int(dst, now);
        }
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Batch(batch) = message else {
            return Err(wrong_message(Opcode::Batch, message));
        };
        self.check(batch)?;

        let mut size = 1 + 2;
        for statement in &batch.statements {
            size += 1;
            size += match statement {
                BatchStatement::Query { query, .. } => primitives::size_of_long_string(query),
                BatchStatement::Prepared { id, .. } => primitives::size_of_short_bytes(id),
            };
            size += 2 + statement.values().iter().map(Value::encoded_size).sum::<usize>();
        }

        size += 2;
        size += if self.version.uses_int_query_flags() { 4 } else { 1 };
        if batch.serial_consistency.is_some() {
            size += 2;
        }
        if batch.default_timestamp.is_some() {
            size += 8;
        }
        if let Some(keyspace) = &batch.keyspace {
            size += primitives::size_of_string(keyspace);
        }
        if batch.now_in_seconds.is_some() {
            size += 4;
        }
        Ok(size)
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        fn read_values(src: &mut dyn Buf) -> Result<Vec<Value>> {
            let value_count = primitives::read_short(src)? as usize;
            let mut values = Vec::with_capacity(value_count.min(1024));
            for _ in 0..value_count {
                values.push(Value::read(src)?);
            }
            Ok(values)
        }

        let kind = BatchKind::from_u8(primitives::read_byte(src)?)?;
        let count = primitives::read_short(src)? as usize;
        if count == 0 {
            return Err(ProtocolViolation::EmptyBatch.into());
        }
        let mut statements = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let statement_kind = primitives::read_byte(src)?;
            match statement_kind {
                0 => {
                    let query = primitives::read_long_string(src)?;
                    let values = read_values(src)?;
                    statements.push(BatchStatement::Query { query, values });
                }
                1 => {
                    let id = primitives::read_short_bytes(src)?;
                    let values = read_values(src)?;
                    statements.push(BatchStatement::Prepared { id, values });
                }
                other => {
                    return Err(ProtocolViolation::UnknownBatchStatementKind(other).into());
                }
            }
        }

        let consistency = params::read_consistency(src)?;
        let flags = if self.version.uses_int_query_flags() {
            primitives::read_int(src)? as u32
        } else {
            u32::from(primitives::read_byte(src)?)
        };
        let serial_consistency = if flags & flag::SERIAL_CONSISTENCY != 0 {
            Some(params::read_consistency(src)?)
        } else {
            None
        };
        let default_timestamp = if flags & flag::DEFAULT_TIMESTAMP != 0 {
            Some(primitives::read_long(src)?)
        } else {
            None
        };
        let keyspace = if flags & flag::KEYSPACE != 0 {
            if !self.version.supports_keyspace_per_statement() {
                return Err(ProtocolViolation::VersionGatedValue {
                    what: "batch keyspace flag",
                    min_version: 5,
                }
                .into());
            }
            Some(primitives::read_string(src)?)
        } else {
            None
        };
        let now_in_seconds =
            if flags & flag::NOW_IN_SECONDS != 0 { Some(primitives::read_int(src)?) } else { None };

        Ok(Message::Batch(Batch {
            kind,
            statements,
            consistency,
            serial_consistency,
            default_timestamp,
            keyspace,
            now_in_seconds,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(batch: Batch, version: ProtocolVersion) {
        let codec = BatchCodec::new(version);
        let message = Message::Batch(batch);
        let mut wire = Vec::new();
        codec.encode(&message, &mut wire).unwrap();
        assert_eq!(wire.len(), codec.encoded_size(&message).unwrap());

        let mut cursor: &[u8] = &wire;
        assert_eq!(&codec.decode(&mut cursor).unwrap(), &message);
        assert!(cursor.is_empty());
    }

    #[test]
    fn mixed_batch_round_trip() {
        let batch = Batch::logged(
            vec![
                BatchStatement::Query {
                    query: "INSERT INTO t (k, v) VALUES (?, ?)".to_owned(),
                    values: vec![Value::Some(Bytes::from_static(b"k")), Value::Null],
                },
                BatchStatement::Prepared {
                    id: Bytes::from_static(&[0xAA, 0xBB]),
                    values: vec![Value::Some(Bytes::from_static(b"v"))],
                },
            ],
            Consistency::Quorum,
        );
        round_trip(batch.clone(), ProtocolVersion::V3);
        round_trip(batch, ProtocolVersion::V4);
    }

    #[test]
    fn batch_with_trailing_options_round_trip_v5() {
        let mut batch = Batch::logged(
            vec![BatchStatement::Query { query: "Q".to_owned(), values: vec![] }],
            Consistency::One,
        );
        batch.kind = BatchKind::Unlogged;
        batch.serial_consistency = Some(Consistency::Serial);
        batch.default_timestamp = Some(42);
        batch.keyspace = Some("app".to_owned());
        batch.now_in_seconds = Some(7);
        round_trip(batch, ProtocolVersion::V5);
    }

    #[test]
    fn empty_batch_refused() {
        let batch = Batch::logged(vec![], Consistency::One);
        let mut wire = Vec::new();
        let err = BatchCodec::new(ProtocolVersion::V4)
            .encode(&Message::Batch(batch), &mut wire)
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument { .. }));
        assert!(wire.is_empty());
    }

    #[test]
    fn batch_keyspace_refused_before_v5() {
        let mut batch = Batch::logged(
            vec![BatchStatement::Query { query: "Q".to_owned(), values: vec![] }],
            Consistency::One,
        );
        batch.keyspace = Some("app".to_owned());
        let mut wire = Vec::new();
        let err = BatchCodec::new(ProtocolVersion::V4)
            .encode(&Message::Batch(batch), &mut wire)
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument { .. }));
    }

    #[test]
    fn unknown_statement_kind_rejected() {
        let mut wire = Vec::new();
        primitives::write_byte(&mut wire, 0); // logged
        primitives::write_short(&mut wire, 1);
        primitives::write_byte(&mut wire, 9); // bad statement kind
        let err = BatchCodec::new(ProtocolVersion::V4).decode(&mut &wire[..]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolViolation::UnknownBatchStatementKind(9))
        ));
    }
}
