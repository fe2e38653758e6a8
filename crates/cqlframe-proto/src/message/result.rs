//! Result (0x08): the response to Query, Prepare, Execute, and Batch.
//!
//! Body: `kind:int` followed by a kind-specific payload. The codec installs
//! one sub-codec entry per kind. Row cells stay raw `[bytes]`; interpreting
//! cell contents is the caller's business.

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes};

use crate::{
    errors::{CodecError, ProtocolViolation, Result},
    message::{
        Message, MessageCodec, Opcode,
        metadata::{PreparedMetadata, RowsMetadata},
        schema_change::SchemaChange,
        wrong_message,
    },
    primitives,
    version::ProtocolVersion,
};

/// Result kind ints.
pub mod kind {
    #![allow(missing_docs)]

    pub const VOID: i32 = 0x0001;
    pub const ROWS: i32 = 0x0002;
    pub const SET_KEYSPACE: i32 = 0x0003;
    pub const PREPARED: i32 = 0x0004;
    pub const SCHEMA_CHANGE: i32 = 0x0005;
}

/// A page of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rows {
    /// Result metadata
    pub metadata: RowsMetadata,
    /// Row-major cells, `row_count x column_count`, each a nullable `[bytes]`
    pub rows: Vec<Vec<Option<Bytes>>>,
}

/// A prepared statement handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    /// Prepared statement id
    pub id: Bytes,
    /// Result metadata id, version code 5 and later
    pub result_metadata_id: Option<Bytes>,
    /// Bind variable metadata
    pub variables: PreparedMetadata,
    /// Result set metadata
    pub result_metadata: RowsMetadata,
}

/// A decoded Result payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultBody {
    /// Statement produced nothing
    Void,
    /// A page of rows
    Rows(Rows),
    /// USE succeeded; the new keyspace
    SetKeyspace(String),
    /// PREPARE succeeded
    Prepared(Prepared),
    /// A DDL statement changed the schema
    SchemaChange(SchemaChange),
}

impl ResultBody {
    /// The result kind int of this body.
    #[must_use]
    pub const fn kind(&self) -> i32 {
        match self {
            Self::Void => kind::VOID,
            Self::Rows(_) => kind::ROWS,
            Self::SetKeyspace(_) => kind::SET_KEYSPACE,
            Self::Prepared(_) => kind::PREPARED,
            Self::SchemaChange(_) => kind::SCHEMA_CHANGE,
        }
    }
}

fn mismatch() -> CodecError {
    CodecError::invalid("result payload does not match its sub-codec")
}

/// Function-pair entry of the inner result registry.
struct ResultSubCodec {
    encode: fn(&ResultBody, &mut dyn BufMut, ProtocolVersion) -> Result<()>,
    encoded_size: fn(&ResultBody, ProtocolVersion) -> Result<usize>,
    decode: fn(&mut dyn Buf, ProtocolVersion) -> Result<ResultBody>,
}

fn void_sub_codec() -> ResultSubCodec {
    ResultSubCodec {
        encode: |body, _, _| match body {
            ResultBody::Void => Ok(()),
            _ => Err(mismatch()),
        },
        encoded_size: |body, _| match body {
            ResultBody::Void => Ok(0),
            _ => Err(mismatch()),
        },
        decode: |_, _| Ok(ResultBody::Void),
    }
}

fn rows_sub_codec() -> ResultSubCodec {
    ResultSubCodec {
        encode: |body, dst, version| {
            let ResultBody::Rows(rows) = body else {
                return Err(mismatch());
            };
            let row_count = i32::try_from(rows.rows.len())
                .map_err(|_| CodecError::invalid("row count exceeds int"))?;
            for row in &rows.rows {
                if row.len() as i32 != rows.metadata.column_count {
                    return Err(CodecError::invalid(format!(
                        "row holds {} cell(s), metadata declares {}",
                        row.len(),
                        rows.metadata.column_count
                    )));
                }
            }

            rows.metadata.write(dst, version)?;
            primitives::write_int(dst, row_count);
            for row in &rows.rows {
                for cell in row {
                    primitives::write_bytes(dst, cell.as_deref())?;
                }
            }
            Ok(())
        },
        encoded_size: |body, version| {
            let ResultBody::Rows(rows) = body else {
                return Err(mismatch());
            };
            let mut size = rows.metadata.encoded_size(version)? + 4;
            for row in &rows.rows {
                size += row.iter().map(|cell| primitives::size_of_bytes(cell.as_deref())).sum::<usize>();
            }
            Ok(size)
        },
        decode: |src, version| {
            let metadata = RowsMetadata::read(src, version)?;
            let row_count = primitives::read_int(src)?;
            if row_count < 0 {
                return Err(ProtocolViolation::NegativeLength(row_count).into());
            }
            let column_count = metadata.column_count as usize;
            let mut rows = Vec::with_capacity((row_count as usize).min(1024));
            for _ in 0..row_count {
                let mut row = Vec::with_capacity(column_count.min(1024));
                for _ in 0..column_count {
                    row.push(primitives::read_bytes(src)?);
                }
                rows.push(row);
            }
            Ok(ResultBody::Rows(Rows { metadata, rows }))
        },
    }
}

fn set_keyspace_sub_codec() -> ResultSubCodec {
    ResultSubCodec {
        encode: |body, dst, _| {
            let ResultBody::SetKeyspace(keyspace) = body else {
                return Err(mismatch());
            };
            primitives::write_string(dst, keyspace)
        },
        encoded_size: |body, _| match body {
            ResultBody::SetKeyspace(keyspace) => Ok(primitives::size_of_string(keyspace)),
            _ => Err(mismatch()),
        },
        decode: |src, _| Ok(ResultBody::SetKeyspace(primitives::read_string(src)?)),
    }
}

fn prepared_sub_codec() -> ResultSubCodec {
    ResultSubCodec {
        encode: |body, dst, version| {
            let ResultBody::Prepared(prepared) = body else {
                return Err(mismatch());
            };
            match (&prepared.result_metadata_id, version.has_result_metadata_id()) {
                (Some(_), false) => {
                    return Err(CodecError::invalid(format!(
                        "result metadata id is not representable under {version}"
                    )));
                }
                (None, true) => {
                    return Err(CodecError::invalid(format!(
                        "prepared result requires a result metadata id under {version}"
                    )));
                }
                _ => {}
            }

            primitives::write_short_bytes(dst, &prepared.id)?;
            if let Some(id) = &prepared.result_metadata_id {
                primitives::write_short_bytes(dst, id)?;
            }
            prepared.variables.write(dst, version)?;
            prepared.result_metadata.write(dst, version)
        },
        encoded_size: |body, version| {
            let ResultBody::Prepared(prepared) = body else {
                return Err(mismatch());
            };
            let mut size = primitives::size_of_short_bytes(&prepared.id);
            if let Some(id) = &prepared.result_metadata_id {
                size += primitives::size_of_short_bytes(id);
            }
            size += prepared.variables.encoded_size(version)?;
            size += prepared.result_metadata.encoded_size(version)?;
            Ok(size)
        },
        decode: |src, version| {
            let id = primitives::read_short_bytes(src)?;
            let result_metadata_id = if version.has_result_metadata_id() {
                Some(primitives::read_short_bytes(src)?)
            } else {
                None
            };
            let variables = PreparedMetadata::read(src, version)?;
            let result_metadata = RowsMetadata::read(src, version)?;
            Ok(ResultBody::Prepared(Prepared {
                id,
                result_metadata_id,
                variables,
                result_metadata,
            }))
        },
    }
}

fn schema_change_sub_codec() -> ResultSubCodec {
    ResultSubCodec {
        encode: |body, dst, version| {
            let ResultBody::SchemaChange(change) = body else {
                return Err(mismatch());
            };
            change.write(dst, version)
        },
        encoded_size: |body, version| match body {
            ResultBody::SchemaChange(change) => change.encoded_size(version),
            _ => Err(mismatch()),
        },
        decode: |src, version| Ok(ResultBody::SchemaChange(SchemaChange::read(src, version)?)),
    }
}

/// Codec for Result under one protocol version.
pub struct ResultCodec {
    version: ProtocolVersion,
    sub_codecs: HashMap<i32, ResultSubCodec>,
}

impl ResultCodec {
    /// Codec instance for `version` with every result kind installed.
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        let sub_codecs = HashMap::from([
            (kind::VOID, void_sub_codec()),
            (kind::ROWS, rows_sub_codec()),
            (kind::SET_KEYSPACE, set_keyspace_sub_codec()),
            (kind::PREPARED, prepared_sub_codec()),
            (kind::SCHEMA_CHANGE, schema_change_sub_codec()),
        ]);
        Self { version, sub_codecs }
    }

    fn sub_codec(&self, kind: i32) -> Result<&ResultSubCodec> {
        self.sub_codecs
            .get(&kind)
            .ok_or_else(|| ProtocolViolation::UnknownResultKind(kind).into())
    }
}

impl std::fmt::Debug for ResultCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCodec").field("version", &self.version).finish_non_exhaustive()
    }
}

impl MessageCodec for ResultCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Result
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Result(body) = message else {
            return Err(wrong_message(Opcode::Result, message));
        };
        let sub = self.sub_codec(body.kind())?;
        primitives::write_int(dst, body.kind());
        (sub.encode)(body, dst, self.version)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Result(body) = message else {
            return Err(wrong_message(Opcode::Result, message));
        };
        let sub = self.sub_codec(body.kind())?;
        Ok(4 + (sub.encoded_size)(body, self.version)?)
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let kind = primitives::read_int(src)?;
        let sub = self.sub_codec(kind)?;
        Ok(Message::Result((sub.decode)(src, self.version)?))
    }
}
