//! Result metadata: column specifications and their type options.
//!
//! Shared by the Rows and Prepared result sub-codecs. Flags on the wire are
//! derived from which fields are populated, so a decode/encode cycle
//! reproduces the original flag bits. Type options recurse for collections,
//! tuples, and UDTs; the decoder bounds the nesting depth.

use bytes::{Buf, BufMut, Bytes};

use crate::{
    errors::{CodecError, ProtocolViolation, Result},
    primitives,
    version::ProtocolVersion,
};

/// Rows metadata flag bits.
mod flag {
    pub const GLOBAL_TABLES_SPEC: i32 = 0x0001;
    pub const HAS_MORE_PAGES: i32 = 0x0002;
    pub const NO_METADATA: i32 = 0x0004;
    pub const METADATA_CHANGED: i32 = 0x0008;
}

/// Maximum nesting of collection/tuple/UDT type options accepted on decode.
const MAX_TYPE_DEPTH: usize = 128;

/// A fully qualified table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Keyspace name
    pub keyspace: String,
    /// Table name
    pub table: String,
}

/// A CQL data type as carried in a column spec's type option.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DataType {
    /// Server-defined custom type, by class name
    Custom(String),
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    Timeuuid,
    Inet,
    Date,
    Time,
    Smallint,
    Tinyint,
    Duration,
    /// List with its element type
    List(Box<DataType>),
    /// Map with its key and value types
    Map(Box<DataType>, Box<DataType>),
    /// Set with its element type
    Set(Box<DataType>),
    /// User-defined type with its field types
    Udt {
        /// Keyspace of the type
        keyspace: String,
        /// Type name
        name: String,
        /// Field name/type pairs in definition order
        fields: Vec<(String, DataType)>,
    },
    /// Tuple with its component types
    Tuple(Vec<DataType>),
}

mod type_id {
    pub const CUSTOM: u16 = 0x0000;
    pub const ASCII: u16 = 0x0001;
    pub const BIGINT: u16 = 0x0002;
    pub const BLOB: u16 = 0x0003;
    pub const BOOLEAN: u16 = 0x0004;
    pub const COUNTER: u16 = 0x0005;
    pub const DECIMAL: u16 = 0x0006;
    pub const DOUBLE: u16 = 0x0007;
    pub const FLOAT: u16 = 0x0008;
    pub const INT: u16 = 0x0009;
    pub const TIMESTAMP: u16 = 0x000B;
    pub const UUID: u16 = 0x000C;
    pub const VARCHAR: u16 = 0x000D;
    pub const VARINT: u16 = 0x000E;
    pub const TIMEUUID: u16 = 0x000F;
    pub const INET: u16 = 0x0010;
    pub const DATE: u16 = 0x0011;
    pub const TIME: u16 = 0x0012;
    pub const SMALLINT: u16 = 0x0013;
    pub const TINYINT: u16 = 0x0014;
    pub const DURATION: u16 = 0x0015;
    pub const LIST: u16 = 0x0020;
    pub const MAP: u16 = 0x0021;
    pub const SET: u16 = 0x0022;
    pub const UDT: u16 = 0x0030;
    pub const TUPLE: u16 = 0x0031;
}

impl DataType {
    const fn id(&self) -> u16 {
        match self {
            Self::Custom(_) => type_id::CUSTOM,
            Self::Ascii => type_id::ASCII,
            Self::Bigint => type_id::BIGINT,
            Self::Blob => type_id::BLOB,
            Self::Boolean => type_id::BOOLEAN,
            Self::Counter => type_id::COUNTER,
            Self::Decimal => type_id::DECIMAL,
            Self::Double => type_id::DOUBLE,
            Self::Float => type_id::FLOAT,
            Self::Int => type_id::INT,
            Self::Timestamp => type_id::TIMESTAMP,
            Self::Uuid => type_id::UUID,
            Self::Varchar => type_id::VARCHAR,
            Self::Varint => type_id::VARINT,
            Self::Timeuuid => type_id::TIMEUUID,
            Self::Inet => type_id::INET,
            Self::Date => type_id::DATE,
            Self::Time => type_id::TIME,
            Self::Smallint => type_id::SMALLINT,
            Self::Tinyint => type_id::TINYINT,
            Self::Duration => type_id::DURATION,
            Self::List(_) => type_id::LIST,
            Self::Map(_, _) => type_id::MAP,
            Self::Set(_) => type_id::SET,
            Self::Udt { .. } => type_id::UDT,
            Self::Tuple(_) => type_id::TUPLE,
        }
    }

    /// Encode the type option.
    pub fn write<B: BufMut + ?Sized>(&self, buf: &mut B) -> Result<()> {
        primitives::write_short(buf, self.id());
        match self {
            Self::Custom(class) => primitives::write_string(buf, class)?,
            Self::List(element) | Self::Set(element) => element.write(buf)?,
            Self::Map(key, value) => {
                key.write(buf)?;
                value.write(buf)?;
            }
            Self::Udt { keyspace, name, fields } => {
                primitives::write_string(buf, keyspace)?;
                primitives::write_string(buf, name)?;
                let count = u16::try_from(fields.len()).map_err(|_| {
                    CodecError::invalid(format!(
                        "{} UDT fields exceed unsigned short",
                        fields.len()
                    ))
                })?;
                primitives::write_short(buf, count);
                for (field_name, field_type) in fields {
                    primitives::write_string(buf, field_name)?;
                    field_type.write(buf)?;
                }
            }
            Self::Tuple(components) => {
                let count = u16::try_from(components.len()).map_err(|_| {
                    CodecError::invalid(format!(
                        "{} tuple components exceed unsigned short",
                        components.len()
                    ))
                })?;
                primitives::write_short(buf, count);
                for component in components {
                    component.write(buf)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Exact size [`DataType::write`] will produce.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        2 + match self {
            Self::Custom(class) => primitives::size_of_string(class),
            Self::List(element) | Self::Set(element) => element.encoded_size(),
            Self::Map(key, value) => key.encoded_size() + value.encoded_size(),
            Self::Udt { keyspace, name, fields } => {
                primitives::size_of_string(keyspace)
                    + primitives::size_of_string(name)
                    + 2
                    + fields
                        .iter()
                        .map(|(n, t)| primitives::size_of_string(n) + t.encoded_size())
                        .sum::<usize>()
            }
            Self::Tuple(components) => {
                2 + components.iter().map(Self::encoded_size).sum::<usize>()
            }
            _ => 0,
        }
    }

    /// Decode a type option.
    pub fn read<B: Buf + ?Sized>(buf: &mut B) -> Result<Self> {
        Self::read_at_depth(buf, 0)
    }

    fn read_at_depth<B: Buf + ?Sized>(buf: &mut B, depth: usize) -> Result<Self> {
        if depth > MAX_TYPE_DEPTH {
            return Err(ProtocolViolation::TypeDepthExceeded(MAX_TYPE_DEPTH).into());
        }
        let id = primitives::read_short(buf)?;
        Ok(match id {
            type_id::CUSTOM => Self::Custom(primitives::read_string(buf)?),
            type_id::ASCII => Self::Ascii,
            type_id::BIGINT => Self::Bigint,
            type_id::BLOB => Self::Blob,
            type_id::BOOLEAN => Self::Boolean,
            type_id::COUNTER => Self::Counter,
            type_id::DECIMAL => Self::Decimal,
            type_id::DOUBLE => Self::Double,
            type_id::FLOAT => Self::Float,
            type_id::INT => Self::Int,
            type_id::TIMESTAMP => Self::Timestamp,
            type_id::UUID => Self::Uuid,
            type_id::VARCHAR => Self::Varchar,
            type_id::VARINT => Self::Varint,
            type_id::TIMEUUID => Self::Timeuuid,
            type_id::INET => Self::Inet,
            type_id::DATE => Self::Date,
            type_id::TIME => Self::Time,
            type_id::SMALLINT => Self::Smallint,
            type_id::TINYINT => Self::Tinyint,
            type_id::DURATION => Self::Duration,
            type_id::LIST => Self::List(Box::new(Self::read_at_depth(buf, depth + 1)?)),
            type_id::SET => Self::Set(Box::new(Self::read_at_depth(buf, depth + 1)?)),
            type_id::MAP => Self::Map(
                Box::new(Self::read_at_depth(buf, depth + 1)?),
                Box::new(Self::read_at_depth(buf, depth + 1)?),
            ),
            type_id::UDT => {
                let keyspace = primitives::read_string(buf)?;
                let name = primitives::read_string(buf)?;
                let count = primitives::read_short(buf)? as usize;
                let mut fields = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let field_name = primitives::read_string(buf)?;
                    let field_type = Self::read_at_depth(buf, depth + 1)?;
                    fields.push((field_name, field_type));
                }
                Self::Udt { keyspace, name, fields }
            }
            type_id::TUPLE => {
                let count = primitives::read_short(buf)? as usize;
                let mut components = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    components.push(Self::read_at_depth(buf, depth + 1)?);
                }
                Self::Tuple(components)
            }
            other => return Err(ProtocolViolation::UnknownTypeOption(other).into()),
        })
    }
}

/// One column of a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Per-column table; `None` when the metadata carries a global spec
    pub table_spec: Option<TableSpec>,
    /// Column name
    pub name: String,
    /// Column type
    pub data_type: DataType,
}

fn write_column_specs<B: BufMut + ?Sized>(
    buf: &mut B,
    global_spec: Option<&TableSpec>,
    columns: &[ColumnSpec],
) -> Result<()> {
    if let Some(global) = global_spec {
        primitives::write_string(buf, &global.keyspace)?;
        primitives::write_string(buf, &global.table)?;
    }
    for column in columns {
        match (&column.table_spec, global_spec) {
            (Some(spec), None) => {
                primitives::write_string(buf, &spec.keyspace)?;
                primitives::write_string(buf, &spec.table)?;
            }
            (None, Some(_)) => {}
            (Some(_), Some(_)) => {
                return Err(CodecError::invalid(
                    "column carries a table spec although a global spec is present",
                ));
            }
            (None, None) => {
                return Err(CodecError::invalid(
                    "column lacks a table spec and no global spec is present",
                ));
            }
        }
        primitives::write_string(buf, &column.name)?;
        column.data_type.write(buf)?;
    }
    Ok(())
}

fn size_of_column_specs(global_spec: Option<&TableSpec>, columns: &[ColumnSpec]) -> usize {
    let mut size = global_spec.map_or(0, |g| {
        primitives::size_of_string(&g.keyspace) + primitives::size_of_string(&g.table)
    });
    for column in columns {
        if let (Some(spec), None) = (&column.table_spec, global_spec) {
            size += primitives::size_of_string(&spec.keyspace)
                + primitives::size_of_string(&spec.table);
        }
        size += primitives::size_of_string(&column.name) + column.data_type.encoded_size();
    }
    size
}

fn read_column_specs<B: Buf + ?Sized>(
    buf: &mut B,
    global_spec: Option<&TableSpec>,
    count: usize,
) -> Result<Vec<ColumnSpec>> {
    let mut columns = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let table_spec = if global_spec.is_some() {
            None
        } else {
            Some(TableSpec {
                keyspace: primitives::read_string(buf)?,
                table: primitives::read_string(buf)?,
            })
        };
        let name = primitives::read_string(buf)?;
        let data_type = DataType::read(buf)?;
        columns.push(ColumnSpec { table_spec, name, data_type });
    }
    Ok(columns)
}

/// Metadata block of a Rows result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowsMetadata {
    /// Number of columns per row; authoritative even when specs are omitted
    pub column_count: i32,
    /// Cursor for the next page; presence sets HAS_MORE_PAGES
    pub paging_state: Option<Bytes>,
    /// Replacement metadata id; presence sets METADATA_CHANGED (v5 era)
    pub new_metadata_id: Option<Bytes>,
    /// Table shared by all columns; presence sets GLOBAL_TABLES_SPEC
    pub global_spec: Option<TableSpec>,
    /// Column specs; `None` sets NO_METADATA
    pub columns: Option<Vec<ColumnSpec>>,
}

impl RowsMetadata {
    /// Metadata with the given specs, a global table spec, and no paging.
    #[must_use]
    pub fn of_columns(global_spec: TableSpec, columns: Vec<ColumnSpec>) -> Self {
        Self {
            column_count: columns.len() as i32,
            paging_state: None,
            new_metadata_id: None,
            global_spec: Some(global_spec),
            columns: Some(columns),
        }
    }

    fn check(&self, version: ProtocolVersion) -> Result<()> {
        if self.new_metadata_id.is_some() && !version.has_result_metadata_id() {
            return Err(CodecError::invalid(format!(
                "result metadata id is not representable under {version}"
            )));
        }
        if let Some(columns) = &self.columns {
            if columns.len() as i32 != self.column_count {
                return Err(CodecError::invalid(format!(
                    "column count {} disagrees with {} column spec(s)",
                    self.column_count,
                    columns.len()
                )));
            }
        }
        Ok(())
    }

    fn flags(&self) -> i32 {
        let mut flags = 0;
        if self.global_spec.is_some() {
            flags |= flag::GLOBAL_TABLES_SPEC;
        }
        if self.paging_state.is_some() {
            flags |= flag::HAS_MORE_PAGES;
        }
        if self.columns.is_none() {
            flags |= flag::NO_METADATA;
        }
        if self.new_metadata_id.is_some() {
            flags |= flag::METADATA_CHANGED;
        }
        flags
    }

    /// Encode the metadata block.
    pub fn write<B: BufMut + ?Sized>(&self, buf: &mut B, version: ProtocolVersion) -> Result<()> {
        self.check(version)?;
        primitives::write_int(buf, self.flags());
        primitives::write_int(buf, self.column_count);
        if let Some(paging_state) = &self.paging_state {
            primitives::write_bytes(buf, Some(paging_state.as_ref()))?;
        }
        if let Some(id) = &self.new_metadata_id {
            primitives::write_short_bytes(buf, id)?;
        }
        if let Some(columns) = &self.columns {
            write_column_specs(buf, self.global_spec.as_ref(), columns)?;
        }
        Ok(())
    }

    /// Exact size [`RowsMetadata::write`] will produce.
    pub fn encoded_size(&self, version: ProtocolVersion) -> Result<usize> {
        self.check(version)?;
        let mut size = 4 + 4;
        if let Some(paging_state) = &self.paging_state {
            size += primitives::size_of_bytes(Some(paging_state.as_ref()));
        }
        if let Some(id) = &self.new_metadata_id {
            size += primitives::size_of_short_bytes(id);
        }
        if let Some(columns) = &self.columns {
            size += size_of_column_specs(self.global_spec.as_ref(), columns);
        }
        Ok(size)
    }

    /// Decode the metadata block.
    pub fn read<B: Buf + ?Sized>(buf: &mut B, version: ProtocolVersion) -> Result<Self> {
        let flags = primitives::read_int(buf)?;
        let column_count = primitives::read_int(buf)?;
        if column_count < 0 {
            return Err(ProtocolViolation::NegativeLength(column_count).into());
        }

        let paging_state = if flags & flag::HAS_MORE_PAGES != 0 {
            Some(primitives::read_bytes(buf)?.unwrap_or_else(Bytes::new))
        } else {
            None
        };
        let new_metadata_id = if flags & flag::METADATA_CHANGED != 0 {
            if !version.has_result_metadata_id() {
                return Err(ProtocolViolation::VersionGatedValue {
                    what: "METADATA_CHANGED flag",
                    min_version: 5,
                }
                .into());
            }
            Some(primitives::read_short_bytes(buf)?)
        } else {
            None
        };

        let (global_spec, columns) = if flags & flag::NO_METADATA != 0 {
            (None, None)
        } else {
            let global_spec = if flags & flag::GLOBAL_TABLES_SPEC != 0 {
                Some(TableSpec {
                    keyspace: primitives::read_string(buf)?,
                    table: primitives::read_string(buf)?,
                })
            } else {
                None
            };
            let columns =
                read_column_specs(buf, global_spec.as_ref(), column_count as usize)?;
            (global_spec, Some(columns))
        };

        Ok(Self { column_count, paging_state, new_metadata_id, global_spec, columns })
    }
}

/// Metadata block of a Prepared result's bind variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMetadata {
    /// Indices of the partition-key variables (v4 and later on the wire)
    pub pk_indices: Vec<u16>,
    /// Table shared by all variables; presence sets GLOBAL_TABLES_SPEC
    pub global_spec: Option<TableSpec>,
    /// Bind variable specs
    pub columns: Vec<ColumnSpec>,
}

impl PreparedMetadata {
    fn flags(&self) -> i32 {
        if self.global_spec.is_some() { flag::GLOBAL_TABLES_SPEC } else { 0 }
    }

    /// Encode the metadata block.
    pub fn write<B: BufMut + ?Sized>(&self, buf: &mut B, version: ProtocolVersion) -> Result<()> {
        primitives::write_int(buf, self.flags());
        primitives::write_int(buf, self.columns.len() as i32);
        if version.supports_unset_values() {
            primitives::write_int(buf, self.pk_indices.len() as i32);
            for index in &self.pk_indices {
                primitives::write_short(buf, *index);
            }
        } else if !self.pk_indices.is_empty() {
            return Err(CodecError::invalid(format!(
                "partition key indices are not representable under {version}"
            )));
        }
        write_column_specs(buf, self.global_spec.as_ref(), &self.columns)
    }

    /// Exact size [`PreparedMetadata::write`] will produce.
    pub fn encoded_size(&self, version: ProtocolVersion) -> Result<usize> {
        let mut size = 4 + 4;
        if version.supports_unset_values() {
            size += 4 + 2 * self.pk_indices.len();
        } else if !self.pk_indices.is_empty() {
            return Err(CodecError::invalid(format!(
                "partition key indices are not representable under {version}"
            )));
        }
        Ok(size + size_of_column_specs(self.global_spec.as_ref(), &self.columns))
    }

    /// Decode the metadata block.
    pub fn read<B: Buf + ?Sized>(buf: &mut B, version: ProtocolVersion) -> Result<Self> {
        let flags = primitives::read_int(buf)?;
        let column_count = primitives::read_int(buf)?;
        if column_count < 0 {
            return Err(ProtocolViolation::NegativeLength(column_count).into());
        }

        let pk_indices = if version.supports_unset_values() {
            let pk_count = primitives::read_int(buf)?;
            if pk_count < 0 {
                return Err(ProtocolViolation::NegativeLength(pk_count).into());
            }
            let pk_count = pk_count as usize;
            let mut indices = Vec::with_capacity(pk_count.min(1024));
            for _ in 0..pk_count {
                indices.push(primitives::read_short(buf)?);
            }
            indices
        } else {
            Vec::new()
        };

        let global_spec = if flags & flag::GLOBAL_TABLES_SPEC != 0 {
            Some(TableSpec {
                keyspace: primitives::read_string(buf)?,
                table: primitives::read_string(buf)?,
            })
        } else {
            None
        };
        let columns = read_column_specs(buf, global_spec.as_ref(), column_count as usize)?;

        Ok(Self { pk_indices, global_spec, columns })
    }
}
