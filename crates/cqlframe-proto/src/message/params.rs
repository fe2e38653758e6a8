//! Shared query-parameter block for Query, Execute, and Batch.
//!
//! The block is `consistency:short` followed by a flags field (one byte
//! through v4, an int from version code 5 on) and then the optional fields in
//! strict flag-bit order. Encoding derives the flags from which fields are
//! populated, so a round trip reproduces the original flag bits.

use bytes::{Buf, BufMut, Bytes};

use crate::{
    collections::OrderedMap,
    errors::{CodecError, ProtocolViolation, Result},
    primitives,
    version::ProtocolVersion,
};

/// Consistency level shorts as defined by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl Consistency {
    /// Wire value.
    #[must_use]
    pub const fn to_short(self) -> u16 {
        match self {
            Self::Any => 0x0000,
            Self::One => 0x0001,
            Self::Two => 0x0002,
            Self::Three => 0x0003,
            Self::Quorum => 0x0004,
            Self::All => 0x0005,
            Self::LocalQuorum => 0x0006,
            Self::EachQuorum => 0x0007,
            Self::Serial => 0x0008,
            Self::LocalSerial => 0x0009,
            Self::LocalOne => 0x000A,
        }
    }

    /// Parse a wire value.
    pub fn from_short(value: u16) -> Result<Self, ProtocolViolation> {
        Ok(match value {
            0x0000 => Self::Any,
            0x0001 => Self::One,
            0x0002 => Self::Two,
            0x0003 => Self::Three,
            0x0004 => Self::Quorum,
            0x0005 => Self::All,
            0x0006 => Self::LocalQuorum,
            0x0007 => Self::EachQuorum,
            0x0008 => Self::Serial,
            0x0009 => Self::LocalSerial,
            0x000A => Self::LocalOne,
            other => return Err(ProtocolViolation::UnknownConsistency(other)),
        })
    }
}

pub(crate) fn read_consistency<B: Buf + ?Sized>(buf: &mut B) -> Result<Consistency> {
    let raw = primitives::read_short(buf)?;
    Ok(Consistency::from_short(raw)?)
}

pub(crate) fn write_consistency<B: BufMut + ?Sized>(buf: &mut B, cl: Consistency) {
    primitives::write_short(buf, cl.to_short());
}

/// A single bound value in a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Present bytes (possibly empty)
    Some(Bytes),
    /// Explicit null (length −1)
    Null,
    /// Leave the column untouched (length −2, v4 and later)
    Unset,
}

impl Value {
    pub(crate) fn read<B: Buf + ?Sized>(buf: &mut B) -> Result<Self> {
        let len = primitives::read_int(buf)?;
        match len {
            primitives::BYTES_NULL => Ok(Self::Null),
            primitives::BYTES_UNSET => Ok(Self::Unset),
            len if len < 0 => Err(ProtocolViolation::NegativeLength(len).into()),
            len => {
                let len = len as usize;
                if buf.remaining() < len {
                    return Err(ProtocolViolation::Truncated {
                        needed: len,
                        remaining: buf.remaining(),
                    }
                    .into());
                }
                Ok(Self::Some(buf.copy_to_bytes(len)))
            }
        }
    }

    pub(crate) fn write<B: BufMut + ?Sized>(
        &self,
        buf: &mut B,
        version: ProtocolVersion,
    ) -> Result<()> {
        match self {
            Self::Some(bytes) => primitives::write_bytes(buf, Some(bytes.as_ref()))?,
            Self::Null => primitives::write_int(buf, primitives::BYTES_NULL),
            Self::Unset => {
                if !version.supports_unset_values() {
                    return Err(CodecError::invalid(format!(
                        "unset values require protocol v4 or later, have {version}"
                    )));
                }
                primitives::write_int(buf, primitives::BYTES_UNSET);
            }
        }
        Ok(())
    }

    pub(crate) fn encoded_size(&self) -> usize {
        match self {
            Self::Some(bytes) => 4 + bytes.len(),
            Self::Null | Self::Unset => 4,
        }
    }
}

/// Bound values: positional, or named from v3's named-value flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValues {
    /// Values bound by marker position
    Positional(Vec<Value>),
    /// Values bound by marker name
    Named(OrderedMap<String, Value>),
}

impl QueryValues {
    /// No values at all (the VALUES flag stays clear).
    #[must_use]
    pub const fn none() -> Self {
        Self::Positional(Vec::new())
    }

    /// True when no value is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Positional(values) => values.is_empty(),
            Self::Named(values) => values.is_empty(),
        }
    }
}

impl Default for QueryValues {
    fn default() -> Self {
        Self::none()
    }
}

/// Flag bits of the query-parameter block.
pub(crate) mod flag {
    pub const VALUES: u32 = 0x0001;
    pub const SKIP_METADATA: u32 = 0x0002;
    pub const PAGE_SIZE: u32 = 0x0004;
    pub const PAGING_STATE: u32 = 0x0008;
    pub const SERIAL_CONSISTENCY: u32 = 0x0010;
    pub const DEFAULT_TIMESTAMP: u32 = 0x0020;
    pub const NAMED_VALUES: u32 = 0x0040;
    pub const KEYSPACE: u32 = 0x0080;
    pub const NOW_IN_SECONDS: u32 = 0x0100;
}

/// The full parameter block of a Query or Execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    /// Consistency level for the operation
    pub consistency: Consistency,
    /// Bound values; the VALUES flag is set iff non-empty
    pub values: QueryValues,
    /// Ask the server to omit result metadata it already shares
    pub skip_metadata: bool,
    /// Requested page size in rows
    pub page_size: Option<i32>,
    /// Opaque paging cursor from a previous Rows result
    pub paging_state: Option<Bytes>,
    /// Consistency for the serial phase of conditional updates
    pub serial_consistency: Option<Consistency>,
    /// Client-chosen mutation timestamp in microseconds
    pub default_timestamp: Option<i64>,
    /// Keyspace override, version code 5 and later
    pub keyspace: Option<String>,
    /// "Now" override in epoch seconds, version code 5 and later
    pub now_in_seconds: Option<i32>,
}

impl QueryParams {
    /// Parameters with the given consistency and everything else unset.
    #[must_use]
    pub fn with_consistency(consistency: Consistency) -> Self {
        Self {
            consistency,
            values: QueryValues::none(),
            skip_metadata: false,
            page_size: None,
            paging_state: None,
            serial_consistency: None,
            default_timestamp: None,
            keyspace: None,
            now_in_seconds: None,
        }
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
        if !self.values.is_empty() {
            flags |= flag::VALUES;
            if matches!(self.values, QueryValues::Named(_)) {
                flags |= flag::NAMED_VALUES;
            }
        }
        if self.skip_metadata {
            flags |= flag::SKIP_METADATA;
        }
        if self.page_size.is_some() {
            flags |= flag::PAGE_SIZE;
        }
        if self.paging_state.is_some() {
            flags |= flag::PAGING_STATE;
        }
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

    fn check_version(&self, version: ProtocolVersion) -> Result<()> {
        if !version.supports_keyspace_per_statement() {
            if self.keyspace.is_some() {
                return Err(CodecError::invalid(format!(
                    "per-statement keyspace requires version code 5 or later, have {version}"
                )));
            }
            if self.now_in_seconds.is_some() {
                return Err(CodecError::invalid(format!(
                    "now-in-seconds requires version code 5 or later, have {version}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn write<B: BufMut + ?Sized>(
        &self,
        buf: &mut B,
        version: ProtocolVersion,
    ) -> Result<()> {
        self.check_version(version)?;
        write_consistency(buf, self.consistency);

        let flags = self.flags();
        if version.uses_int_query_flags() {
            primitives::write_int(buf, flags as i32);
        } else {
            primitives::write_byte(buf, flags as u8);
        }

        let value_count = |count: usize| {
            u16::try_from(count).map_err(|_| {
                CodecError::invalid(format!("{count} bound values exceed unsigned short"))
            })
        };
        match &self.values {
            QueryValues::Positional(values) if !values.is_empty() => {
                primitives::write_short(buf, value_count(values.len())?);
                for value in values {
                    value.write(buf, version)?;
                }
            }
            QueryValues::Named(values) if !values.is_empty() => {
                primitives::write_short(buf, value_count(values.len())?);
                for (name, value) in values {
                    primitives::write_string(buf, name)?;
                    value.write(buf, version)?;
                }
            }
            _ => {}
        }

        if let Some(page_size) = self.page_size {
            primitives::write_int(buf, page_size);
        }
        if let Some(paging_state) = &self.paging_state {
            primitives::write_bytes(buf, Some(paging_state.as_ref()))?;
        }
        if let Some(serial) = self.serial_consistency {
            write_consistency(buf, serial);
        }
        if let Some(timestamp) = self.default_timestamp {
            primitives::write_long(buf, timestamp);
        }
        if let Some(keyspace) = &self.keyspace {
            primitives::write_string(buf, keyspace)?;
        }
        if let Some(now) = self.now_in_seconds {
            primitives::write_int(buf, now);
        }
        Ok(())
    }

    pub(crate) fn read<B: Buf + ?Sized>(buf: &mut B, version: ProtocolVersion) -> Result<Self> {
        let consistency = read_consistency(buf)?;
        let flags = if version.uses_int_query_flags() {
            primitives::read_int(buf)? as u32
        } else {
            u32::from(primitives::read_byte(buf)?)
        };

        let values = if flags & flag::VALUES != 0 {
            let count = primitives::read_short(buf)? as usize;
            if flags & flag::NAMED_VALUES != 0 {
                let mut values = OrderedMap::with_capacity(count.min(1024));
                for _ in 0..count {
                    let name = primitives::read_string(buf)?;
                    values.insert(name, Value::read(buf)?);
                }
                QueryValues::Named(values)
            } else {
                let mut values = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    values.push(Value::read(buf)?);
                }
                QueryValues::Positional(values)
            }
        } else {
            QueryValues::none()
        };

        let skip_metadata = flags & flag::SKIP_METADATA != 0;
        let page_size =
            if flags & flag::PAGE_SIZE != 0 { Some(primitives::read_int(buf)?) } else { None };
        let paging_state = if flags & flag::PAGING_STATE != 0 {
            Some(primitives::read_bytes(buf)?.unwrap_or_else(Bytes::new))
        } else {
            None
        };
        let serial_consistency = if flags & flag::SERIAL_CONSISTENCY != 0 {
            Some(read_consistency(buf)?)
        } else {
            None
        };
        let default_timestamp = if flags & flag::DEFAULT_TIMESTAMP != 0 {
            Some(primitives::read_long(buf)?)
        } else {
            None
        };
        let keyspace = if flags & flag::KEYSPACE != 0 {
            if !version.supports_keyspace_per_statement() {
                return Err(ProtocolViolation::VersionGatedValue {
                    what: "per-statement keyspace flag",
                    min_version: 5,
                }
                .into());
            }
            Some(primitives::read_string(buf)?)
        } else {
            None
        };
        let now_in_seconds = if flags & flag::NOW_IN_SECONDS != 0 {
            if !version.supports_keyspace_per_statement() {
                return Err(ProtocolViolation::VersionGatedValue {
                    what: "now-in-seconds flag",
                    min_version: 5,
                }
                .into());
            }
            Some(primitives::read_int(buf)?)
        } else {
            None
        };

        Ok(Self {
            consistency,
            values,
            skip_metadata,
            page_size,
            paging_state,
            serial_consistency,
            default_timestamp,
            keyspace,
            now_in_seconds,
        })
    }

    pub(crate) fn encoded_size(&self, version: ProtocolVersion) -> Result<usize> {
        self.check_version(version)?;
        let mut size = 2 + if version.uses_int_query_flags() { 4 } else { 1 };

        match &self.values {
            QueryValues::Positional(values) if !values.is_empty() => {
                size += 2 + values.iter().map(Value::encoded_size).sum::<usize>();
            }
            QueryValues::Named(values) if !values.is_empty() => {
                size += 2;
                for (name, value) in values {
                    size += primitives::size_of_string(name) + value.encoded_size();
                }
            }
            _ => {}
        }

        if self.page_size.is_some() {
            size += 4;
        }
        if let Some(paging_state) = &self.paging_state {
            size += primitives::size_of_bytes(Some(paging_state.as_ref()));
        }
        if self.serial_consistency.is_some() {
            size += 2;
        }
        if self.default_timestamp.is_some() {
            size += 8;
        }
        if let Some(keyspace) = &self.keyspace {
            size += primitives::size_of_string(keyspace);
        }
        if self.now_in_seconds.is_some() {
            size += 4;
        }
        Ok(size)
    }
}
