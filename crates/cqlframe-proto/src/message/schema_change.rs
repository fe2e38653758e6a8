//! Schema change payload shared by the Result sub-codec and the Event
//! sub-codec.
//!
//! Wire order: `change_type:string, target:string, keyspace:string`, then
//! per target an object name and, for functions and aggregates, the argument
//! type list. FUNCTION and AGGREGATE targets exist from v4 on; a v3 codec
//! refuses them in both directions.
//!
//! The target enum carries its target-specific fields, so a keyspace-level
//! change cannot be constructed with a stray object name.

use bytes::{Buf, BufMut};

use crate::{
    errors::{CodecError, ProtocolViolation, Result},
    primitives,
    version::ProtocolVersion,
};

/// What happened to the schema object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChangeType {
    /// Object was created
    Created,
    /// Object was altered
    Updated,
    /// Object was dropped
    Dropped,
}

impl SchemaChangeType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Dropped => "DROPPED",
        }
    }

    fn parse(value: &str) -> Result<Self, ProtocolViolation> {
        match value {
            "CREATED" => Ok(Self::Created),
            "UPDATED" => Ok(Self::Updated),
            "DROPPED" => Ok(Self::Dropped),
            other => Err(ProtocolViolation::UnknownSchemaChangeType(other.to_owned())),
        }
    }
}

/// The affected schema object, with its target-specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChangeTarget {
    /// The keyspace itself
    Keyspace,
    /// A table in the keyspace
    Table {
        /// Table name
        object: String,
    },
    /// A user-defined type in the keyspace
    Type {
        /// Type name
        object: String,
    },
    /// A function in the keyspace (v4 and later)
    Function {
        /// Function name
        object: String,
        /// CQL argument types
        arguments: Vec<String>,
    },
    /// An aggregate in the keyspace (v4 and later)
    Aggregate {
        /// Aggregate name
        object: String,
        /// CQL argument types
        arguments: Vec<String>,
    },
}

impl SchemaChangeTarget {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Keyspace => "KEYSPACE",
            Self::Table { .. } => "TABLE",
            Self::Type { .. } => "TYPE",
            Self::Function { .. } => "FUNCTION",
            Self::Aggregate { .. } => "AGGREGATE",
        }
    }

    const fn requires_v4(&self) -> bool {
        matches!(self, Self::Function { .. } | Self::Aggregate { .. })
    }
}

/// A schema change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    /// Created, updated, or dropped
    pub change_type: SchemaChangeType,
    /// Keyspace holding the object
    pub keyspace: String,
    /// The object, with target-specific detail
    pub target: SchemaChangeTarget,
}

impl SchemaChange {
    /// Encode in wire order; refuses v4-only targets under v3.
    pub fn write<B: BufMut + ?Sized>(&self, buf: &mut B, version: ProtocolVersion) -> Result<()> {
        if self.target.requires_v4() && !version.supports_function_targets() {
            return Err(CodecError::invalid(format!(
                "schema change target {} requires protocol v4 or later, have {version}",
                self.target.as_str()
            )));
        }

        primitives::write_string(buf, self.change_type.as_str())?;
        primitives::write_string(buf, self.target.as_str())?;
        primitives::write_string(buf, &self.keyspace)?;
        match &self.target {
            SchemaChangeTarget::Keyspace => {}
            SchemaChangeTarget::Table { object } | SchemaChangeTarget::Type { object } => {
                primitives::write_string(buf, object)?;
            }
            SchemaChangeTarget::Function { object, arguments }
            | SchemaChangeTarget::Aggregate { object, arguments } => {
                primitives::write_string(buf, object)?;
                primitives::write_string_list(buf, arguments)?;
            }
        }
        Ok(())
    }

    /// Exact size [`SchemaChange::write`] will produce.
    pub fn encoded_size(&self, version: ProtocolVersion) -> Result<usize> {
        if self.target.requires_v4() && !version.supports_function_targets() {
            return Err(CodecError::invalid(format!(
                "schema change target {} requires protocol v4 or later, have {version}",
                self.target.as_str()
            )));
        }

        let mut size = primitives::size_of_string(self.change_type.as_str())
            + primitives::size_of_string(self.target.as_str())
            + primitives::size_of_string(&self.keyspace);
        match &self.target {
            SchemaChangeTarget::Keyspace => {}
            SchemaChangeTarget::Table { object } | SchemaChangeTarget::Type { object } => {
                size += primitives::size_of_string(object);
            }
            SchemaChangeTarget::Function { object, arguments }
            | SchemaChangeTarget::Aggregate { object, arguments } => {
                size += primitives::size_of_string(object)
                    + primitives::size_of_string_list(arguments);
            }
        }
        Ok(size)
    }

    /// Decode in wire order; fails on v4-only targets under v3.
    pub fn read<B: Buf + ?Sized>(buf: &mut B, version: ProtocolVersion) -> Result<Self> {
        let change_type = SchemaChangeType::parse(&primitives::read_string(buf)?)?;
        let target_name = primitives::read_string(buf)?;
        let keyspace = primitives::read_string(buf)?;

        let target = match target_name.as_str() {
            "KEYSPACE" => SchemaChangeTarget::Keyspace,
            "TABLE" => SchemaChangeTarget::Table { object: primitives::read_string(buf)? },
            "TYPE" => SchemaChangeTarget::Type { object: primitives::read_string(buf)? },
            "FUNCTION" | "AGGREGATE" if !version.supports_function_targets() => {
                return Err(CodecError::invalid(format!(
                    "schema change target {target_name} requires protocol v4 or later, \
                     have {version}"
                )));
            }
            "FUNCTION" => SchemaChangeTarget::Function {
                object: primitives::read_string(buf)?,
                arguments: primitives::read_string_list(buf)?,
            },
            "AGGREGATE" => SchemaChangeTarget::Aggregate {
                object: primitives::read_string(buf)?,
                arguments: primitives::read_string_list(buf)?,
            },
            other => {
                return Err(ProtocolViolation::UnknownSchemaChangeTarget(other.to_owned()).into());
            }
        };

        Ok(Self { change_type, keyspace, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(change: &SchemaChange, version: ProtocolVersion) -> Vec<u8> {
        let mut wire = Vec::new();
        change.write(&mut wire, version).unwrap();
        assert_eq!(wire.len(), change.encoded_size(version).unwrap());

        let mut cursor: &[u8] = &wire;
        assert_eq!(&SchemaChange::read(&mut cursor, version).unwrap(), change);
        assert!(cursor.is_empty());
        wire
    }

    #[test]
    fn keyspace_change_round_trip() {
        let change = SchemaChange {
            change_type: SchemaChangeType::Created,
            keyspace: "test".to_owned(),
            target: SchemaChangeTarget::Keyspace,
        };
        let wire = round_trip(&change, ProtocolVersion::V4);
        // string("CREATED") string("KEYSPACE") string("test")
        assert_eq!(wire.len(), 2 + 7 + 2 + 8 + 2 + 4);
    }

    #[test]
    fn table_change_round_trip() {
        let change = SchemaChange {
            change_type: SchemaChangeType::Dropped,
            keyspace: "ks".to_owned(),
            target: SchemaChangeTarget::Table { object: "t".to_owned() },
        };
        round_trip(&change, ProtocolVersion::V3);
        round_trip(&change, ProtocolVersion::V5);
    }

    #[test]
    fn function_change_round_trip_v4() {
        let change = SchemaChange {
            change_type: SchemaChangeType::Created,
            keyspace: "test".to_owned(),
            target: SchemaChangeTarget::Function {
                object: "myfunction".to_owned(),
                arguments: vec!["int".to_owned(), "int".to_owned()],
            },
        };
        let wire = round_trip(&change, ProtocolVersion::V4);

        // Tail after target: string("test") string("myfunction") short(2)
        // string("int") string("int")
        let tail = &wire[2 + 7 + 2 + 8..];
        let mut expected = Vec::new();
        primitives::write_string(&mut expected, "test").unwrap();
        primitives::write_string(&mut expected, "myfunction").unwrap();
        primitives::write_short(&mut expected, 2);
        primitives::write_string(&mut expected, "int").unwrap();
        primitives::write_string(&mut expected, "int").unwrap();
        assert_eq!(tail, expected);
    }

    #[test]
    fn function_target_refused_under_v3() {
        let change = SchemaChange {
            change_type: SchemaChangeType::Created,
            keyspace: "test".to_owned(),
            target: SchemaChangeTarget::Function {
                object: "myfunction".to_owned(),
                arguments: vec!["int".to_owned()],
            },
        };

        let mut wire = Vec::new();
        let err = change.write(&mut wire, ProtocolVersion::V3).unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument { .. }));
        assert!(wire.is_empty(), "refusal must precede any output");

        // A v4 encoding of the same change must not decode under v3 either.
        change.write(&mut wire, ProtocolVersion::V4).unwrap();
        let err = SchemaChange::read(&mut &wire[..], ProtocolVersion::V3).unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument { .. }));
    }

    #[test]
    fn unknown_target_rejected() {
        let mut wire = Vec::new();
        primitives::write_string(&mut wire, "CREATED").unwrap();
        primitives::write_string(&mut wire, "TRIGGER").unwrap();
        primitives::write_string(&mut wire, "ks").unwrap();
        let err = SchemaChange::read(&mut &wire[..], ProtocolVersion::V4).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolViolation::UnknownSchemaChangeTarget(_))
        ));
    }
}
