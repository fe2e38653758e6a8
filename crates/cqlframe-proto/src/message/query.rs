//! Query (0x07): a raw CQL string plus the shared parameter block.

use bytes::{Buf, BufMut};

use crate::{
    errors::Result,
    message::{
        Message, MessageCodec, Opcode,
        params::{Consistency, QueryParams},
        wrong_message,
    },
    primitives,
    version::ProtocolVersion,
};

/// A raw CQL query request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// CQL statement text
    pub query: String,
    /// Execution parameters
    pub params: QueryParams,
}

impl Query {
    /// Query with the given text and the given consistency, nothing else set.
    #[must_use]
    pub fn new(query: impl Into<String>, consistency: Consistency) -> Self {
        Self { query: query.into(), params: QueryParams::with_consistency(consistency) }
    }
}

/// Codec for Query under one protocol version.
#[derive(Debug, Clone, Copy)]
pub struct QueryCodec {
    version: ProtocolVersion,
}

impl QueryCodec {
    /// Codec instance for `version`.
    #[must_use]
    pub const fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }
}

impl MessageCodec for QueryCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Query
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Query(query) = message else {
            return Err(wrong_message(Opcode::Query, message));
        };
        primitives::write_long_string(dst, &query.query)?;
        query.params.write(dst, self.version)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Query(query) = message else {
            return Err(wrong_message(Opcode::Query, message));
        };
        Ok(primitives::size_of_long_string(&query.query)
            + query.params.encoded_size(self.version)?)
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let query = primitives::read_long_string(src)?;
        let params = QueryParams::read(src, self.version)?;
        Ok(Message::Query(Query { query, params }))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::message::params::{QueryValues, Value};

    fn round_trip(message: &Message, version: ProtocolVersion) {
        let codec = QueryCodec::new(version);
        let mut wire = Vec::new();
        codec.encode(message, &mut wire).unwrap();
        assert_eq!(wire.len(), codec.encoded_size(message).unwrap());

        let mut cursor: &[u8] = &wire;
        assert_eq!(&codec.decode(&mut cursor).unwrap(), message);
        assert!(cursor.is_empty());
    }

    #[test]
    fn bare_query_round_trip_all_versions() {
        let message = Message::Query(Query::new("SELECT * FROM t", Consistency::One));
        for version in [
            ProtocolVersion::V3,
            ProtocolVersion::V4,
            ProtocolVersion::V5,
            ProtocolVersion::DseV1,
            ProtocolVersion::DseV2,
        ] {
            round_trip(&message, version);
        }
    }

    #[test]
    fn query_with_values_and_paging_round_trip() {
        let mut query =
            Query::new("UPDATE t SET v = ? WHERE k = ?", Consistency::LocalQuorum);
        query.params.values = QueryValues::Positional(vec![
            Value::Some(Bytes::from_static(b"value")),
            Value::Some(Bytes::from_static(b"key")),
        ]);
        query.params.page_size = Some(100);
        query.params.paging_state = Some(Bytes::from_static(&[1, 2, 3]));
        round_trip(&Message::Query(query), ProtocolVersion::V4);
    }

    #[test]
    fn v5_query_with_keyspace_round_trip() {
        let mut query = Query::new("SELECT pk FROM t", Consistency::One);
        query.params.keyspace = Some("app".to_owned());
        round_trip(&Message::Query(query), ProtocolVersion::V5);
    }

    #[test]
    fn body_layout_is_long_string_then_params() {
        let message = Message::Query(Query::new("X", Consistency::Any));
        let mut wire = Vec::new();
        QueryCodec::new(ProtocolVersion::V4).encode(&message, &mut wire).unwrap();
        // int length 1, "X", consistency 0x0000, flags byte 0
        assert_eq!(wire, [0, 0, 0, 1, b'X', 0, 0, 0]);
    }
}
