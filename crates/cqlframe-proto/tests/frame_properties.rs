//! Property-based round-trip tests for whole frames.
//!
//! For every supported version and any representable message, a frame must
//! decode back to itself, the declared encoded size must match the bytes
//! actually written, and a decode must consume the entire encoding.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::Bytes;
use cqlframe_proto::{
    Direction, Frame, FrameCodec, Message, OrderedMap, ProtocolVersion,
    message::{
        auth::{AuthChallenge, AuthResponse, AuthSuccess, Authenticate},
        batch::{Batch, BatchKind, BatchStatement},
        error::ErrorBody,
        event::{Event, StatusChangeType, TopologyChangeType},
        metadata::{ColumnSpec, DataType, PreparedMetadata, RowsMetadata, TableSpec},
        options::Supported,
        params::{Consistency, QueryParams, QueryValues, Value},
        prepare::{Execute, Prepare},
        query::Query,
        register::{EventType, Register},
        result::{Prepared, ResultBody, Rows},
        schema_change::{SchemaChange, SchemaChangeTarget, SchemaChangeType},
        startup::Startup,
    },
};
use proptest::prelude::*;

fn all_versions() -> impl Strategy<Value = ProtocolVersion> {
    prop_oneof![
        Just(ProtocolVersion::V3),
        Just(ProtocolVersion::V4),
        Just(ProtocolVersion::V5),
        Just(ProtocolVersion::DseV1),
        Just(ProtocolVersion::DseV2),
    ]
}

fn arb_consistency() -> impl Strategy<Value = Consistency> {
    prop_oneof![
        Just(Consistency::Any),
        Just(Consistency::One),
        Just(Consistency::Quorum),
        Just(Consistency::All),
        Just(Consistency::LocalQuorum),
        Just(Consistency::Serial),
        Just(Consistency::LocalOne),
    ]
}

fn arb_bytes(max: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..max).prop_map(Bytes::from)
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

fn arb_value(version: ProtocolVersion) -> BoxedStrategy<Value> {
    if version.supports_unset_values() {
        prop_oneof![arb_bytes(16).prop_map(Value::Some), Just(Value::Null), Just(Value::Unset)]
            .boxed()
    } else {
        prop_oneof![arb_bytes(16).prop_map(Value::Some), Just(Value::Null)].boxed()
    }
}

fn arb_values(version: ProtocolVersion) -> BoxedStrategy<QueryValues> {
    prop_oneof![
        prop::collection::vec(arb_value(version), 0..4).prop_map(QueryValues::Positional),
        prop::collection::vec((arb_name(), arb_value(version)), 1..4)
            .prop_map(|pairs| QueryValues::Named(pairs.into_iter().collect())),
    ]
    .boxed()
}

fn arb_params(version: ProtocolVersion) -> BoxedStrategy<QueryParams> {
    let keyspace_ok = version.supports_keyspace_per_statement();
    (
        arb_consistency(),
        arb_values(version),
        any::<bool>(),
        prop::option::of(1..10_000i32),
        prop::option::of(arb_bytes(12).prop_filter("non-empty", |b| !b.is_empty())),
        prop::option::of(prop_oneof![Just(Consistency::Serial), Just(Consistency::LocalSerial)]),
        prop::option::of(any::<i64>()),
        if keyspace_ok { prop::option::of(arb_name()).boxed() } else { Just(None).boxed() },
        if keyspace_ok { prop::option::of(any::<i32>()).boxed() } else { Just(None).boxed() },
    )
        .prop_map(
            |(
                consistency,
                values,
                skip_metadata,
                page_size,
                paging_state,
                serial_consistency,
                default_timestamp,
                keyspace,
                now_in_seconds,
            )| QueryParams {
                consistency,
                values,
                skip_metadata,
                page_size,
                paging_state,
                serial_consistency,
                default_timestamp,
                keyspace,
                now_in_seconds,
            },
        )
        .boxed()
}

fn arb_schema_change(version: ProtocolVersion) -> BoxedStrategy<SchemaChange> {
    let change_type = prop_oneof![
        Just(SchemaChangeType::Created),
        Just(SchemaChangeType::Updated),
        Just(SchemaChangeType::Dropped),
    ];
    let target = if version.supports_function_targets() {
        prop_oneof![
            Just(SchemaChangeTarget::Keyspace),
            arb_name().prop_map(|object| SchemaChangeTarget::Table { object }),
            arb_name().prop_map(|object| SchemaChangeTarget::Type { object }),
            (arb_name(), prop::collection::vec(arb_name(), 0..3)).prop_map(
                |(object, arguments)| SchemaChangeTarget::Function { object, arguments }
            ),
            (arb_name(), prop::collection::vec(arb_name(), 0..3)).prop_map(
                |(object, arguments)| SchemaChangeTarget::Aggregate { object, arguments }
            ),
        ]
        .boxed()
    } else {
        prop_oneof![
            Just(SchemaChangeTarget::Keyspace),
            arb_name().prop_map(|object| SchemaChangeTarget::Table { object }),
            arb_name().prop_map(|object| SchemaChangeTarget::Type { object }),
        ]
        .boxed()
    };
    (change_type, arb_name(), target)
        .prop_map(|(change_type, keyspace, target)| SchemaChange { change_type, keyspace, target })
        .boxed()
}

fn arb_request(version: ProtocolVersion) -> BoxedStrategy<Message> {
    let execute = arb_params(version).prop_map(move |params| {
        Message::Execute(Execute {
            id: Bytes::from_static(&[0xCA, 0xFE, 0xBA, 0xBE]),
            result_metadata_id: version
                .has_result_metadata_id()
                .then(|| Bytes::from_static(&[0x01, 0x02])),
            params,
        })
    });
    let batch = (
        prop_oneof![Just(BatchKind::Logged), Just(BatchKind::Unlogged), Just(BatchKind::Counter)],
        prop::collection::vec(
            prop_oneof![
                (arb_name(), prop::collection::vec(arb_value(version), 0..3))
                    .prop_map(|(query, values)| BatchStatement::Query { query, values }),
                (arb_bytes(8), prop::collection::vec(arb_value(version), 0..3))
                    .prop_map(|(id, values)| BatchStatement::Prepared { id, values }),
            ],
            1..4,
        ),
        arb_consistency(),
    )
        .prop_map(|(kind, statements, consistency)| {
            let mut batch = Batch::logged(statements, consistency);
            batch.kind = kind;
            Message::Batch(batch)
        });

    let simple = prop_oneof![
        Just(Message::Startup(Startup::new())),
        Just(Message::Startup(Startup::with_compression("lz4"))),
        Just(Message::Options),
        Just(Message::Register(Register::all())),
        Just(Message::Register(Register { event_types: vec![EventType::SchemaChange] })),
        prop::option::of(arb_bytes(16))
            .prop_map(|token| Message::AuthResponse(AuthResponse { token })),
    ];

    prop_oneof![
        simple,
        (arb_name(), arb_params(version))
            .prop_map(|(query, params)| Message::Query(Query { query, params })),
        arb_name().prop_map(|q| Message::Prepare(Prepare::new(format!("SELECT {q} FROM t")))),
        execute,
        batch,
    ]
    .boxed()
}

fn arb_reason_map() -> impl Strategy<Value = OrderedMap<IpAddr, u16>> {
    prop::collection::vec((any::<[u8; 4]>(), any::<u16>()), 0..4).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(octets, reason)| (IpAddr::V4(Ipv4Addr::from(octets)), reason))
            .collect()
    })
}

fn arb_error(version: ProtocolVersion) -> BoxedStrategy<Message> {
    let read_failure = (arb_consistency(), 0..4i32, 0..4i32, arb_reason_map(), any::<bool>())
        .prop_map(move |(consistency, received, block_for, reason_map, data_present)| {
            let (num_failures, reason_map) = if version.has_reason_maps() {
                (reason_map.len() as i32, reason_map)
            } else {
                (received + 1, OrderedMap::new())
            };
            ErrorBody::ReadFailure {
                message: "read failed".to_owned(),
                consistency,
                received,
                block_for,
                num_failures,
                reason_map,
                data_present,
            }
        });
    let write_failure = (arb_consistency(), 0..4i32, 0..4i32, arb_reason_map())
        .prop_map(move |(consistency, received, block_for, reason_map)| {
            let (num_failures, reason_map) = if version.has_reason_maps() {
                (reason_map.len() as i32, reason_map)
            } else {
                (1, OrderedMap::new())
            };
            ErrorBody::WriteFailure {
                message: "write failed".to_owned(),
                consistency,
                received,
                block_for,
                num_failures,
                reason_map,
                write_type: "SIMPLE".to_owned(),
            }
        });

    let common = prop_oneof![
        arb_name().prop_map(|m| ErrorBody::ServerError { message: m }),
        arb_name().prop_map(|m| ErrorBody::SyntaxError { message: m }),
        (arb_consistency(), 0..5i32, 0..5i32).prop_map(|(consistency, required, alive)| {
            ErrorBody::Unavailable { message: "unavailable".to_owned(), consistency, required, alive }
        }),
        (arb_name(), arb_name()).prop_map(|(keyspace, table)| ErrorBody::AlreadyExists {
            message: "exists".to_owned(),
            keyspace,
            table,
        }),
        arb_bytes(8).prop_map(|id| ErrorBody::Unprepared { message: "unprepared".to_owned(), id }),
        read_failure,
        write_failure,
    ];

    if version.has_reason_maps() {
        prop_oneof![
            common,
            Just(ErrorBody::CdcWriteFailure { message: "cdc space full".to_owned() }),
        ]
        .prop_map(Message::Error)
        .boxed()
    } else {
        common.prop_map(Message::Error).boxed()
    }
}

fn arb_rows() -> BoxedStrategy<Message> {
    let column_types = prop_oneof![
        Just(DataType::Int),
        Just(DataType::Varchar),
        Just(DataType::Uuid),
        Just(DataType::List(Box::new(DataType::Bigint))),
    ];
    (
        prop::collection::vec((arb_name(), column_types), 1..4),
        prop::collection::vec(prop::option::of(arb_bytes(8)), 0..4),
    )
        .prop_map(|(columns, cells)| {
            let specs: Vec<ColumnSpec> = columns
                .into_iter()
                .map(|(name, data_type)| ColumnSpec { table_spec: None, name, data_type })
                .collect();
            let width = specs.len();
            let metadata = RowsMetadata::of_columns(
                TableSpec { keyspace: "ks".to_owned(), table: "t".to_owned() },
                specs,
            );
            let rows: Vec<Vec<Option<Bytes>>> = cells
                .chunks(width)
                .filter(|chunk| chunk.len() == width)
                .map(<[Option<Bytes>]>::to_vec)
                .collect();
            Message::Result(ResultBody::Rows(Rows { metadata, rows }))
        })
        .boxed()
}

fn arb_response(version: ProtocolVersion) -> BoxedStrategy<Message> {
    let prepared = arb_bytes(8).prop_map(move |id| {
        Message::Result(ResultBody::Prepared(Prepared {
            id,
            result_metadata_id: version
                .has_result_metadata_id()
                .then(|| Bytes::from_static(&[9, 9])),
            variables: PreparedMetadata {
                pk_indices: if version.supports_unset_values() { vec![0] } else { vec![] },
                global_spec: Some(TableSpec { keyspace: "ks".to_owned(), table: "t".to_owned() }),
                columns: vec![ColumnSpec {
                    table_spec: None,
                    name: "k".to_owned(),
                    data_type: DataType::Int,
                }],
            },
            result_metadata: RowsMetadata::of_columns(
                TableSpec { keyspace: "ks".to_owned(), table: "t".to_owned() },
                vec![ColumnSpec {
                    table_spec: None,
                    name: "v".to_owned(),
                    data_type: DataType::Blob,
                }],
            ),
        }))
    });

    let event = prop_oneof![
        (
            prop_oneof![
                Just(TopologyChangeType::NewNode),
                Just(TopologyChangeType::RemovedNode),
                Just(TopologyChangeType::MovedNode)
            ],
            any::<[u8; 4]>(),
            any::<u16>(),
        )
            .prop_map(|(change, octets, port)| {
                Message::Event(Event::TopologyChange {
                    change,
                    address: (Ipv4Addr::from(octets), port).into(),
                })
            }),
        (
            prop_oneof![Just(StatusChangeType::Up), Just(StatusChangeType::Down)],
            any::<[u8; 16]>(),
            any::<u16>(),
        )
            .prop_map(|(change, octets, port)| {
                Message::Event(Event::StatusChange {
                    change,
                    address: (Ipv6Addr::from(octets), port).into(),
                })
            }),
        arb_schema_change(version).prop_map(|c| Message::Event(Event::SchemaChange(c))),
    ];

    let session = prop_oneof![
        Just(Message::Ready),
        Just(Message::Authenticate(Authenticate {
            authenticator: "org.apache.cassandra.auth.PasswordAuthenticator".to_owned(),
        })),
        Just(Message::Supported(Supported {
            options: [("CQL_VERSION".to_owned(), vec!["3.4.5".to_owned()])].into_iter().collect(),
        })),
        prop::option::of(arb_bytes(16))
            .prop_map(|token| Message::AuthChallenge(AuthChallenge { token })),
        prop::option::of(arb_bytes(16))
            .prop_map(|token| Message::AuthSuccess(AuthSuccess { token })),
    ];
    let results = prop_oneof![
        Just(Message::Result(ResultBody::Void)),
        arb_name().prop_map(|ks| Message::Result(ResultBody::SetKeyspace(ks))),
        arb_rows(),
        prepared,
        arb_schema_change(version).prop_map(|c| Message::Result(ResultBody::SchemaChange(c))),
    ];

    prop_oneof![session, results, arb_error(version), event].boxed()
}

fn codecs(version: ProtocolVersion) -> (FrameCodec, FrameCodec) {
    (
        FrameCodec::client(version).build().expect("client codec builds"),
        FrameCodec::server(version).build().expect("server codec builds"),
    )
}

proptest! {
    #[test]
    fn request_frames_round_trip(
        (version, message, stream) in all_versions().prop_flat_map(|v| {
            (Just(v), arb_request(v), 0..=i16::MAX)
        })
    ) {
        let (client, server) = codecs(version);
        let frame = Frame::request(version, stream, message);

        let mut wire = Vec::new();
        client.encode(&frame, &mut wire).expect("encode succeeds");
        prop_assert_eq!(wire.len(), client.encoded_size(&frame).expect("size succeeds"));

        let mut cursor: &[u8] = &wire;
        let decoded = server.decode(&mut cursor).expect("decode succeeds");
        prop_assert!(cursor.is_empty(), "decode left {} byte(s)", cursor.len());

        prop_assert_eq!(decoded.stream, frame.stream);
        prop_assert_eq!(decoded.opcode(), frame.opcode());
        prop_assert_eq!(decoded.flags, frame.flags);
        prop_assert_eq!(decoded.version, frame.version);
        prop_assert_eq!(decoded.direction, Direction::Request);
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn response_frames_round_trip(
        (version, message, stream) in all_versions().prop_flat_map(|v| {
            (Just(v), arb_response(v), any::<i16>())
        })
    ) {
        let (client, server) = codecs(version);
        let frame = Frame::response(version, stream, message);

        let mut wire = Vec::new();
        server.encode(&frame, &mut wire).expect("encode succeeds");
        prop_assert_eq!(wire.len(), server.encoded_size(&frame).expect("size succeeds"));

        let mut cursor: &[u8] = &wire;
        let decoded = client.decode(&mut cursor).expect("decode succeeds");
        prop_assert!(cursor.is_empty(), "decode left {} byte(s)", cursor.len());
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn encoded_size_is_pure(
        (version, message) in all_versions().prop_flat_map(|v| (Just(v), arb_request(v)))
    ) {
        let (client, _) = codecs(version);
        let frame = Frame::request(version, 0, message);
        let first = client.encoded_size(&frame).expect("size succeeds");
        let second = client.encoded_size(&frame).expect("size succeeds");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn envelope_round_trip(
        (warnings, payload_entries) in (
            prop::collection::vec(".{0,12}", 0..3),
            prop::collection::vec(
                ("[a-z]{1,8}", prop::option::of(prop::collection::vec(any::<u8>(), 0..8))),
                0..3,
            ),
        )
    ) {
        let version = ProtocolVersion::V4;
        let (client, server) = codecs(version);

        let payload: OrderedMap<String, Option<Bytes>> =
            payload_entries.into_iter().map(|(k, v)| (k, v.map(Bytes::from))).collect();
        let frame = Frame::response(version, 2, Message::Ready)
            .with_warnings(warnings)
            .with_custom_payload(payload);

        let mut wire = Vec::new();
        server.encode(&frame, &mut wire).expect("encode succeeds");
        let decoded = client.decode(&mut wire.as_slice()).expect("decode succeeds");
        prop_assert_eq!(decoded, frame);
    }
}
