//! Byte-exact wire vectors.
//!
//! These pin the codec to the native protocol's byte layout, independent of
//! the round-trip properties: a symmetric bug in encoder and decoder would
//! pass every round trip and still corrupt the wire. Expected bytes are
//! written out as hex.

use bytes::Bytes;
use cqlframe_proto::{
    Frame, FrameCodec, Message, OrderedMap, ProtocolVersion,
    message::{
        error::ErrorBody,
        event::Event,
        params::Consistency,
        result::ResultBody,
        schema_change::{SchemaChange, SchemaChangeTarget, SchemaChangeType},
        startup::Startup,
    },
};

fn encode_message(message: Message, version: ProtocolVersion) -> Vec<u8> {
    let codec = if message.opcode().is_request() {
        FrameCodec::client(version)
    } else {
        FrameCodec::server(version)
    }
    .build()
    .expect("codec builds");

    let frame = if message.opcode().is_request() {
        Frame::request(version, 0, message)
    } else {
        Frame::response(version, 0, message)
    };

    let mut wire = Vec::new();
    codec.encode(&frame, &mut wire).expect("encode succeeds");
    wire
}

/// Body bytes only, header stripped.
fn encode_body(message: Message, version: ProtocolVersion) -> Vec<u8> {
    encode_message(message, version)[9..].to_vec()
}

#[test]
fn schema_change_keyspace_create_v4() {
    let body = encode_body(
        Message::Event(Event::SchemaChange(SchemaChange {
            change_type: SchemaChangeType::Created,
            keyspace: "test".to_owned(),
            target: SchemaChangeTarget::Keyspace,
        })),
        ProtocolVersion::V4,
    );

    // string("SCHEMA_CHANGE") string("CREATED") string("KEYSPACE") string("test")
    let expected = hex::decode(
        "000d534348454d415f4348414e4745\
         000743524541544544\
         00084b45595350414345\
         000474657374",
    )
    .unwrap();
    assert_eq!(body, expected);
    assert_eq!(body.len(), 40);
}

#[test]
fn schema_change_function_create_v4() {
    let body = encode_body(
        Message::Event(Event::SchemaChange(SchemaChange {
            change_type: SchemaChangeType::Created,
            keyspace: "test".to_owned(),
            target: SchemaChangeTarget::Function {
                object: "myfunction".to_owned(),
                arguments: vec!["int".to_owned(), "int".to_owned()],
            },
        })),
        ProtocolVersion::V4,
    );

    // Tail after the target string: string("test") string("myfunction")
    // short(2) string("int") string("int")
    let tail = hex::decode(
        "000474657374\
         000a6d7966756e6374696f6e\
         0002\
         0003696e74\
         0003696e74",
    )
    .unwrap();
    assert!(body.ends_with(&tail));
}

#[test]
fn read_failure_v4() {
    let body = encode_body(
        Message::Error(ErrorBody::ReadFailure {
            message: "read failed".to_owned(),
            consistency: Consistency::One,
            received: 1,
            block_for: 2,
            num_failures: 1,
            reason_map: OrderedMap::new(),
            data_present: false,
        }),
        ProtocolVersion::V4,
    );

    // int(0x1300) string("read failed") short(1) int(1) int(2) int(1) byte(0)
    let expected = hex::decode(
        "00001300\
         000b72656164206661696c6564\
         0001\
         00000001\
         00000002\
         00000001\
         00",
    )
    .unwrap();
    assert_eq!(body, expected);
}

#[test]
fn read_failure_v5() {
    let reason_map: OrderedMap<std::net::IpAddr, u16> =
        [("127.0.0.1".parse().unwrap(), 0)].into_iter().collect();
    let body = encode_body(
        Message::Error(ErrorBody::ReadFailure {
            message: "read failed".to_owned(),
            consistency: Consistency::One,
            received: 1,
            block_for: 2,
            num_failures: 1,
            reason_map,
            data_present: false,
        }),
        ProtocolVersion::V5,
    );

    // int(0x1300) string("read failed") short(1) int(1) int(2)
    // int(1) inetaddr(127.0.0.1) short(0) byte(0)
    let expected = hex::decode(
        "00001300\
         000b72656164206661696c6564\
         0001\
         00000001\
         00000002\
         00000001\
         047f000001\
         0000\
         00",
    )
    .unwrap();
    assert_eq!(body, expected);
}

#[test]
fn already_exists() {
    let body = encode_body(
        Message::Error(ErrorBody::AlreadyExists {
            message: "exists".to_owned(),
            keyspace: "ks".to_owned(),
            table: "t".to_owned(),
        }),
        ProtocolVersion::V4,
    );

    // int(0x2400) string("exists") string("ks") string("t")
    let expected = hex::decode(
        "00002400\
         0006657869737473\
         00026b73\
         000174",
    )
    .unwrap();
    assert_eq!(body, expected);
}

#[test]
fn startup_with_empty_option_map() {
    let body = encode_body(
        Message::Startup(Startup { options: OrderedMap::new() }),
        ProtocolVersion::V4,
    );
    // short(0) and nothing else
    assert_eq!(body, [0x00, 0x00]);
}

#[test]
fn startup_default_options() {
    let body = encode_body(Message::Startup(Startup::new()), ProtocolVersion::V4);

    // short(1) string("CQL_VERSION") string("3.0.0")
    let expected = hex::decode(
        "0001\
         000b43514c5f56455253494f4e\
         0005332e302e30",
    )
    .unwrap();
    assert_eq!(body, expected);
}

#[test]
fn void_result_is_kind_only() {
    let body = encode_body(Message::Result(ResultBody::Void), ProtocolVersion::V4);
    assert_eq!(body, [0x00, 0x00, 0x00, 0x01]);
}

#[test]
fn event_and_result_schema_change_share_bytes() {
    let change = SchemaChange {
        change_type: SchemaChangeType::Dropped,
        keyspace: "app".to_owned(),
        target: SchemaChangeTarget::Table { object: "users".to_owned() },
    };

    let via_event =
        encode_body(Message::Event(Event::SchemaChange(change.clone())), ProtocolVersion::V4);
    let via_result = encode_body(
        Message::Result(ResultBody::SchemaChange(change)),
        ProtocolVersion::V4,
    );

    // Event: string("SCHEMA_CHANGE") + payload; Result: int(5) + payload.
    let event_tail = &via_event[2 + "SCHEMA_CHANGE".len()..];
    let result_tail = &via_result[4..];
    assert_eq!(event_tail, result_tail);
}

#[test]
fn read_failure_reencoding_is_identity_per_era() {
    for version in [ProtocolVersion::V4, ProtocolVersion::V5] {
        let reason_map: OrderedMap<std::net::IpAddr, u16> = if version.has_reason_maps() {
            [("10.1.2.3".parse().unwrap(), 2)].into_iter().collect()
        } else {
            OrderedMap::new()
        };
        let original = encode_message(
            Message::Error(ErrorBody::ReadFailure {
                message: "m".to_owned(),
                consistency: Consistency::Two,
                received: 1,
                block_for: 2,
                num_failures: 1,
                reason_map,
                data_present: true,
            }),
            version,
        );

        let client = FrameCodec::client(version).build().unwrap();
        let server = FrameCodec::server(version).build().unwrap();
        let decoded = client.decode(&mut original.as_slice()).unwrap();

        let mut reencoded = Vec::new();
        server.encode(&decoded, &mut reencoded).unwrap();
        assert_eq!(reencoded, original, "re-encoding differs under {version}");
    }
}

#[test]
fn null_bytes_value_round_trips_as_null() {
    use cqlframe_proto::message::auth::AuthResponse;

    let null_body =
        encode_body(Message::AuthResponse(AuthResponse { token: None }), ProtocolVersion::V4);
    assert_eq!(null_body, hex::decode("ffffffff").unwrap());

    let empty_body = encode_body(
        Message::AuthResponse(AuthResponse { token: Some(Bytes::new()) }),
        ProtocolVersion::V4,
    );
    assert_eq!(empty_body, hex::decode("00000000").unwrap());
}

#[test]
fn frame_header_bytes() {
    let wire = encode_message(Message::Options, ProtocolVersion::V3);
    assert_eq!(wire, hex::decode("030000000500000000").unwrap());

    let wire = encode_message(Message::Options, ProtocolVersion::DseV2);
    assert_eq!(wire, hex::decode("420000000500000000").unwrap());
}
