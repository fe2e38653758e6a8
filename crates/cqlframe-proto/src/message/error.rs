//! Error (0x00): server failure reports.
//!
//! Body: `code:int, message:string`, then code-specific fields. The codec
//! installs one sub-codec entry per error code; the entry owns the layout of
//! the trailing fields, including the version split between the v5-era
//! per-replica reason maps and the older single failure count.

use std::{collections::HashMap, net::IpAddr};

use bytes::{Buf, BufMut, Bytes};

use crate::{
    collections::OrderedMap,
    errors::{CodecError, ProtocolViolation, Result},
    message::{
        Message, MessageCodec, Opcode,
        params::{self, Consistency},
        wrong_message,
    },
    primitives,
    version::ProtocolVersion,
};

/// Error codes as defined by the protocol.
pub mod code {
    #![allow(missing_docs)]

    pub const SERVER_ERROR: i32 = 0x0000;
    pub const PROTOCOL_ERROR: i32 = 0x000A;
    pub const AUTH_ERROR: i32 = 0x0100;
    pub const UNAVAILABLE: i32 = 0x1000;
    pub const OVERLOADED: i32 = 0x1001;
    pub const IS_BOOTSTRAPPING: i32 = 0x1002;
    pub const TRUNCATE_ERROR: i32 = 0x1003;
    pub const WRITE_TIMEOUT: i32 = 0x1100;
    pub const READ_TIMEOUT: i32 = 0x1200;
    pub const READ_FAILURE: i32 = 0x1300;
    pub const FUNCTION_FAILURE: i32 = 0x1400;
    pub const WRITE_FAILURE: i32 = 0x1500;
    pub const CDC_WRITE_FAILURE: i32 = 0x1600;
    pub const SYNTAX_ERROR: i32 = 0x2000;
    pub const UNAUTHORIZED: i32 = 0x2100;
    pub const INVALID: i32 = 0x2200;
    pub const CONFIG_ERROR: i32 = 0x2300;
    pub const ALREADY_EXISTS: i32 = 0x2400;
    pub const UNPREPARED: i32 = 0x2500;
}

/// A decoded server error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    /// Internal server error
    ServerError {
        /// Server-provided description
        message: String,
    },
    /// The server considers the client's frame invalid
    ProtocolError {
        /// Server-provided description
        message: String,
    },
    /// Authentication failed
    AuthenticationError {
        /// Server-provided description
        message: String,
    },
    /// Not enough live replicas for the consistency level
    Unavailable {
        /// Server-provided description
        message: String,
        /// Consistency level of the operation
        consistency: Consistency,
        /// Replicas required by the consistency level
        required: i32,
        /// Replicas known alive
        alive: i32,
    },
    /// Coordinator shed the request
    Overloaded {
        /// Server-provided description
        message: String,
    },
    /// Coordinator is still bootstrapping
    IsBootstrapping {
        /// Server-provided description
        message: String,
    },
    /// TRUNCATE failed
    TruncateError {
        /// Server-provided description
        message: String,
    },
    /// Write did not reach enough replicas in time
    WriteTimeout {
        /// Server-provided description
        message: String,
        /// Consistency level of the operation
        consistency: Consistency,
        /// Acknowledgements received
        received: i32,
        /// Acknowledgements required
        block_for: i32,
        /// Kind of write that timed out
        write_type: String,
    },
    /// Read did not gather enough replicas in time
    ReadTimeout {
        /// Server-provided description
        message: String,
        /// Consistency level of the operation
        consistency: Consistency,
        /// Responses received
        received: i32,
        /// Responses required
        block_for: i32,
        /// Whether the data replica answered
        data_present: bool,
    },
    /// Replicas replied with failures to a read
    ReadFailure {
        /// Server-provided description
        message: String,
        /// Consistency level of the operation
        consistency: Consistency,
        /// Responses received
        received: i32,
        /// Responses required
        block_for: i32,
        /// Failures observed; equals `reason_map.len()` when decoded from a
        /// v5-era encoding
        num_failures: i32,
        /// Per-replica failure codes; empty when decoded from a pre-v5
        /// encoding
        reason_map: OrderedMap<IpAddr, u16>,
        /// Whether the data replica answered
        data_present: bool,
    },
    /// A user-defined function failed
    FunctionFailure {
        /// Server-provided description
        message: String,
        /// Keyspace of the function
        keyspace: String,
        /// Function name
        function: String,
        /// CQL argument types
        arg_types: Vec<String>,
    },
    /// Replicas replied with failures to a write
    WriteFailure {
        /// Server-provided description
        message: String,
        /// Consistency level of the operation
        consistency: Consistency,
        /// Acknowledgements received
        received: i32,
        /// Acknowledgements required
        block_for: i32,
        /// Failures observed; equals `reason_map.len()` when decoded from a
        /// v5-era encoding
        num_failures: i32,
        /// Per-replica failure codes; empty when decoded from a pre-v5
        /// encoding
        reason_map: OrderedMap<IpAddr, u16>,
        /// Kind of write that failed
        write_type: String,
    },
    /// CDC space is full (v5)
    CdcWriteFailure {
        /// Server-provided description
        message: String,
    },
    /// Statement is syntactically invalid
    SyntaxError {
        /// Server-provided description
        message: String,
    },
    /// Logged user lacks permission
    Unauthorized {
        /// Server-provided description
        message: String,
    },
    /// Statement is invalid for the schema
    Invalid {
        /// Server-provided description
        message: String,
    },
    /// Server-side configuration problem
    ConfigError {
        /// Server-provided description
        message: String,
    },
    /// Creation collided with an existing object
    AlreadyExists {
        /// Server-provided description
        message: String,
        /// Keyspace of the collision
        keyspace: String,
        /// Colliding table; empty for a keyspace-level collision
        table: String,
    },
    /// Prepared id unknown to the coordinator
    Unprepared {
        /// Server-provided description
        message: String,
        /// The unknown prepared id
        id: Bytes,
    },
}

impl ErrorBody {
    /// The protocol error code of this body.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::ServerError { .. } => code::SERVER_ERROR,
            Self::ProtocolError { .. } => code::PROTOCOL_ERROR,
            Self::AuthenticationError { .. } => code::AUTH_ERROR,
            Self::Unavailable { .. } => code::UNAVAILABLE,
            Self::Overloaded { .. } => code::OVERLOADED,
            Self::IsBootstrapping { .. } => code::IS_BOOTSTRAPPING,
            Self::TruncateError { .. } => code::TRUNCATE_ERROR,
            Self::WriteTimeout { .. } => code::WRITE_TIMEOUT,
            Self::ReadTimeout { .. } => code::READ_TIMEOUT,
            Self::ReadFailure { .. } => code::READ_FAILURE,
            Self::FunctionFailure { .. } => code::FUNCTION_FAILURE,
            Self::WriteFailure { .. } => code::WRITE_FAILURE,
            Self::CdcWriteFailure { .. } => code::CDC_WRITE_FAILURE,
            Self::SyntaxError { .. } => code::SYNTAX_ERROR,
            Self::Unauthorized { .. } => code::UNAUTHORIZED,
            Self::Invalid { .. } => code::INVALID,
            Self::ConfigError { .. } => code::CONFIG_ERROR,
            Self::AlreadyExists { .. } => code::ALREADY_EXISTS,
            Self::Unprepared { .. } => code::UNPREPARED,
        }
    }

    /// The server-provided message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ServerError { message }
            | Self::ProtocolError { message }
            | Self::AuthenticationError { message }
            | Self::Unavailable { message, .. }
            | Self::Overloaded { message }
            | Self::IsBootstrapping { message }
            | Self::TruncateError { message }
            | Self::WriteTimeout { message, .. }
            | Self::ReadTimeout { message, .. }
            | Self::ReadFailure { message, .. }
            | Self::FunctionFailure { message, .. }
            | Self::WriteFailure { message, .. }
            | Self::CdcWriteFailure { message }
            | Self::SyntaxError { message }
            | Self::Unauthorized { message }
            | Self::Invalid { message }
            | Self::ConfigError { message }
            | Self::AlreadyExists { message, .. }
            | Self::Unprepared { message, .. } => message,
        }
    }
}

type SimpleCtor = fn(String) -> ErrorBody;

/// Function-pair entry of the inner error registry.
///
/// `encode`/`encoded_size` cover the fields after `code` and `message`;
/// `decode` receives the already-read message.
struct ErrorSubCodec {
    encode: fn(&ErrorBody, &mut dyn BufMut, ProtocolVersion) -> Result<()>,
    encoded_size: fn(&ErrorBody, ProtocolVersion) -> Result<usize>,
    decode: fn(String, &mut dyn Buf, ProtocolVersion) -> Result<ErrorBody>,
}

fn mismatch() -> CodecError {
    CodecError::invalid("error payload does not match its sub-codec")
}

fn unavailable_sub_codec() -> ErrorSubCodec {
    ErrorSubCodec {
        encode: |body, dst, _| {
            let ErrorBody::Unavailable { consistency, required, alive, .. } = body else {
                return Err(mismatch());
            };
            params::write_consistency(dst, *consistency);
            primitives::write_int(dst, *required);
            primitives::write_int(dst, *alive);
            Ok(())
        },
        encoded_size: |body, _| match body {
            ErrorBody::Unavailable { .. } => Ok(2 + 4 + 4),
            _ => Err(mismatch()),
        },
        decode: |message, src, _| {
            let consistency = params::read_consistency(src)?;
            let required = primitives::read_int(src)?;
            let alive = primitives::read_int(src)?;
            Ok(ErrorBody::Unavailable { message, consistency, required, alive })
        },
    }
}

fn write_timeout_sub_codec() -> ErrorSubCodec {
    ErrorSubCodec {
        encode: |body, dst, _| {
            let ErrorBody::WriteTimeout { consistency, received, block_for, write_type, .. } =
                body
            else {
                return Err(mismatch());
            };
            params::write_consistency(dst, *consistency);
            primitives::write_int(dst, *received);
            primitives::write_int(dst, *block_for);
            primitives::write_string(dst, write_type)
        },
        encoded_size: |body, _| match body {
            ErrorBody::WriteTimeout { write_type, .. } => {
                Ok(2 + 4 + 4 + primitives::size_of_string(write_type))
            }
            _ => Err(mismatch()),
        },
        decode: |message, src, _| {
            let consistency = params::read_consistency(src)?;
            let received = primitives::read_int(src)?;
            let block_for = primitives::read_int(src)?;
            let write_type = primitives::read_string(src)?;
            Ok(ErrorBody::WriteTimeout { message, consistency, received, block_for, write_type })
        },
    }
}

fn read_timeout_sub_codec() -> ErrorSubCodec {
    ErrorSubCodec {
        encode: |body, dst, _| {
            let ErrorBody::ReadTimeout { consistency, received, block_for, data_present, .. } =
                body
            else {
                return Err(mismatch());
            };
            params::write_consistency(dst, *consistency);
            primitives::write_int(dst, *received);
            primitives::write_int(dst, *block_for);
            primitives::write_byte(dst, u8::from(*data_present));
            Ok(())
        },
        encoded_size: |body, _| match body {
            ErrorBody::ReadTimeout { .. } => Ok(2 + 4 + 4 + 1),
            _ => Err(mismatch()),
        },
        decode: |message, src, _| {
            let consistency = params::read_consistency(src)?;
            let received = primitives::read_int(src)?;
            let block_for = primitives::read_int(src)?;
            let data_present = primitives::read_byte(src)? != 0;
            Ok(ErrorBody::ReadTimeout { message, consistency, received, block_for, data_present })
        },
    }
}

fn read_failure_sub_codec() -> ErrorSubCodec {
    ErrorSubCodec {
        encode: |body, dst, version| {
            let ErrorBody::ReadFailure {
                consistency,
                received,
                block_for,
                num_failures,
                reason_map,
                data_present,
                ..
            } = body
            else {
                return Err(mismatch());
            };
            params::write_consistency(dst, *consistency);
            primitives::write_int(dst, *received);
            primitives::write_int(dst, *block_for);
            if version.has_reason_maps() {
                primitives::write_reason_map(dst, reason_map)?;
            } else {
                primitives::write_int(dst, *num_failures);
            }
            primitives::write_byte(dst, u8::from(*data_present));
            Ok(())
        },
        encoded_size: |body, version| match body {
            ErrorBody::ReadFailure { reason_map, .. } => {
                let failures = if version.has_reason_maps() {
                    primitives::size_of_reason_map(reason_map)
                } else {
                    4
                };
                Ok(2 + 4 + 4 + failures + 1)
            }
            _ => Err(mismatch()),
        },
        decode: |message, src, version| {
            let consistency = params::read_consistency(src)?;
            let received = primitives::read_int(src)?;
            let block_for = primitives::read_int(src)?;
            let (num_failures, reason_map) = if version.has_reason_maps() {
                let reason_map = primitives::read_reason_map(src)?;
                (reason_map.len() as i32, reason_map)
            } else {
                (primitives::read_int(src)?, OrderedMap::new())
            };
            let data_present = primitives::read_byte(src)? != 0;
            Ok(ErrorBody::ReadFailure {
                message,
                consistency,
                received,
                block_for,
                num_failures,
                reason_map,
                data_present,
            })
        },
    }
}

fn write_failure_sub_codec() -> ErrorSubCodec {
    ErrorSubCodec {
        encode: |body, dst, version| {
            let ErrorBody::WriteFailure {
                consistency,
                received,
                block_for,
                num_failures,
                reason_map,
                write_type,
                ..
            } = body
            else {
                return Err(mismatch());
            };
            params::write_consistency(dst, *consistency);
            primitives::write_int(dst, *received);
            primitives::write_int(dst, *block_for);
            if version.has_reason_maps() {
                primitives::write_reason_map(dst, reason_map)?;
            } else {
                primitives::write_int(dst, *num_failures);
            }
            primitives::write_string(dst, write_type)
        },
        encoded_size: |body, version| match body {
            ErrorBody::WriteFailure { reason_map, write_type, .. } => {
                let failures = if version.has_reason_maps() {
                    primitives::size_of_reason_map(reason_map)
                } else {
                    4
                };
                Ok(2 + 4 + 4 + failures + primitives::size_of_string(write_type))
            }
            _ => Err(mismatch()),
        },
        decode: |message, src, version| {
            let consistency = params::read_consistency(src)?;
            let received = primitives::read_int(src)?;
            let block_for = primitives::read_int(src)?;
            let (num_failures, reason_map) = if version.has_reason_maps() {
                let reason_map = primitives::read_reason_map(src)?;
                (reason_map.len() as i32, reason_map)
            } else {
                (primitives::read_int(src)?, OrderedMap::new())
            };
            let write_type = primitives::read_string(src)?;
            Ok(ErrorBody::WriteFailure {
                message,
                consistency,
                received,
                block_for,
                num_failures,
                reason_map,
                write_type,
            })
        },
    }
}

fn function_failure_sub_codec() -> ErrorSubCodec {
    ErrorSubCodec {
        encode: |body, dst, _| {
            let ErrorBody::FunctionFailure { keyspace, function, arg_types, .. } = body else {
                return Err(mismatch());
            };
            primitives::write_string(dst, keyspace)?;
            primitives::write_string(dst, function)?;
            primitives::write_string_list(dst, arg_types)
        },
        encoded_size: |body, _| match body {
            ErrorBody::FunctionFailure { keyspace, function, arg_types, .. } => {
                Ok(primitives::size_of_string(keyspace)
                    + primitives::size_of_string(function)
                    + primitives::size_of_string_list(arg_types))
            }
            _ => Err(mismatch()),
        },
        decode: |message, src, _| {
            let keyspace = primitives::read_string(src)?;
            let function = primitives::read_string(src)?;
            let arg_types = primitives::read_string_list(src)?;
            Ok(ErrorBody::FunctionFailure { message, keyspace, function, arg_types })
        },
    }
}

fn already_exists_sub_codec() -> ErrorSubCodec {
    ErrorSubCodec {
        encode: |body, dst, _| {
            let ErrorBody::AlreadyExists { keyspace, table, .. } = body else {
                return Err(mismatch());
            };
            primitives::write_string(dst, keyspace)?;
            primitives::write_string(dst, table)
        },
        encoded_size: |body, _| match body {
            ErrorBody::AlreadyExists { keyspace, table, .. } => {
                Ok(primitives::size_of_string(keyspace) + primitives::size_of_string(table))
            }
            _ => Err(mismatch()),
        },
        decode: |message, src, _| {
            let keyspace = primitives::read_string(src)?;
            let table = primitives::read_string(src)?;
            Ok(ErrorBody::AlreadyExists { message, keyspace, table })
        },
    }
}

fn unprepared_sub_codec() -> ErrorSubCodec {
    ErrorSubCodec {
        encode: |body, dst, _| {
            let ErrorBody::Unprepared { id, .. } = body else {
                return Err(mismatch());
            };
            primitives::write_short_bytes(dst, id)
        },
        encoded_size: |body, _| match body {
            ErrorBody::Unprepared { id, .. } => Ok(primitives::size_of_short_bytes(id)),
            _ => Err(mismatch()),
        },
        decode: |message, src, _| {
            let id = primitives::read_short_bytes(src)?;
            Ok(ErrorBody::Unprepared { message, id })
        },
    }
}

/// Codec for Error under one protocol version.
pub struct ErrorCodec {
    version: ProtocolVersion,
    sub_codecs: HashMap<i32, ErrorSubCodec>,
    simple_ctors: HashMap<i32, SimpleCtor>,
}

impl ErrorCodec {
    /// Codec instance for `version` with every error code installed.
    ///
    /// `CDC_WRITE_FAILURE` is only registered when the version code is 5 or
    /// later; a pre-v5 peer emitting it is a protocol violation.
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        let mut simple_ctors: HashMap<i32, SimpleCtor> = HashMap::from([
            (code::SERVER_ERROR, (|message| ErrorBody::ServerError { message }) as SimpleCtor),
            (code::PROTOCOL_ERROR, (|message| ErrorBody::ProtocolError { message }) as SimpleCtor),
            (
                code::AUTH_ERROR,
                (|message| ErrorBody::AuthenticationError { message }) as SimpleCtor,
            ),
            (code::OVERLOADED, (|message| ErrorBody::Overloaded { message }) as SimpleCtor),
            (
                code::IS_BOOTSTRAPPING,
                (|message| ErrorBody::IsBootstrapping { message }) as SimpleCtor,
            ),
            (code::TRUNCATE_ERROR, (|message| ErrorBody::TruncateError { message }) as SimpleCtor),
            (code::SYNTAX_ERROR, (|message| ErrorBody::SyntaxError { message }) as SimpleCtor),
            (code::UNAUTHORIZED, (|message| ErrorBody::Unauthorized { message }) as SimpleCtor),
            (code::INVALID, (|message| ErrorBody::Invalid { message }) as SimpleCtor),
            (code::CONFIG_ERROR, (|message| ErrorBody::ConfigError { message }) as SimpleCtor),
        ]);
        if version.has_reason_maps() {
            simple_ctors.insert(
                code::CDC_WRITE_FAILURE,
                (|message| ErrorBody::CdcWriteFailure { message }) as SimpleCtor,
            );
        }

        let sub_codecs = HashMap::from([
            (code::UNAVAILABLE, unavailable_sub_codec()),
            (code::WRITE_TIMEOUT, write_timeout_sub_codec()),
            (code::READ_TIMEOUT, read_timeout_sub_codec()),
            (code::READ_FAILURE, read_failure_sub_codec()),
            (code::WRITE_FAILURE, write_failure_sub_codec()),
            (code::FUNCTION_FAILURE, function_failure_sub_codec()),
            (code::ALREADY_EXISTS, already_exists_sub_codec()),
            (code::UNPREPARED, unprepared_sub_codec()),
        ]);

        Self { version, sub_codecs, simple_ctors }
    }
}

impl std::fmt::Debug for ErrorCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCodec").field("version", &self.version).finish_non_exhaustive()
    }
}

impl MessageCodec for ErrorCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Error
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Error(body) = message else {
            return Err(wrong_message(Opcode::Error, message));
        };
        let code = body.code();
        if code == code::CDC_WRITE_FAILURE && !self.version.has_reason_maps() {
            return Err(CodecError::invalid(format!(
                "CDC write failure requires version code 5 or later, have {}",
                self.version
            )));
        }

        primitives::write_int(dst, code);
        primitives::write_string(dst, body.message())?;
        if let Some(sub) = self.sub_codecs.get(&code) {
            (sub.encode)(body, dst, self.version)?;
        }
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Error(body) = message else {
            return Err(wrong_message(Opcode::Error, message));
        };
        let code = body.code();
        if code == code::CDC_WRITE_FAILURE && !self.version.has_reason_maps() {
            return Err(CodecError::invalid(format!(
                "CDC write failure requires version code 5 or later, have {}",
                self.version
            )));
        }

        let mut size = 4 + primitives::size_of_string(body.message());
        if let Some(sub) = self.sub_codecs.get(&code) {
            size += (sub.encoded_size)(body, self.version)?;
        }
        Ok(size)
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let code = primitives::read_int(src)?;
        let message = primitives::read_string(src)?;

        let body = if let Some(sub) = self.sub_codecs.get(&code) {
            (sub.decode)(message, src, self.version)?
        } else if let Some(ctor) = self.simple_ctors.get(&code) {
            ctor(message)
        } else {
            return Err(ProtocolViolation::UnknownErrorCode(code).into());
        };
        Ok(Message::Error(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(body: ErrorBody, version: ProtocolVersion) -> Vec<u8> {
        let codec = ErrorCodec::new(version);
        let message = Message::Error(body);
        let mut wire = Vec::new();
        codec.encode(&message, &mut wire).unwrap();
        assert_eq!(wire.len(), codec.encoded_size(&message).unwrap());

        let mut cursor: &[u8] = &wire;
        assert_eq!(&codec.decode(&mut cursor).unwrap(), &message);
        assert!(cursor.is_empty());
        wire
    }

    #[test]
    fn simple_errors_round_trip() {
        for body in [
            ErrorBody::ServerError { message: "boom".to_owned() },
            ErrorBody::SyntaxError { message: "line 1:8 no viable alternative".to_owned() },
            ErrorBody::Unauthorized { message: "user has no SELECT".to_owned() },
            ErrorBody::ConfigError { message: "bad snitch".to_owned() },
        ] {
            round_trip(body.clone(), ProtocolVersion::V3);
            round_trip(body, ProtocolVersion::V5);
        }
    }

    #[test]
    fn unavailable_round_trip() {
        round_trip(
            ErrorBody::Unavailable {
                message: "cannot achieve QUORUM".to_owned(),
                consistency: Consistency::Quorum,
                required: 2,
                alive: 1,
            },
            ProtocolVersion::V4,
        );
    }

    #[test]
    fn read_failure_v4_layout() {
        let wire = round_trip(
            ErrorBody::ReadFailure {
                message: "read failed".to_owned(),
                consistency: Consistency::One,
                received: 1,
                block_for: 2,
                num_failures: 1,
                reason_map: OrderedMap::new(),
                data_present: false,
            },
            ProtocolVersion::V4,
        );

        // code, string("read failed"), short(1), int(1), int(2), int(1), byte(0)
        let mut expected = Vec::new();
        primitives::write_int(&mut expected, code::READ_FAILURE);
        primitives::write_string(&mut expected, "read failed").unwrap();
        primitives::write_short(&mut expected, 1);
        primitives::write_int(&mut expected, 1);
        primitives::write_int(&mut expected, 2);
        primitives::write_int(&mut expected, 1);
        primitives::write_byte(&mut expected, 0);
        assert_eq!(wire, expected);
    }

    #[test]
    fn read_failure_v5_reason_map_layout() {
        let reason_map: OrderedMap<IpAddr, u16> =
            [("127.0.0.1".parse().unwrap(), 0)].into_iter().collect();
        let wire = round_trip(
            ErrorBody::ReadFailure {
                message: "read failed".to_owned(),
                consistency: Consistency::One,
                received: 1,
                block_for: 2,
                num_failures: 1,
                reason_map: reason_map.clone(),
                data_present: false,
            },
            ProtocolVersion::V5,
        );

        let mut expected = Vec::new();
        primitives::write_int(&mut expected, code::READ_FAILURE);
        primitives::write_string(&mut expected, "read failed").unwrap();
        primitives::write_short(&mut expected, 1);
        primitives::write_int(&mut expected, 1);
        primitives::write_int(&mut expected, 2);
        primitives::write_reason_map(&mut expected, &reason_map).unwrap();
        primitives::write_byte(&mut expected, 0);
        assert_eq!(wire, expected);
    }

    #[test]
    fn read_failure_v5_decode_sets_num_failures_from_map() {
        let reason_map: OrderedMap<IpAddr, u16> =
            [("10.0.0.1".parse().unwrap(), 1), ("10.0.0.2".parse().unwrap(), 2)]
                .into_iter()
                .collect();
        let codec = ErrorCodec::new(ProtocolVersion::V5);
        let mut wire = Vec::new();
        codec
            .encode(
                &Message::Error(ErrorBody::ReadFailure {
                    message: "m".to_owned(),
                    consistency: Consistency::One,
                    received: 0,
                    block_for: 2,
                    num_failures: 2,
                    reason_map,
                    data_present: true,
                }),
                &mut wire,
            )
            .unwrap();

        let Message::Error(ErrorBody::ReadFailure { num_failures, reason_map, .. }) =
            codec.decode(&mut &wire[..]).unwrap()
        else {
            panic!("wrong body");
        };
        assert_eq!(num_failures, 2);
        assert_eq!(reason_map.len(), 2);
    }

    #[test]
    fn write_failure_round_trip_both_eras() {
        let body = ErrorBody::WriteFailure {
            message: "write failed".to_owned(),
            consistency: Consistency::All,
            received: 2,
            block_for: 3,
            num_failures: 1,
            reason_map: OrderedMap::new(),
            write_type: "SIMPLE".to_owned(),
        };
        round_trip(body, ProtocolVersion::V3);

        let body = ErrorBody::WriteFailure {
            message: "write failed".to_owned(),
            consistency: Consistency::All,
            received: 2,
            block_for: 3,
            num_failures: 1,
            reason_map: [("127.0.0.1".parse::<IpAddr>().unwrap(), 0)].into_iter().collect(),
            write_type: "BATCH_LOG".to_owned(),
        };
        round_trip(body, ProtocolVersion::DseV1);
    }

    #[test]
    fn already_exists_layout() {
        let wire = round_trip(
            ErrorBody::AlreadyExists {
                message: "exists".to_owned(),
                keyspace: "ks".to_owned(),
                table: "t".to_owned(),
            },
            ProtocolVersion::V4,
        );

        let mut expected = Vec::new();
        primitives::write_int(&mut expected, code::ALREADY_EXISTS);
        primitives::write_string(&mut expected, "exists").unwrap();
        primitives::write_string(&mut expected, "ks").unwrap();
        primitives::write_string(&mut expected, "t").unwrap();
        assert_eq!(wire, expected);
    }

    #[test]
    fn already_exists_keyspace_level_has_empty_table() {
        round_trip(
            ErrorBody::AlreadyExists {
                message: "keyspace exists".to_owned(),
                keyspace: "ks".to_owned(),
                table: String::new(),
            },
            ProtocolVersion::V4,
        );
    }

    #[test]
    fn function_failure_round_trip() {
        round_trip(
            ErrorBody::FunctionFailure {
                message: "division by zero".to_owned(),
                keyspace: "ks".to_owned(),
                function: "div".to_owned(),
                arg_types: vec!["int".to_owned(), "int".to_owned()],
            },
            ProtocolVersion::V4,
        );
    }

    #[test]
    fn unprepared_round_trip() {
        round_trip(
            ErrorBody::Unprepared {
                message: "unknown id".to_owned(),
                id: Bytes::from_static(&[0xCA, 0xFE]),
            },
            ProtocolVersion::V4,
        );
    }

    #[test]
    fn cdc_write_failure_gated_to_v5() {
        round_trip(
            ErrorBody::CdcWriteFailure { message: "cdc full".to_owned() },
            ProtocolVersion::V5,
        );

        let codec = ErrorCodec::new(ProtocolVersion::V4);
        let mut wire = Vec::new();
        let err = codec
            .encode(
                &Message::Error(ErrorBody::CdcWriteFailure { message: "cdc full".to_owned() }),
                &mut wire,
            )
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument { .. }));

        // And a v4 decoder must reject the code entirely.
        let mut v5_wire = Vec::new();
        ErrorCodec::new(ProtocolVersion::V5)
            .encode(
                &Message::Error(ErrorBody::CdcWriteFailure { message: "cdc full".to_owned() }),
                &mut v5_wire,
            )
            .unwrap();
        let err = codec.decode(&mut &v5_wire[..]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolViolation::UnknownErrorCode(code::CDC_WRITE_FAILURE))
        ));
    }

    #[test]
    fn unknown_error_code_rejected() {
        let mut wire = Vec::new();
        primitives::write_int(&mut wire, 0x7777);
        primitives::write_string(&mut wire, "?").unwrap();
        let err = ErrorCodec::new(ProtocolVersion::V4).decode(&mut &wire[..]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolViolation::UnknownErrorCode(0x7777))
        ));
    }
}
