//! Fuzz target for frame decoding.
//!
//! Drives arbitrary byte sequences through both client- and server-side
//! decoders of every supported version to find:
//! - Parser crashes or panics
//! - Integer overflows in length handling
//! - Buffer over-reads on truncated input
//!
//! The decoder should NEVER panic. Invalid input must return an error.

#![no_main]

use cqlframe_proto::{FrameCodec, ProtocolVersion};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for version in [
        ProtocolVersion::V3,
        ProtocolVersion::V4,
        ProtocolVersion::V5,
        ProtocolVersion::DseV1,
        ProtocolVersion::DseV2,
    ] {
        if let Ok(codec) = FrameCodec::client(version).build() {
            let _ = codec.decode(&mut &data[..]);
        }
        if let Ok(codec) = FrameCodec::server(version).build() {
            let _ = codec.decode(&mut &data[..]);
        }
    }
});
