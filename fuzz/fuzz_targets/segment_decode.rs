//! Fuzz target for v5 segment decoding.
//!
//! Arbitrary bytes must either decode into a checksummed segment or fail
//! with an error; corrupt headers and payloads must never panic or
//! over-read.

#![no_main]

use cqlframe_proto::SegmentCodec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = SegmentCodec.decode(&mut &data[..]);
});
