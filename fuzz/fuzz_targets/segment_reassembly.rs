//! Fuzz target for segment reassembly.
//!
//! Feeds arbitrary slice sequences into the accumulator; reassembly must
//! never panic regardless of slice boundaries or malformed frame headers.

#![no_main]

use bytes::Bytes;
use cqlframe_proto::{Segment, SegmentAccumulator};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut accumulator = SegmentAccumulator::new();
    for chunk in data.chunks(17) {
        let (flag, payload) = match chunk.split_first() {
            Some(split) => split,
            None => continue,
        };
        let segment = Segment {
            payload: Bytes::copy_from_slice(payload),
            self_contained: flag & 1 == 1,
        };
        if accumulator.push(segment).is_err() {
            break;
        }
    }
});
