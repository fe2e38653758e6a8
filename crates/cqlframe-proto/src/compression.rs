//! Compression adapter contract for frame bodies.
//!
//! The frame codec only ever calls a [`Compressor`] around the payload bytes,
//! never around the header. Each adapter emits the exact self-description its
//! algorithm uses on the CQL wire: LZ4 bodies carry a big-endian int with the
//! uncompressed length ahead of the block, Snappy bodies are self-describing
//! raw Snappy. Adapters therefore take and return whole bodies and need no
//! out-of-band size.
//!
//! The algorithms themselves live behind cargo features (`lz4`, `snappy`);
//! the contract compiles without either.

use bytes::Bytes;

use crate::errors::CodecError;

/// Adapter error, wrapped into [`CodecError::Compression`] by the caller.
pub type CompressionError = Box<dyn std::error::Error + Send + Sync>;

/// Wraps and unwraps a frame body's bytes.
///
/// Implementations are stateless and shareable across threads.
pub trait Compressor: std::fmt::Debug + Send + Sync {
    /// Name advertised in the Startup `COMPRESSION` option.
    fn algorithm(&self) -> &'static str;

    /// Compress an entire frame body.
    fn compress(&self, body: &[u8]) -> Result<Bytes, CompressionError>;

    /// Inverse of [`Compressor::compress`].
    fn decompress(&self, body: &[u8]) -> Result<Bytes, CompressionError>;
}

pub(crate) fn wrap_failure(
    compressor: &dyn Compressor,
    source: CompressionError,
) -> CodecError {
    CodecError::Compression { algorithm: compressor.algorithm(), source }
}

/// LZ4 block compression with the protocol's uncompressed-length prefix.
#[cfg(feature = "lz4")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

#[cfg(feature = "lz4")]
impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, body: &[u8]) -> Result<Bytes, CompressionError> {
        let uncompressed_len = i32::try_from(body.len())
            .map_err(|_| format!("body of {} bytes exceeds int length prefix", body.len()))?;
        let block = lz4_flex::block::compress(body);
        let mut out = Vec::with_capacity(4 + block.len());
        out.extend_from_slice(&uncompressed_len.to_be_bytes());
        out.extend_from_slice(&block);
        Ok(Bytes::from(out))
    }

    fn decompress(&self, body: &[u8]) -> Result<Bytes, CompressionError> {
        let (prefix, block) = body
            .split_at_checked(4)
            .ok_or_else(|| format!("compressed body of {} bytes lacks length prefix", body.len()))?;
        let uncompressed_len = i32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        let uncompressed_len = usize::try_from(uncompressed_len)
            .map_err(|_| format!("negative uncompressed length {uncompressed_len}"))?;
        let out = lz4_flex::block::decompress(block, uncompressed_len)?;
        Ok(Bytes::from(out))
    }
}

/// Raw (non-framed) Snappy compression.
#[cfg(feature = "snappy")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SnappyCompressor;

#[cfg(feature = "snappy")]
impl Compressor for SnappyCompressor {
    fn algorithm(&self) -> &'static str {
        "snappy"
    }

    fn compress(&self, body: &[u8]) -> Result<Bytes, CompressionError> {
        let out = snap::raw::Encoder::new().compress_vec(body)?;
        Ok(Bytes::from(out))
    }

    fn decompress(&self, body: &[u8]) -> Result<Bytes, CompressionError> {
        let out = snap::raw::Decoder::new().decompress_vec(body)?;
        Ok(Bytes::from(out))
    }
}
