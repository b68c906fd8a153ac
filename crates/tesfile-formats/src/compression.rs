//! Decompression for compressed plugin records and archive entries

use flate2::read::ZlibDecoder;
use std::io::Read;
use thiserror::Error;

/// Errors raised while inflating a payload
#[derive(Debug, Error)]
pub enum DecompressError {
    /// Zlib stream could not be decoded
    #[error("zlib decompression failed: {0}")]
    Zlib(#[source] std::io::Error),

    /// LZ4 frame could not be decoded
    #[error("LZ4 frame decompression failed: {0}")]
    Lz4(#[source] std::io::Error),

    /// Output grew past the configured limit
    #[error("decompressed size exceeds limit of {limit} bytes")]
    LimitExceeded {
        /// Configured maximum output size
        limit: usize,
    },
}

/// Inflate a zlib stream, refusing to produce more than `limit` bytes
pub fn inflate_zlib(data: &[u8], size_hint: usize, limit: usize) -> Result<Vec<u8>, DecompressError> {
    read_limited(ZlibDecoder::new(data), size_hint, limit, DecompressError::Zlib)
}

/// Decode an LZ4 frame, refusing to produce more than `limit` bytes
pub fn decode_lz4_frame(
    data: &[u8],
    size_hint: usize,
    limit: usize,
) -> Result<Vec<u8>, DecompressError> {
    read_limited(
        lz4_flex::frame::FrameDecoder::new(data),
        size_hint,
        limit,
        DecompressError::Lz4,
    )
}

fn read_limited<D: Read>(
    mut decoder: D,
    size_hint: usize,
    limit: usize,
    wrap: fn(std::io::Error) -> DecompressError,
) -> Result<Vec<u8>, DecompressError> {
    let mut decompressed = Vec::with_capacity(size_hint.min(limit));

    // Read in chunks to enforce size limit
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = decoder.read(&mut buffer).map_err(wrap)?;
        if bytes_read == 0 {
            break;
        }

        if decompressed.len() + bytes_read > limit {
            return Err(DecompressError::LimitExceeded { limit });
        }

        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    Ok(decompressed)
}
