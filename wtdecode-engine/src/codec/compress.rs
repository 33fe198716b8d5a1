//! Page payload expansion
//!
//! Builds the logical page from the raw bytes of one block. Uncompressed
//! pages are used as stored, up to their in-memory size. Compressed pages
//! keep their first 64 bytes as stored:
//! - Bytes 0..40: page and block headers
//! - Bytes 40..64: start of the page data, never compressed
//! - Bytes 64..72: compressed length (u64)
//! - Bytes 72..: compressed remainder of the page
//!
//! The logical page is the 64-byte prefix followed by the decompressed
//! remainder.

use std::error::Error;

use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

use crate::error::{DecodeError, DecodeResult};
use crate::format::header::{BlockHeader, PageHeader, BLOCK_PREFIX_SIZE};

/// Leading bytes of a compressed block that are stored uncompressed
pub const COMPRESS_SKIP: usize = 64;

/// Offset of the compressed segment within a compressed block
pub const COMPRESSED_DATA_OFFSET: usize = COMPRESS_SKIP + 8;

/// A block compression algorithm
pub trait Decompressor: Send + Sync {
    fn name(&self) -> &'static str;

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>;
}

#[cfg(feature = "snappy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Snappy;

#[cfg(feature = "snappy")]
impl Decompressor for Snappy {
    fn name(&self) -> &'static str {
        "snappy"
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        Ok(snap::raw::Decoder::new().decompress_vec(input)?)
    }
}

/// Produce the logical page for a block
///
/// `raw` starts at the block start. The returned buffer includes the 40-byte
/// prefix, so page offsets and buffer offsets agree.
pub fn expand_payload(
    raw: &[u8],
    page: &PageHeader,
    block: &BlockHeader,
    decompressor: Option<&dyn Decompressor>,
) -> DecodeResult<Vec<u8>> {
    let memsize = page.memsize as usize;
    if memsize < BLOCK_PREFIX_SIZE {
        return Err(DecodeError::InvalidBlockHeader(format!(
            "memsize {} is smaller than the block prefix",
            memsize
        )));
    }

    if !page.is_compressed() {
        if raw.len() < memsize {
            return Err(DecodeError::TruncatedBlock {
                needed: memsize,
                available: raw.len(),
            });
        }
        return Ok(raw[..memsize].to_vec());
    }

    let decompressor = decompressor.ok_or(DecodeError::DecompressionUnavailable)?;

    if raw.len() < COMPRESSED_DATA_OFFSET {
        return Err(DecodeError::TruncatedBlock {
            needed: COMPRESSED_DATA_OFFSET,
            available: raw.len(),
        });
    }

    // The stored length is not trusted past the end of the block
    let stored_len = LittleEndian::read_u64(&raw[COMPRESS_SKIP..COMPRESSED_DATA_OFFSET]);
    let max_len = (block.disk_size as usize).saturating_sub(COMPRESSED_DATA_OFFSET) as u64;
    let length = stored_len.min(max_len) as usize;

    let end = COMPRESSED_DATA_OFFSET + length;
    if raw.len() < end {
        return Err(DecodeError::TruncatedBlock {
            needed: end,
            available: raw.len(),
        });
    }

    let expanded = decompressor
        .decompress(&raw[COMPRESSED_DATA_OFFSET..end])
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    let mut logical = Vec::with_capacity(COMPRESS_SKIP + expanded.len());
    logical.extend_from_slice(&raw[..COMPRESS_SKIP]);
    logical.extend_from_slice(&expanded);

    if logical.len() != memsize {
        warn!(
            memsize,
            actual = logical.len(),
            codec = decompressor.name(),
            "decompressed page size does not match memsize"
        );
    }

    Ok(logical)
}

/// Compress a logical page into block layout
///
/// Returns the bytes from offset 64 onwards: the length field followed by
/// the compressed segment.
#[cfg(feature = "snappy")]
pub fn compress_page_tail(logical: &[u8]) -> Result<Vec<u8>, snap::Error> {
    let tail = logical.get(COMPRESS_SKIP..).unwrap_or(&[]);
    let compressed = snap::raw::Encoder::new().compress_vec(tail)?;
    let mut out = vec![0u8; 8];
    LittleEndian::write_u64(&mut out, compressed.len() as u64);
    out.extend(compressed);
    Ok(out)
}
