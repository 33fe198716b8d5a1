//! Block and file header checksums
//!
//! A block checksum covers either the first 64 bytes of the block or the
//! whole block, depending on the block flags. The checksum field itself
//! (bytes 32..36) is zeroed before computing.
//!
//! The file header is written as one zero-padded allocation unit, and its
//! checksum (bytes 8..12) covers that whole unit. The allocation size is not
//! recorded in the header, so each power of two from 512 bytes up to
//! [`MAX_ALLOCATION_SIZE`] that the input holds is tried in turn.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DecodeError, DecodeResult};
use crate::format::header::{BlockHeader, FileHeader};

/// Bytes covered when the block checksum does not cover the data
pub const CHECKSUM_HEADER_SPAN: usize = 64;

/// Smallest allocation unit a file header can be written in
pub const MIN_ALLOCATION_SIZE: usize = 512;

/// Largest allocation unit tried when verifying the file header
pub const MAX_ALLOCATION_SIZE: usize = 64 * 1024;

/// A 32-bit checksum algorithm
pub trait Checksummer: Send + Sync {
    fn name(&self) -> &'static str;

    fn checksum(&self, data: &[u8]) -> u32;
}

#[cfg(feature = "crc32c")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32c;

#[cfg(feature = "crc32c")]
impl Checksummer for Crc32c {
    fn name(&self) -> &'static str {
        "crc32c"
    }

    fn checksum(&self, data: &[u8]) -> u32 {
        crc32c::crc32c(data)
    }
}

/// Outcome of a checksum check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// No checksum capability was configured
    Unverified,
    Mismatch { computed: u32 },
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verification::Verified => write!(f, "verified"),
            Verification::Unverified => write!(f, "unverified"),
            Verification::Mismatch { computed } => write!(f, "mismatch (computed {:#x})", computed),
        }
    }
}

/// Number of bytes from the block start the checksum covers
pub fn check_span(block: &BlockHeader) -> usize {
    if block.checksums_data() {
        block.disk_size as usize
    } else {
        CHECKSUM_HEADER_SPAN
    }
}

/// Compute the checksum of `data` with the field at `field_offset` zeroed
fn checksum_excluding(checksummer: &dyn Checksummer, data: &[u8], field_offset: usize) -> u32 {
    let mut copy = data.to_vec();
    LittleEndian::write_u32(&mut copy[field_offset..field_offset + 4], 0);
    checksummer.checksum(&copy)
}

/// Verify a raw block against its stored checksum
///
/// `raw` starts at the block start. A mismatch is an error scoped to the block.
pub fn verify_block(
    raw: &[u8],
    block: &BlockHeader,
    checksummer: Option<&dyn Checksummer>,
) -> DecodeResult<Verification> {
    let checksummer = match checksummer {
        Some(c) => c,
        None => return Ok(Verification::Unverified),
    };

    let span = check_span(block);
    if raw.len() < span {
        return Err(DecodeError::TruncatedBlock {
            needed: span,
            available: raw.len(),
        });
    }

    let computed = checksum_excluding(checksummer, &raw[..span], BlockHeader::CHECKSUM_OFFSET);
    if computed != block.checksum {
        return Err(DecodeError::ChecksumMismatch {
            stored: block.checksum,
            computed,
        });
    }
    Ok(Verification::Verified)
}

/// Verify the file header checksum; a mismatch is reported, not rejected
///
/// `raw` holds the leading bytes of the file. Returns `Unverified` without a
/// checksummer or when `raw` is shorter than the smallest allocation unit.
/// A mismatch carries the checksum computed over the smallest unit.
pub fn verify_file_header(
    raw: &[u8],
    header: &FileHeader,
    checksummer: Option<&dyn Checksummer>,
) -> Verification {
    let checksummer = match checksummer {
        Some(c) => c,
        None => return Verification::Unverified,
    };

    let mut first = None;
    let mut size = MIN_ALLOCATION_SIZE;
    while size <= MAX_ALLOCATION_SIZE && size <= raw.len() {
        let computed = checksum_excluding(checksummer, &raw[..size], FileHeader::CHECKSUM_OFFSET);
        if computed == header.checksum {
            return Verification::Verified;
        }
        first.get_or_insert(computed);
        size *= 2;
    }

    match first {
        Some(computed) => Verification::Mismatch { computed },
        None => Verification::Unverified,
    }
}

/// Compute and store the file header checksum over one allocation unit
///
/// `unit` starts with the serialized header, zero-padded to the allocation
/// size.
pub fn seal_file_header(unit: &mut [u8], checksummer: &dyn Checksummer) -> u32 {
    let offset = FileHeader::CHECKSUM_OFFSET;
    LittleEndian::write_u32(&mut unit[offset..offset + 4], 0);
    let sum = checksummer.checksum(unit);
    LittleEndian::write_u32(&mut unit[offset..offset + 4], sum);
    sum
}

/// Compute and store a block checksum in place
///
/// Used to build well-formed blocks; `raw` must hold at least the check span.
pub fn seal_block(raw: &mut [u8], block: &BlockHeader, checksummer: &dyn Checksummer) -> u32 {
    let span = check_span(block).min(raw.len());
    let offset = BlockHeader::CHECKSUM_OFFSET;
    LittleEndian::write_u32(&mut raw[offset..offset + 4], 0);
    let sum = checksummer.checksum(&raw[..span]);
    LittleEndian::write_u32(&mut raw[offset..offset + 4], sum);
    sum
}
