//! Packed integer codec
//!
//! Lengths, timestamps and transaction IDs inside cells are stored as packed
//! integers. Small values take a single byte; larger ones store their byte
//! count in the marker byte.
//!
//! ```text
//!  Marker       Next bytes   Min value              Max value
//!  [00 00xxxx]  -            reserved
//!  [00 01llll]  8-l          -2^64                  -2^13 - 2^6
//!  [00 1xxxxx]  1            -2^13 - 2^6            -2^6 - 1
//!  [01 xxxxxx]  0            -2^6                   -1
//!  [10 xxxxxx]  0            0                      2^6 - 1
//!  [11 0xxxxx]  1            2^6                    2^13 + 2^6 - 1
//!  [11 10llll]  l            2^13 + 2^6             2^64 - 1
//!  [11 11xxxx]  -            reserved
//! ```
//!
//! Multi-byte payloads are big-endian. Negative multi-byte values are sign
//! extended, positive ones are stored relative to the start of their range.

use crate::error::{DecodeError, DecodeResult};

pub const NEG_MULTI_MARKER: u8 = 0x10;
pub const NEG_2BYTE_MARKER: u8 = 0x20;
pub const NEG_1BYTE_MARKER: u8 = 0x40;
pub const POS_1BYTE_MARKER: u8 = 0x80;
pub const POS_2BYTE_MARKER: u8 = 0xc0;
pub const POS_MULTI_MARKER: u8 = 0xe0;

pub const NEG_1BYTE_MIN: i64 = -(1 << 6);
pub const NEG_2BYTE_MIN: i64 = -(1 << 13) + NEG_1BYTE_MIN;
pub const POS_1BYTE_MAX: i64 = (1 << 6) - 1;
pub const POS_2BYTE_MAX: i64 = (1 << 13) + POS_1BYTE_MAX;

const POS_MULTI_BASE: u64 = POS_2BYTE_MAX as u64 + 1;

/// Longest possible encoding: marker plus eight payload bytes
pub const MAX_PACKED_LEN: usize = 9;

/// Decode a signed packed integer, returning the value and bytes consumed
pub fn decode(buf: &[u8]) -> DecodeResult<(i64, usize)> {
    let marker = marker(buf)?;
    match marker {
        0x10..=0x1f => {
            let leading = (marker & 0x0f) as usize;
            if leading > 8 {
                return Err(DecodeError::MalformedVarint(marker));
            }
            let len = 8 - leading;
            let raw = big_endian(payload(buf, len)?);
            let value = if len == 8 {
                raw as i64
            } else {
                (-1i64 << (len * 8)) | raw as i64
            };
            Ok((value, 1 + len))
        }
        0x20..=0x3f => {
            let low = payload(buf, 1)?[0] as i64;
            let high = (marker & 0x1f) as i64;
            Ok((NEG_2BYTE_MIN + ((high << 8) | low), 2))
        }
        0x40..=0x7f => Ok((NEG_1BYTE_MIN + (marker & 0x3f) as i64, 1)),
        _ => {
            let (value, consumed) = decode_uint(buf)?;
            let value = i64::try_from(value).map_err(|_| DecodeError::MalformedVarint(marker))?;
            Ok((value, consumed))
        }
    }
}

/// Decode an unsigned packed integer, returning the value and bytes consumed
///
/// Markers for negative values are rejected.
pub fn decode_uint(buf: &[u8]) -> DecodeResult<(u64, usize)> {
    let marker = marker(buf)?;
    match marker {
        0x80..=0xbf => Ok(((marker & 0x3f) as u64, 1)),
        0xc0..=0xdf => {
            let low = payload(buf, 1)?[0] as u64;
            let high = (marker & 0x1f) as u64;
            Ok((POS_1BYTE_MAX as u64 + 1 + ((high << 8) | low), 2))
        }
        0xe0..=0xef => {
            let len = (marker & 0x0f) as usize;
            if len > 8 {
                return Err(DecodeError::MalformedVarint(marker));
            }
            let raw = big_endian(payload(buf, len)?);
            let value = raw
                .checked_add(POS_MULTI_BASE)
                .ok_or(DecodeError::MalformedVarint(marker))?;
            Ok((value, 1 + len))
        }
        _ => Err(DecodeError::MalformedVarint(marker)),
    }
}

/// Encode a signed value
pub fn encode(value: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_PACKED_LEN);
    encode_into(value, &mut buf);
    buf
}

/// Append the encoding of a signed value to `buf`
pub fn encode_into(value: i64, buf: &mut Vec<u8>) {
    if value < NEG_2BYTE_MIN {
        let raw = value as u64;
        // The marker's low nibble counts the leading 0xff bytes that are dropped
        let leading = ((!raw).leading_zeros() / 8) as usize;
        buf.push(NEG_MULTI_MARKER | leading as u8);
        buf.extend_from_slice(&raw.to_be_bytes()[leading..]);
    } else if value < NEG_1BYTE_MIN {
        let offset = (value - NEG_2BYTE_MIN) as u64;
        buf.push(NEG_2BYTE_MARKER | ((offset >> 8) & 0x1f) as u8);
        buf.push((offset & 0xff) as u8);
    } else if value < 0 {
        let offset = (value - NEG_1BYTE_MIN) as u64;
        buf.push(NEG_1BYTE_MARKER | (offset & 0x3f) as u8);
    } else {
        encode_uint_into(value as u64, buf);
    }
}

/// Encode an unsigned value
pub fn encode_uint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_PACKED_LEN);
    encode_uint_into(value, &mut buf);
    buf
}

/// Append the encoding of an unsigned value to `buf`
pub fn encode_uint_into(value: u64, buf: &mut Vec<u8>) {
    if value <= POS_1BYTE_MAX as u64 {
        buf.push(POS_1BYTE_MARKER | value as u8);
    } else if value <= POS_2BYTE_MAX as u64 {
        let offset = value - (POS_1BYTE_MAX as u64 + 1);
        buf.push(POS_2BYTE_MARKER | ((offset >> 8) & 0x1f) as u8);
        buf.push((offset & 0xff) as u8);
    } else {
        let offset = value - POS_MULTI_BASE;
        let leading = (offset.leading_zeros() / 8) as usize;
        let len = 8 - leading;
        buf.push(POS_MULTI_MARKER | len as u8);
        buf.extend_from_slice(&offset.to_be_bytes()[leading..]);
    }
}

/// Number of bytes `encode` produces for a signed value
pub fn encoded_len(value: i64) -> usize {
    if value < NEG_2BYTE_MIN {
        1 + 8 - ((!(value as u64)).leading_zeros() / 8) as usize
    } else if value < NEG_1BYTE_MIN {
        2
    } else if value < 0 {
        1
    } else {
        encoded_len_uint(value as u64)
    }
}

/// Number of bytes `encode_uint` produces for an unsigned value
pub fn encoded_len_uint(value: u64) -> usize {
    if value <= POS_1BYTE_MAX as u64 {
        1
    } else if value <= POS_2BYTE_MAX as u64 {
        2
    } else {
        1 + 8 - ((value - POS_MULTI_BASE).leading_zeros() / 8) as usize
    }
}

fn marker(buf: &[u8]) -> DecodeResult<u8> {
    buf.first().copied().ok_or(DecodeError::UnexpectedEof {
        needed: 1,
        available: 0,
    })
}

/// The `len` bytes following the marker
fn payload(buf: &[u8], len: usize) -> DecodeResult<&[u8]> {
    buf.get(1..1 + len).ok_or(DecodeError::UnexpectedEof {
        needed: 1 + len,
        available: buf.len(),
    })
}

fn big_endian(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
