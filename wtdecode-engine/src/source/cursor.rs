//! Byte cursors over block and page buffers
//!
//! Two cursor types share the [`ByteCursor`] reading interface:
//! - [`BlockCursor`] walks the raw on-disk bytes of one block. Running off
//!   its end means the block itself is truncated.
//! - [`PageCursor`] walks a logical (possibly decompressed) page, bounded by
//!   the page's in-memory size. Running off its end means cell data claims
//!   more bytes than the page holds.
//!
//! Each cursor borrows its buffer for the duration of one block decode and
//! keeps its own position.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DecodeError, DecodeResult};
use crate::format::varint;

/// Sequential little-endian reads over a borrowed buffer
pub trait ByteCursor<'a> {
    /// The readable bytes; reads never go past its end
    fn data(&self) -> &'a [u8];

    fn position(&self) -> usize;

    fn set_position(&mut self, position: usize);

    /// Error reported when a read of `needed` bytes runs past the end
    fn overrun(&self, needed: usize) -> DecodeError;

    fn remaining(&self) -> usize {
        self.data().len().saturating_sub(self.position())
    }

    /// Bytes from the current position to the end
    fn rest(&self) -> &'a [u8] {
        let data = self.data();
        &data[self.position().min(data.len())..]
    }

    /// Consume `len` bytes
    fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        let start = self.position();
        let data = self.data();
        let end = match start.checked_add(len) {
            Some(end) if end <= data.len() => end,
            _ => return Err(self.overrun(len)),
        };
        self.set_position(end);
        Ok(&data[start..end])
    }

    fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> DecodeResult<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn read_u32(&mut self) -> DecodeResult<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn read_u64(&mut self) -> DecodeResult<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    /// Read a signed packed integer
    fn read_packed_int(&mut self) -> DecodeResult<i64> {
        let (value, consumed) = varint::decode(self.rest()).map_err(|e| self.map_eof(e))?;
        self.set_position(self.position() + consumed);
        Ok(value)
    }

    /// Read an unsigned packed integer
    fn read_packed_uint(&mut self) -> DecodeResult<u64> {
        self.read_packed_uint_with_size().map(|(value, _)| value)
    }

    /// Read an unsigned packed integer and report its encoded size
    fn read_packed_uint_with_size(&mut self) -> DecodeResult<(u64, usize)> {
        let (value, consumed) = varint::decode_uint(self.rest()).map_err(|e| self.map_eof(e))?;
        self.set_position(self.position() + consumed);
        Ok((value, consumed))
    }

    /// A packed integer cut off by the end of the buffer is an overrun of this cursor
    fn map_eof(&self, err: DecodeError) -> DecodeError {
        match err {
            DecodeError::UnexpectedEof { needed, .. } => self.overrun(needed),
            other => other,
        }
    }
}

/// Cursor over the raw bytes of one on-disk block
#[derive(Debug, Clone)]
pub struct BlockCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BlockCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BlockCursor { data, position: 0 }
    }
}

impl<'a> ByteCursor<'a> for BlockCursor<'a> {
    fn data(&self) -> &'a [u8] {
        self.data
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    fn overrun(&self, needed: usize) -> DecodeError {
        DecodeError::TruncatedBlock {
            needed: self.position + needed,
            available: self.data.len(),
        }
    }
}

/// Cursor over a logical page, bounded by its in-memory size
#[derive(Debug, Clone)]
pub struct PageCursor<'a> {
    data: &'a [u8],
    position: usize,
    memsize: usize,
}

impl<'a> PageCursor<'a> {
    /// Create a cursor over `page` that never reads at or past `memsize`
    pub fn new(page: &'a [u8], memsize: usize) -> Self {
        let end = memsize.min(page.len());
        PageCursor {
            data: &page[..end],
            position: 0,
            memsize,
        }
    }

    /// Start reading at `position` instead of the page start
    pub fn starting_at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn memsize(&self) -> usize {
        self.memsize
    }

    /// Whether the cursor has reached the readable end of the page
    pub fn at_end(&self) -> bool {
        self.position >= self.data.len()
    }
}

impl<'a> ByteCursor<'a> for PageCursor<'a> {
    fn data(&self) -> &'a [u8] {
        self.data
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    fn overrun(&self, _needed: usize) -> DecodeError {
        DecodeError::OverflowDetected {
            position: self.position,
            memsize: self.memsize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_reads() {
        let data = [
            0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02,
            0x01,
        ];
        let mut cursor = BlockCursor::new(&data);
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_u32().unwrap(), 0x12345678);
        assert_eq!(cursor.read_u64().unwrap(), 0x0102030405060708);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_block_cursor_overrun_is_truncation() {
        let data = [0u8; 6];
        let mut cursor = BlockCursor::new(&data);
        cursor.read_u32().unwrap();
        match cursor.read_u32() {
            Err(DecodeError::TruncatedBlock { needed, available }) => {
                assert_eq!(needed, 8);
                assert_eq!(available, 6);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // A failed read does not move the cursor
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn test_page_cursor_bounded_by_memsize() {
        let page = [0xaau8; 32];
        let mut cursor = PageCursor::new(&page, 20).starting_at(16);
        assert_eq!(cursor.take(4).unwrap().len(), 4);
        assert!(cursor.at_end());
        assert!(matches!(
            cursor.read_u8(),
            Err(DecodeError::OverflowDetected { position: 20, memsize: 20 })
        ));
    }

    #[test]
    fn test_packed_reads() {
        let mut data = varint::encode_uint(300);
        data.extend(varint::encode(-3));
        data.push(0x85);
        let mut cursor = BlockCursor::new(&data);
        assert_eq!(cursor.read_packed_uint_with_size().unwrap(), (300, 2));
        assert_eq!(cursor.read_packed_int().unwrap(), -3);
        assert_eq!(cursor.read_packed_uint().unwrap(), 5);
        assert_eq!(cursor.position(), data.len());
    }

    #[test]
    fn test_packed_read_cut_off_by_memsize() {
        // A 3-byte packed integer starting two bytes before memsize
        let mut page = vec![0u8; 8];
        page.extend(varint::encode_uint(100_000));
        let mut cursor = PageCursor::new(&page, 10).starting_at(8);
        assert!(matches!(
            cursor.read_packed_uint(),
            Err(DecodeError::OverflowDetected { position: 8, memsize: 10 })
        ));
    }
}
