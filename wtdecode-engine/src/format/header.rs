//! File, page and block header definitions
//!
//! A `.wt` file starts with a 16-byte file header. Every block after it
//! starts with a 40-byte prefix: the 28-byte page header followed by the
//! 12-byte block header. All integers are little-endian.
//!
//! Block prefix layout:
//! - Offset 0x00: recno (u64)
//! - Offset 0x08: write generation (u64)
//! - Offset 0x10: memsize (u32)
//! - Offset 0x14: cell count / overflow length (u32)
//! - Offset 0x18: page type (u8), page flags (u8), unused (u8), version (u8)
//! - Offset 0x1C: disk size (u32)
//! - Offset 0x20: checksum (u32)
//! - Offset 0x24: block flags (u8), unused (3 x u8)

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DecodeError, DecodeResult};
use crate::source::cursor::{BlockCursor, ByteCursor};

/// Magic number at the start of every file
pub const BLOCK_MAGIC: u32 = 120897;
pub const BLOCK_MAJOR_VERSION: u16 = 1;
pub const BLOCK_MINOR_VERSION: u16 = 0;

/// Page header plus block header
pub const BLOCK_PREFIX_SIZE: usize = PageHeader::SIZE + BlockHeader::SIZE;

/// Largest block accepted before the header is considered garbage
pub const MAX_BLOCK_SIZE: u32 = 17 * 1024 * 1024;

/// Page type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Invalid,
    BlockManager,
    ColumnFixed,
    ColumnInternal,
    ColumnVariable,
    Overflow,
    RowInternal,
    RowLeaf,
    Unknown(u8),
}

impl From<u8> for PageType {
    fn from(value: u8) -> Self {
        match value {
            0 => PageType::Invalid,
            1 => PageType::BlockManager,
            2 => PageType::ColumnFixed,
            3 => PageType::ColumnInternal,
            4 => PageType::ColumnVariable,
            5 => PageType::Overflow,
            6 => PageType::RowInternal,
            7 => PageType::RowLeaf,
            other => PageType::Unknown(other),
        }
    }
}

impl PageType {
    pub fn as_raw(&self) -> u8 {
        match self {
            PageType::Invalid => 0,
            PageType::BlockManager => 1,
            PageType::ColumnFixed => 2,
            PageType::ColumnInternal => 3,
            PageType::ColumnVariable => 4,
            PageType::Overflow => 5,
            PageType::RowInternal => 6,
            PageType::RowLeaf => 7,
            PageType::Unknown(raw) => *raw,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageType::Invalid => "WT_PAGE_INVALID",
            PageType::BlockManager => "WT_PAGE_BLOCK_MANAGER",
            PageType::ColumnFixed => "WT_PAGE_COL_FIX",
            PageType::ColumnInternal => "WT_PAGE_COL_INT",
            PageType::ColumnVariable => "WT_PAGE_COL_VAR",
            PageType::Overflow => "WT_PAGE_OVFL",
            PageType::RowInternal => "WT_PAGE_ROW_INT",
            PageType::RowLeaf => "WT_PAGE_ROW_LEAF",
            PageType::Unknown(_) => "*** unknown page type ***",
        }
    }

    /// Row-store pages carry a cell stream
    pub fn is_row(&self) -> bool {
        matches!(self, PageType::RowInternal | PageType::RowLeaf)
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_raw(), self.name())
    }
}

bitflags::bitflags! {
    /// Page-level flags stored in the page header
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// Payload after the first 64 bytes is compressed
        const COMPRESSED = 0x01;
        /// All values on the page are empty and visible to all
        const EMPTY_V_ALL = 0x02;
        /// All values on the page are empty and visible to none
        const EMPTY_V_NONE = 0x04;
        /// Payload is encrypted
        const ENCRYPTED = 0x08;
    }
}

bitflags::bitflags! {
    /// Block-level flags stored in the block header
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// Checksum covers the whole block instead of the first 64 bytes
        const DATA_CHECKSUM = 0x01;
    }
}

/// File header stored at offset 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub major: u16,
    pub minor: u16,
    pub checksum: u32,
}

impl FileHeader {
    pub const SIZE: usize = 16;

    /// Offset of the checksum field within the header
    pub const CHECKSUM_OFFSET: usize = 8;

    /// Parse and validate the file header
    pub fn from_bytes(data: &[u8]) -> DecodeResult<Self> {
        if data.len() < Self::SIZE {
            return Err(DecodeError::InvalidFileHeader(format!(
                "file is {} bytes, shorter than the {}-byte header",
                data.len(),
                Self::SIZE
            )));
        }

        let mut cursor = BlockCursor::new(&data[..Self::SIZE]);
        let magic = cursor.read_u32()?;
        let major = cursor.read_u16()?;
        let minor = cursor.read_u16()?;
        let checksum = cursor.read_u32()?;
        let unused = cursor.read_u32()?;

        if magic != BLOCK_MAGIC {
            return Err(DecodeError::InvalidFileHeader(format!("bad magic number {}", magic)));
        }
        if major != BLOCK_MAJOR_VERSION {
            return Err(DecodeError::InvalidFileHeader(format!("bad major number {}", major)));
        }
        if minor != BLOCK_MINOR_VERSION {
            return Err(DecodeError::InvalidFileHeader(format!("bad minor number {}", minor)));
        }
        if unused != 0 {
            return Err(DecodeError::InvalidFileHeader("garbage in unused bytes".into()));
        }

        Ok(FileHeader {
            magic,
            major,
            minor,
            checksum,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.magic);
        LittleEndian::write_u16(&mut buf[4..6], self.major);
        LittleEndian::write_u16(&mut buf[6..8], self.minor);
        LittleEndian::write_u32(&mut buf[8..12], self.checksum);
        // 12..16 unused
        buf
    }
}

/// Page header, the first 28 bytes of every block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    /// Starting record number (column stores)
    pub recno: u64,
    /// Write generation
    pub write_gen: u64,
    /// In-memory page size, including this header and the block header
    pub memsize: u32,
    /// Number of cells, or the data length of an overflow page
    pub entries: u32,
    pub page_type: PageType,
    pub flags: PageFlags,
    pub version: u8,
}

impl PageHeader {
    pub const SIZE: usize = 28;

    /// Parse the page header, rejecting garbage in the unused byte and invalid pages
    pub fn parse<'a, C: ByteCursor<'a>>(cursor: &mut C) -> DecodeResult<Self> {
        let recno = cursor.read_u64()?;
        let write_gen = cursor.read_u64()?;
        let memsize = cursor.read_u32()?;
        let entries = cursor.read_u32()?;
        let page_type = PageType::from(cursor.read_u8()?);
        let flags = PageFlags::from_bits_retain(cursor.read_u8()?);
        let unused = cursor.read_u8()?;
        let version = cursor.read_u8()?;

        if unused != 0 {
            return Err(DecodeError::InvalidBlockHeader(
                "garbage in page header unused byte".into(),
            ));
        }
        if page_type == PageType::Invalid {
            return Err(DecodeError::InvalidBlockHeader("invalid page".into()));
        }

        Ok(PageHeader {
            recno,
            write_gen,
            memsize,
            entries,
            page_type,
            flags,
            version,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.contains(PageFlags::COMPRESSED)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.recno);
        LittleEndian::write_u64(&mut buf[8..16], self.write_gen);
        LittleEndian::write_u32(&mut buf[16..20], self.memsize);
        LittleEndian::write_u32(&mut buf[20..24], self.entries);
        buf[24] = self.page_type.as_raw();
        buf[25] = self.flags.bits();
        buf[27] = self.version;
        buf
    }
}

/// Block header, the 12 bytes following the page header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// On-disk size of the whole block, prefix included
    pub disk_size: u32,
    pub checksum: u32,
    pub flags: BlockFlags,
}

impl BlockHeader {
    pub const SIZE: usize = 12;

    /// Offset of the checksum field from the start of the block
    pub const CHECKSUM_OFFSET: usize = PageHeader::SIZE + 4;

    /// Parse the block header and check the declared size before anything
    /// else is read
    pub fn parse<'a, C: ByteCursor<'a>>(cursor: &mut C) -> DecodeResult<Self> {
        let disk_size = cursor.read_u32()?;
        let checksum = cursor.read_u32()?;
        let flags = BlockFlags::from_bits_retain(cursor.read_u8()?);
        let unused = cursor.take(3)?;

        if unused.iter().any(|&b| b != 0) {
            return Err(DecodeError::InvalidBlockHeader(
                "garbage in block header unused bytes".into(),
            ));
        }
        if disk_size > MAX_BLOCK_SIZE {
            return Err(DecodeError::InvalidBlockHeader(format!(
                "the block is too big: {} bytes",
                disk_size
            )));
        }
        if (disk_size as usize) < BLOCK_PREFIX_SIZE {
            return Err(DecodeError::InvalidBlockHeader(format!(
                "the block is too small: {} bytes",
                disk_size
            )));
        }

        Ok(BlockHeader {
            disk_size,
            checksum,
            flags,
        })
    }

    /// Whether the checksum covers the whole block
    pub fn checksums_data(&self) -> bool {
        self.flags.contains(BlockFlags::DATA_CHECKSUM)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.disk_size);
        LittleEndian::write_u32(&mut buf[4..8], self.checksum);
        buf[8] = self.flags.bits();
        buf
    }
}

/// Parse the 40-byte prefix at the start of a block
pub fn parse_block_prefix(data: &[u8]) -> DecodeResult<(PageHeader, BlockHeader)> {
    let mut cursor = BlockCursor::new(data);
    let page = PageHeader::parse(&mut cursor)?;
    let block = BlockHeader::parse(&mut cursor)?;
    Ok((page, block))
}
