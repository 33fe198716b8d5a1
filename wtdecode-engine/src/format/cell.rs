//! Cell format definitions
//!
//! A cell starts with a one-byte descriptor. The low two bits select a short
//! form (key, prefixed key, value) whose length lives in the upper six bits.
//! When they are zero the cell is in long form: the upper four bits hold the
//! cell type and bits 2 and 3 announce optional fields that follow the
//! descriptor.
//!
//! Long form layout:
//! - descriptor byte
//! - extra descriptor byte (bit 3 set): time window flags
//! - packed time window values, in flag order
//! - packed run length / record number (bit 2 set)
//! - type-specific length, prefix or offset
//! - data bytes

use crate::error::{DecodeError, DecodeResult};

/// Short form mask within the descriptor
pub const CELL_SHORT_MASK: u8 = 0x03;
pub const CELL_KEY_SHORT: u8 = 0x01;
pub const CELL_KEY_SHORT_PFX: u8 = 0x02;
pub const CELL_VALUE_SHORT: u8 = 0x03;

/// A packed run length follows the descriptor
pub const CELL_64V: u8 = 0x04;
/// An extra descriptor byte follows the descriptor
pub const CELL_SECOND_DESC: u8 = 0x08;

/// Long-form lengths below this would have used a short form, so it is
/// added back on decode
pub const CELL_SIZE_ADJUST: u64 = 64;

bitflags::bitflags! {
    /// Flags in the extra descriptor byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TimeFlags: u8 {
        const PREPARE = 0x01;
        const DURABLE_START_TS = 0x02;
        const DURABLE_STOP_TS = 0x04;
        const START_TS = 0x08;
        const STOP_TS = 0x10;
        const START_TXN = 0x20;
        const STOP_TXN = 0x40;
        /// Not assigned; set only in corrupt or future pages
        const UNUSED = 0x80;
    }
}

/// Cell types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    AddressDeleted,
    AddressInternal,
    AddressLeaf,
    AddressLeafNoOverflow,
    Deleted,
    Key,
    KeyOverflow,
    KeyPrefix,
    Value,
    ValueCopy,
    ValueOverflow,
    ValueOverflowRemoved,
    KeyOverflowRemoved,
    KeyShort,
    KeyShortPrefix,
    ValueShort,
}

impl CellKind {
    /// Classify a descriptor byte
    pub fn from_descriptor(descriptor: u8) -> DecodeResult<Self> {
        match descriptor & CELL_SHORT_MASK {
            CELL_KEY_SHORT => return Ok(CellKind::KeyShort),
            CELL_KEY_SHORT_PFX => return Ok(CellKind::KeyShortPrefix),
            CELL_VALUE_SHORT => return Ok(CellKind::ValueShort),
            _ => {}
        }

        let type_bits = descriptor >> 4;
        let kind = match type_bits {
            0 => CellKind::AddressDeleted,
            1 => CellKind::AddressInternal,
            2 => CellKind::AddressLeaf,
            3 => CellKind::AddressLeafNoOverflow,
            4 => CellKind::Deleted,
            5 => CellKind::Key,
            6 => CellKind::KeyOverflow,
            7 => CellKind::KeyPrefix,
            8 => CellKind::Value,
            9 => CellKind::ValueCopy,
            10 => CellKind::ValueOverflow,
            11 => CellKind::ValueOverflowRemoved,
            12 => CellKind::KeyOverflowRemoved,
            _ => {
                return Err(DecodeError::UnknownCellType {
                    descriptor,
                    type_bits,
                })
            }
        };
        Ok(kind)
    }

    pub fn is_short(&self) -> bool {
        matches!(
            self,
            CellKind::KeyShort | CellKind::KeyShortPrefix | CellKind::ValueShort
        )
    }

    /// Whether the cell is counted in the page's key statistics
    pub fn counts_as_key(&self) -> bool {
        matches!(
            self,
            CellKind::Key
                | CellKind::KeyPrefix
                | CellKind::KeyOverflow
                | CellKind::AddressLeafNoOverflow
                | CellKind::KeyShort
                | CellKind::KeyShortPrefix
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            CellKind::AddressDeleted => "WT_CELL_ADDR_DEL",
            CellKind::AddressInternal => "WT_CELL_ADDR_INT",
            CellKind::AddressLeaf => "WT_CELL_ADDR_LEAF",
            CellKind::AddressLeafNoOverflow => "WT_CELL_ADDR_LEAF_NO",
            CellKind::Deleted => "WT_CELL_DEL",
            CellKind::Key => "WT_CELL_KEY",
            CellKind::KeyOverflow => "WT_CELL_KEY_OVFL",
            CellKind::KeyPrefix => "WT_CELL_KEY_PFX",
            CellKind::Value => "WT_CELL_VALUE",
            CellKind::ValueCopy => "WT_CELL_VALUE_COPY",
            CellKind::ValueOverflow => "WT_CELL_VALUE_OVFL",
            CellKind::ValueOverflowRemoved => "WT_CELL_VALUE_OVFL_RM",
            CellKind::KeyOverflowRemoved => "WT_CELL_KEY_OVFL_RM",
            CellKind::KeyShort => "WT_CELL_KEY_SHORT",
            CellKind::KeyShortPrefix => "WT_CELL_KEY_SHORT_PFX",
            CellKind::ValueShort => "WT_CELL_VALUE_SHORT",
        }
    }
}

/// Timestamps and transaction IDs from a cell's extra descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub flags: TimeFlags,
    pub durable_start_ts: Option<u64>,
    pub durable_stop_ts: Option<u64>,
    pub start_ts: Option<u64>,
    pub stop_ts: Option<u64>,
    pub start_txn: Option<u64>,
    pub stop_txn: Option<u64>,
}

impl TimeWindow {
    pub fn new(flags: TimeFlags) -> Self {
        TimeWindow {
            flags,
            ..Default::default()
        }
    }

    pub fn prepared(&self) -> bool {
        self.flags.contains(TimeFlags::PREPARE)
    }

    /// The unused top bit is set
    pub fn has_junk(&self) -> bool {
        self.flags.contains(TimeFlags::UNUSED)
    }
}

/// One decoded cell, borrowing its data from the page buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell<'a> {
    pub descriptor: u8,
    pub kind: CellKind,
    pub time_window: Option<TimeWindow>,
    /// Run length or record number
    pub run_length: Option<u64>,
    /// Prefix compression count for prefixed keys
    pub prefix: Option<u8>,
    /// Page offset of the referenced cell for value copies
    pub copy_offset: Option<u64>,
    /// Decoded data length
    pub length: u64,
    pub data: &'a [u8],
    /// Position of the descriptor byte within the page
    pub offset: usize,
    /// Total encoded size of the cell, descriptor through data
    pub size: usize,
    /// The encoded cell, descriptor through data
    pub raw: &'a [u8],
}

impl<'a> Cell<'a> {
    pub fn is_key(&self) -> bool {
        self.kind.counts_as_key()
    }
}
