//! Cell stream decoding
//!
//! [`CellStream`] walks the cells of a row-store page one at a time, starting
//! right after the block prefix. It stops after the header's cell count, at
//! the page's in-memory size, or at the first malformed cell. Statistics are
//! accumulated as fields are read, so a stream that fails part way still
//! reports what it saw.

use tracing::{trace, warn};

use crate::error::{DecodeError, DecodeResult};
use crate::format::cell::{
    Cell, CellKind, TimeFlags, TimeWindow, CELL_64V, CELL_SECOND_DESC, CELL_SIZE_ADJUST,
};
use crate::format::header::{PageHeader, BLOCK_PREFIX_SIZE};
use crate::format::stats::PageStatistics;
use crate::source::cursor::{ByteCursor, PageCursor};

pub struct CellStream<'a> {
    cursor: PageCursor<'a>,
    ncells: u32,
    index: u32,
    cell_start: usize,
    stats: PageStatistics,
    done: bool,
}

impl<'a> CellStream<'a> {
    /// Create a stream over a logical page, prefix included
    pub fn new(page: &'a [u8], header: &PageHeader) -> Self {
        CellStream {
            cursor: PageCursor::new(page, header.memsize as usize).starting_at(BLOCK_PREFIX_SIZE),
            ncells: header.entries,
            index: 0,
            cell_start: BLOCK_PREFIX_SIZE,
            stats: PageStatistics::new(),
            done: false,
        }
    }

    pub fn stats(&self) -> &PageStatistics {
        &self.stats
    }

    pub fn into_stats(self) -> PageStatistics {
        self.stats
    }

    /// Index of the next cell, or of the cell that failed
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Page position of the next cell, or of the cell that failed
    pub fn position(&self) -> usize {
        self.cell_start
    }

    /// Undecoded bytes from the current cell to the end of the page
    pub fn remainder(&self) -> &'a [u8] {
        let data = self.cursor.data();
        &data[self.cell_start.min(data.len())..]
    }

    fn decode_cell(&mut self) -> DecodeResult<Cell<'a>> {
        let offset = self.cursor.position();
        let descriptor = self.cursor.read_u8()?;
        let kind = CellKind::from_descriptor(descriptor)?;

        let mut time_window = None;
        let mut run_length = None;
        if !kind.is_short() {
            if descriptor & CELL_SECOND_DESC != 0 {
                time_window = Some(self.read_time_window()?);
            }
            if descriptor & CELL_64V != 0 {
                run_length = Some(self.cursor.read_packed_uint()?);
            }
        }

        let short_len = u64::from(descriptor >> 2);
        let mut prefix = None;
        let mut copy_offset = None;
        let length = match kind {
            CellKind::KeyShort | CellKind::ValueShort => short_len,
            CellKind::KeyShortPrefix => {
                prefix = Some(self.cursor.read_u8()?);
                short_len
            }
            CellKind::Key | CellKind::AddressLeafNoOverflow => self.read_long_length()?,
            CellKind::KeyPrefix => {
                prefix = Some(self.cursor.read_u8()?);
                self.read_long_length()?
            }
            CellKind::Value => {
                // A non-empty time window means the length is stored unadjusted
                let extra = time_window.as_ref().map_or(0, |w| w.flags.bits());
                if extra != 0 {
                    self.cursor.read_packed_uint()?
                } else {
                    self.read_long_length()?
                }
            }
            CellKind::AddressDeleted
            | CellKind::AddressInternal
            | CellKind::AddressLeaf
            | CellKind::KeyOverflow
            | CellKind::ValueOverflow
            | CellKind::KeyOverflowRemoved
            | CellKind::ValueOverflowRemoved => self.cursor.read_packed_uint()?,
            CellKind::ValueCopy => {
                copy_offset = Some(self.cursor.read_packed_uint()?);
                0
            }
            CellKind::Deleted => 0,
        };

        let data = self.cursor.take(usize::try_from(length).unwrap_or(usize::MAX))?;
        if kind.counts_as_key() {
            self.stats.record_key(length);
        }

        let end = self.cursor.position();
        Ok(Cell {
            descriptor,
            kind,
            time_window,
            run_length,
            prefix,
            copy_offset,
            length,
            data,
            offset,
            size: end - offset,
            raw: &self.cursor.data()[offset..end],
        })
    }

    fn read_long_length(&mut self) -> DecodeResult<u64> {
        Ok(self.cursor.read_packed_uint()?.saturating_add(CELL_SIZE_ADJUST))
    }

    fn read_time_window(&mut self) -> DecodeResult<TimeWindow> {
        let flags = TimeFlags::from_bits_retain(self.cursor.read_u8()?);
        let mut window = TimeWindow::new(flags);
        if window.has_junk() {
            warn!(
                position = self.cell_start,
                flags = flags.bits(),
                "junk in extra cell descriptor"
            );
        }

        window.durable_start_ts = self.read_time_field(flags, TimeFlags::DURABLE_START_TS)?;
        window.durable_stop_ts = self.read_time_field(flags, TimeFlags::DURABLE_STOP_TS)?;
        window.start_ts = self.read_time_field(flags, TimeFlags::START_TS)?;
        window.stop_ts = self.read_time_field(flags, TimeFlags::STOP_TS)?;
        window.start_txn = self.read_time_field(flags, TimeFlags::START_TXN)?;
        window.stop_txn = self.read_time_field(flags, TimeFlags::STOP_TXN)?;
        Ok(window)
    }

    fn read_time_field(&mut self, flags: TimeFlags, field: TimeFlags) -> DecodeResult<Option<u64>> {
        if !flags.contains(field) {
            return Ok(None);
        }
        let (value, size) = self.cursor.read_packed_uint_with_size()?;
        self.stats.record_time_field(field, size);
        Ok(Some(value))
    }
}

impl<'a> Iterator for CellStream<'a> {
    type Item = DecodeResult<Cell<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.index >= self.ncells {
            return None;
        }

        let position = self.cursor.position();
        self.cell_start = position;
        if position >= self.cursor.memsize() {
            self.done = true;
            return Some(Err(DecodeError::OverflowDetected {
                position,
                memsize: self.cursor.memsize(),
            }));
        }

        match self.decode_cell() {
            Ok(cell) => {
                trace!(
                    index = self.index,
                    offset = cell.offset,
                    kind = cell.kind.name(),
                    length = cell.length,
                    "cell"
                );
                self.index += 1;
                Some(Ok(cell))
            }
            Err(e) => {
                self.done = true;
                self.cursor.set_position(position);
                Some(Err(e))
            }
        }
    }
}
