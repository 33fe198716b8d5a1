//! Block decoding
//!
//! This module turns blocks into structured results:
//! - Cell stream over a row-store page
//! - Single block decode: headers, checksum, payload, body
//! - Whole-file scan with per-block error recovery
//!
//! Presentation code observes the decode through a [`DecodeSink`], which
//! sees headers and cells as they are produced.

pub mod cells;
pub mod page;
pub mod scan;

use std::io;

use crate::codec::Verification;
use crate::format::{BlockHeader, Cell, FileHeader, PageHeader};

pub use cells::CellStream;
pub use page::{BlockOutcome, CellHalt, DecodedBlock, PageBody, PageDecoder, RowPage};
pub use scan::{BlockReport, ScanOptions, ScanSummary, Scanner};

/// Receives decode progress
///
/// Every method defaults to doing nothing. An error returned here aborts the
/// scan.
pub trait DecodeSink {
    fn file_header(&mut self, _header: &FileHeader, _checksum: Verification) -> io::Result<()> {
        Ok(())
    }

    /// Decoding of the block at `offset` is about to begin
    fn block_start(&mut self, _offset: u64) -> io::Result<()> {
        Ok(())
    }

    /// Headers of a block were parsed and validated
    fn page_start(
        &mut self,
        _offset: u64,
        _page: &PageHeader,
        _block: &BlockHeader,
    ) -> io::Result<()> {
        Ok(())
    }

    fn cell(&mut self, _index: usize, _cell: &Cell<'_>) -> io::Result<()> {
        Ok(())
    }

    /// The block is finished, successfully or not
    fn block_end(&mut self, _report: &BlockReport) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DecodeSink for NullSink {}

impl<S: DecodeSink + ?Sized> DecodeSink for &mut S {
    fn file_header(&mut self, header: &FileHeader, checksum: Verification) -> io::Result<()> {
        (**self).file_header(header, checksum)
    }

    fn block_start(&mut self, offset: u64) -> io::Result<()> {
        (**self).block_start(offset)
    }

    fn page_start(&mut self, offset: u64, page: &PageHeader, block: &BlockHeader) -> io::Result<()> {
        (**self).page_start(offset, page, block)
    }

    fn cell(&mut self, index: usize, cell: &Cell<'_>) -> io::Result<()> {
        (**self).cell(index, cell)
    }

    fn block_end(&mut self, report: &BlockReport) -> io::Result<()> {
        (**self).block_end(report)
    }
}

/// An absent sink ignores every event
impl<S: DecodeSink> DecodeSink for Option<S> {
    fn file_header(&mut self, header: &FileHeader, checksum: Verification) -> io::Result<()> {
        match self {
            Some(sink) => sink.file_header(header, checksum),
            None => Ok(()),
        }
    }

    fn block_start(&mut self, offset: u64) -> io::Result<()> {
        match self {
            Some(sink) => sink.block_start(offset),
            None => Ok(()),
        }
    }

    fn page_start(&mut self, offset: u64, page: &PageHeader, block: &BlockHeader) -> io::Result<()> {
        match self {
            Some(sink) => sink.page_start(offset, page, block),
            None => Ok(()),
        }
    }

    fn cell(&mut self, index: usize, cell: &Cell<'_>) -> io::Result<()> {
        match self {
            Some(sink) => sink.cell(index, cell),
            None => Ok(()),
        }
    }

    fn block_end(&mut self, report: &BlockReport) -> io::Result<()> {
        match self {
            Some(sink) => sink.block_end(report),
            None => Ok(()),
        }
    }
}

/// Both sinks see every event, first one first
impl<A: DecodeSink, B: DecodeSink> DecodeSink for (A, B) {
    fn file_header(&mut self, header: &FileHeader, checksum: Verification) -> io::Result<()> {
        self.0.file_header(header, checksum)?;
        self.1.file_header(header, checksum)
    }

    fn block_start(&mut self, offset: u64) -> io::Result<()> {
        self.0.block_start(offset)?;
        self.1.block_start(offset)
    }

    fn page_start(&mut self, offset: u64, page: &PageHeader, block: &BlockHeader) -> io::Result<()> {
        self.0.page_start(offset, page, block)?;
        self.1.page_start(offset, page, block)
    }

    fn cell(&mut self, index: usize, cell: &Cell<'_>) -> io::Result<()> {
        self.0.cell(index, cell)?;
        self.1.cell(index, cell)
    }

    fn block_end(&mut self, report: &BlockReport) -> io::Result<()> {
        self.0.block_end(report)?;
        self.1.block_end(report)
    }
}
