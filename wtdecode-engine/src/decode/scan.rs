//! Whole-file scanning
//!
//! [`Scanner`] walks a byte source block by block. When it starts at offset
//! 0 of a whole file it first reads the file header; the first block then
//! sits at the next 512-byte boundary. After each block the scan moves to
//! the next 512-byte boundary past the bytes the block was trusted to
//! occupy, so a corrupt block never stops the scan. Only fatal errors do.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::codec::checksum::{verify_file_header, Verification, MAX_ALLOCATION_SIZE};
use crate::error::{DecodeError, DecodeResult};
use crate::format::header::FileHeader;
use crate::source::block::BlockSource;

use super::page::{DecodedBlock, PageBody, PageDecoder};
use super::DecodeSink;

/// Blocks start on multiples of this
pub const BLOCK_ALIGNMENT: u64 = 512;

/// Where and how much to scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Offset of the first block
    pub offset: u64,
    /// Input is a fragment without a file header
    pub fragment: bool,
    /// Maximum number of blocks to decode; 0 means no limit
    pub pages: Option<u64>,
    /// Stop each block after checksum verification
    pub skip_data: bool,
}

impl ScanOptions {
    /// The effective block limit
    pub fn page_limit(&self) -> Option<u64> {
        self.pages.filter(|&pages| pages != 0)
    }
}

/// One block's result, with where the scan goes next
#[derive(Debug)]
pub struct BlockReport {
    pub offset: u64,
    pub next_offset: u64,
    pub result: DecodeResult<DecodedBlock>,
}

/// Totals for a completed scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub file_header: Option<FileHeader>,
    pub blocks: u64,
    /// Blocks that failed with a block-scoped error
    pub failed: u64,
    /// Row pages whose cell decoding stopped early
    pub halted: u64,
}

/// Round `offset` up to the block alignment
pub fn align_up(offset: u64) -> u64 {
    (offset + BLOCK_ALIGNMENT - 1) & !(BLOCK_ALIGNMENT - 1)
}

/// Offset of the block after one at `start` that occupied `consumed` bytes
pub fn next_block_offset(start: u64, consumed: u64) -> u64 {
    let next = align_up(start + consumed);
    if next == start {
        start + BLOCK_ALIGNMENT
    } else {
        next
    }
}

pub struct Scanner<S> {
    source: S,
    decoder: PageDecoder,
    options: ScanOptions,
    offset: u64,
    blocks: u64,
    started: bool,
    finished: bool,
    file_header: Option<FileHeader>,
}

impl<S: BlockSource> Scanner<S> {
    pub fn new(source: S, mut decoder: PageDecoder, options: ScanOptions) -> Self {
        decoder.set_skip_data(options.skip_data);
        Scanner {
            source,
            decoder,
            offset: options.offset,
            options,
            blocks: 0,
            started: false,
            finished: false,
            file_header: None,
        }
    }

    /// Offset the next block will be decoded at
    pub fn next_offset(&self) -> u64 {
        self.offset
    }

    pub fn file_header(&self) -> Option<&FileHeader> {
        self.file_header.as_ref()
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Read and validate the file header at offset 0
    fn read_file_header<K>(&mut self, sink: &mut K) -> DecodeResult<()>
    where
        K: DecodeSink + ?Sized,
    {
        // Enough for the header's whole allocation unit
        let mut buf = vec![0u8; MAX_ALLOCATION_SIZE];
        let n = self.source.read_at(0, &mut buf)?;
        buf.truncate(n);
        let header = FileHeader::from_bytes(&buf)?;

        let checksum = verify_file_header(&buf, &header, self.decoder.checksummer());
        if let Verification::Mismatch { computed } = checksum {
            warn!(
                stored = header.checksum,
                computed, "file header checksum does not match"
            );
        }
        info!(
            major = header.major,
            minor = header.minor,
            checksum = %checksum,
            "file header"
        );
        sink.file_header(&header, checksum).map_err(DecodeError::SinkFailed)?;

        self.offset = align_up(FileHeader::SIZE as u64);
        self.file_header = Some(header);
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        if let Some(pages) = self.options.page_limit() {
            if self.blocks >= pages {
                return true;
            }
        }
        matches!(self.source.len_hint(), Some(len) if self.offset >= len)
    }

    /// Decode the next block
    ///
    /// Returns `Ok(None)` once the scan is complete. A fatal error ends the
    /// scan; later calls return `Ok(None)`.
    pub fn next_block<K>(&mut self, sink: &mut K) -> DecodeResult<Option<BlockReport>>
    where
        K: DecodeSink + ?Sized,
    {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            if self.options.offset == 0 && !self.options.fragment {
                if let Err(e) = self.read_file_header(sink) {
                    self.finished = true;
                    return Err(e);
                }
            }
        }
        if self.limit_reached() {
            self.finished = true;
            return Ok(None);
        }

        let offset = self.offset;
        if let Err(e) = sink.block_start(offset) {
            self.finished = true;
            return Err(DecodeError::SinkFailed(e));
        }
        let outcome = match self.decoder.decode_block(&mut self.source, offset, sink) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                self.finished = true;
                return Ok(None);
            }
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        let next_offset = next_block_offset(offset, outcome.consumed);
        match &outcome.result {
            Ok(_) => debug!(offset, next_offset, "block decoded"),
            Err(e) => warn!(offset, next_offset, error = %e, "error decoding block"),
        }

        let report = BlockReport {
            offset,
            next_offset,
            result: outcome.result,
        };
        self.offset = next_offset;
        self.blocks += 1;

        if let Err(e) = sink.block_end(&report) {
            self.finished = true;
            return Err(DecodeError::SinkFailed(e));
        }
        Ok(Some(report))
    }

    /// Decode every remaining block
    pub fn run<K>(&mut self, sink: &mut K) -> DecodeResult<ScanSummary>
    where
        K: DecodeSink + ?Sized,
    {
        let mut summary = ScanSummary::default();
        while let Some(report) = self.next_block(sink)? {
            summary.blocks += 1;
            match &report.result {
                Err(_) => summary.failed += 1,
                Ok(DecodedBlock {
                    body: PageBody::Rows(rows),
                    ..
                }) if rows.halt.is_some() => summary.halted += 1,
                Ok(_) => {}
            }
        }
        summary.file_header = self.file_header.clone();
        Ok(summary)
    }
}
