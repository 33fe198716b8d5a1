//! Single block decoding
//!
//! [`PageDecoder`] decodes the block at one offset:
//! 1. Read and validate the 40-byte prefix
//! 2. Re-read the whole block from its start
//! 3. Verify the checksum, if a checksummer is configured
//! 4. Expand the payload, decompressing if needed
//! 5. Decode the body according to the page type
//!
//! Errors in steps 1-5 are scoped to the block and returned inside the
//! [`BlockOutcome`]. Only source and sink failures escape as `Err`.

use tracing::{debug, warn};

use crate::codec::checksum::{check_span, verify_block, Checksummer, Verification};
use crate::codec::compress::{expand_payload, Decompressor};
use crate::error::{DecodeError, DecodeResult};
use crate::format::header::{parse_block_prefix, BlockHeader, PageHeader, PageType, BLOCK_PREFIX_SIZE};
use crate::format::stats::PageStatistics;
use crate::source::block::BlockSource;

use super::cells::CellStream;
use super::DecodeSink;

/// Where and why cell decoding stopped early
#[derive(Debug)]
pub struct CellHalt {
    /// Index of the cell that failed
    pub index: usize,
    /// Page position of that cell
    pub position: usize,
    pub error: DecodeError,
    /// Undecoded bytes from the failed cell to the end of the page
    pub remainder: Vec<u8>,
}

/// Result of walking a row-store page
#[derive(Debug)]
pub struct RowPage {
    pub stats: PageStatistics,
    /// Number of cells decoded successfully
    pub cells: usize,
    pub halt: Option<CellHalt>,
}

/// Decoded contents of a page, by page type
#[derive(Debug)]
pub enum PageBody {
    /// Data decoding was not requested
    Skipped,
    Rows(RowPage),
    /// Raw overflow data
    Overflow(Vec<u8>),
    /// Payload of a page type without a decoder
    Unimplemented(Vec<u8>),
}

impl PageBody {
    pub fn stats(&self) -> Option<&PageStatistics> {
        match self {
            PageBody::Rows(rows) => Some(&rows.stats),
            _ => None,
        }
    }
}

/// A block whose headers, checksum and payload were all valid
#[derive(Debug)]
pub struct DecodedBlock {
    pub offset: u64,
    pub page: PageHeader,
    pub block: BlockHeader,
    pub checksum: Verification,
    pub body: PageBody,
}

/// Outcome of decoding one block
#[derive(Debug)]
pub struct BlockOutcome {
    /// Bytes the block occupies, as far as the decoder trusts its headers
    pub consumed: u64,
    pub result: DecodeResult<DecodedBlock>,
}

impl BlockOutcome {
    fn failed(consumed: u64, error: DecodeError) -> Self {
        BlockOutcome {
            consumed,
            result: Err(error),
        }
    }
}

/// Decodes individual blocks with optional checksum and decompression
pub struct PageDecoder {
    checksummer: Option<Box<dyn Checksummer>>,
    decompressor: Option<Box<dyn Decompressor>>,
    skip_data: bool,
}

impl Default for PageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDecoder {
    /// Decoder with no checksum or decompression capability
    pub fn new() -> Self {
        PageDecoder {
            checksummer: None,
            decompressor: None,
            skip_data: false,
        }
    }

    /// Decoder with every capability compiled into this build
    pub fn with_default_capabilities() -> Self {
        #[allow(unused_mut)]
        let mut decoder = Self::new();
        #[cfg(feature = "crc32c")]
        {
            decoder = decoder.with_checksummer(crate::codec::Crc32c);
        }
        #[cfg(feature = "snappy")]
        {
            decoder = decoder.with_decompressor(crate::codec::Snappy);
        }
        decoder
    }

    pub fn with_checksummer<C: Checksummer + 'static>(mut self, checksummer: C) -> Self {
        self.checksummer = Some(Box::new(checksummer));
        self
    }

    pub fn with_decompressor<D: Decompressor + 'static>(mut self, decompressor: D) -> Self {
        self.decompressor = Some(Box::new(decompressor));
        self
    }

    pub fn without_checksum(mut self) -> Self {
        self.checksummer = None;
        self
    }

    pub fn without_decompression(mut self) -> Self {
        self.decompressor = None;
        self
    }

    /// Stop after checksum verification
    pub fn set_skip_data(&mut self, skip: bool) {
        self.skip_data = skip;
    }

    pub fn checksummer(&self) -> Option<&dyn Checksummer> {
        self.checksummer.as_deref()
    }

    pub fn decompressor(&self) -> Option<&dyn Decompressor> {
        self.decompressor.as_deref()
    }

    /// Decode the block starting at `offset`
    ///
    /// Returns `Ok(None)` when the source has no bytes at `offset`.
    pub fn decode_block<S, K>(
        &self,
        source: &mut S,
        offset: u64,
        sink: &mut K,
    ) -> DecodeResult<Option<BlockOutcome>>
    where
        S: BlockSource + ?Sized,
        K: DecodeSink + ?Sized,
    {
        let prefix_len = BLOCK_PREFIX_SIZE as u64;

        let mut prefix = [0u8; BLOCK_PREFIX_SIZE];
        let n = source.read_at(offset, &mut prefix)?;
        if n == 0 {
            return Ok(None);
        }
        if n < BLOCK_PREFIX_SIZE {
            return Ok(Some(BlockOutcome::failed(
                prefix_len,
                DecodeError::TruncatedBlock {
                    needed: BLOCK_PREFIX_SIZE,
                    available: n,
                },
            )));
        }

        let (page, block) = match parse_block_prefix(&prefix) {
            Ok(headers) => headers,
            Err(e) => return Ok(Some(BlockOutcome::failed(prefix_len, e))),
        };
        debug!(
            offset,
            page_type = page.page_type.name(),
            memsize = page.memsize,
            entries = page.entries,
            disk_size = block.disk_size,
            "block headers"
        );
        sink.page_start(offset, &page, &block).map_err(DecodeError::SinkFailed)?;

        // Read the block again from its start, now that its size is known
        let read_len = (block.disk_size as usize).max(check_span(&block));
        let mut raw = vec![0u8; read_len];
        let n = source.read_at(offset, &mut raw)?;
        raw.truncate(n);

        let checksum = match verify_block(&raw, &block, self.checksummer()) {
            Ok(v) => v,
            Err(e) => return Ok(Some(BlockOutcome::failed(prefix_len, e))),
        };

        let consumed = u64::from(block.disk_size);
        let body = if self.skip_data {
            Ok(PageBody::Skipped)
        } else {
            self.decode_body(&raw, &page, &block, sink)?
        };

        let result = body.map(|body| DecodedBlock {
            offset,
            page,
            block,
            checksum,
            body,
        });
        Ok(Some(BlockOutcome { consumed, result }))
    }

    /// Expand the payload and decode it by page type
    ///
    /// The outer result carries sink failures, the inner one block errors.
    fn decode_body<K>(
        &self,
        raw: &[u8],
        page: &PageHeader,
        block: &BlockHeader,
        sink: &mut K,
    ) -> DecodeResult<DecodeResult<PageBody>>
    where
        K: DecodeSink + ?Sized,
    {
        let logical = match expand_payload(raw, page, block, self.decompressor()) {
            Ok(logical) => logical,
            Err(e) => return Ok(Err(e)),
        };
        let payload = logical.get(BLOCK_PREFIX_SIZE..).unwrap_or(&[]);

        let body = match page.page_type {
            PageType::RowInternal | PageType::RowLeaf => {
                PageBody::Rows(decode_rows(&logical, page, sink)?)
            }
            PageType::Overflow => PageBody::Overflow(payload.to_vec()),
            _ => PageBody::Unimplemented(payload.to_vec()),
        };
        Ok(Ok(body))
    }
}

/// Walk the cells of a row-store page, passing each to the sink
fn decode_rows<K>(logical: &[u8], page: &PageHeader, sink: &mut K) -> DecodeResult<RowPage>
where
    K: DecodeSink + ?Sized,
{
    let mut stream = CellStream::new(logical, page);
    let mut cells = 0;
    let mut halt = None;

    while let Some(item) = stream.next() {
        match item {
            Ok(cell) => {
                sink.cell(cells, &cell).map_err(DecodeError::SinkFailed)?;
                cells += 1;
            }
            Err(error) => {
                warn!(
                    index = stream.index(),
                    position = stream.position(),
                    error = %error,
                    "cell decoding stopped"
                );
                halt = Some(CellHalt {
                    index: stream.index(),
                    position: stream.position(),
                    error,
                    remainder: stream.remainder().to_vec(),
                });
            }
        }
    }

    Ok(RowPage {
        stats: stream.into_stats(),
        cells,
        halt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::header::{BlockFlags, PageFlags};
    use crate::source::block::SeekSource;
    use crate::decode::NullSink;
    use std::io::Cursor;

    fn build_block(page_type: PageType, entries: u32, payload: &[u8], disk_size: u32) -> Vec<u8> {
        let page = PageHeader {
            recno: 0,
            write_gen: 3,
            memsize: (BLOCK_PREFIX_SIZE + payload.len()) as u32,
            entries,
            page_type,
            flags: PageFlags::empty(),
            version: 1,
        };
        let block = BlockHeader {
            disk_size,
            checksum: 0,
            flags: BlockFlags::DATA_CHECKSUM,
        };
        let mut raw = page.to_bytes();
        raw.extend(block.to_bytes());
        raw.extend_from_slice(payload);
        raw.resize(disk_size as usize, 0);
        raw
    }

    fn decode(decoder: &PageDecoder, bytes: Vec<u8>) -> BlockOutcome {
        let mut source = SeekSource::new(Cursor::new(bytes)).unwrap();
        decoder
            .decode_block(&mut source, 0, &mut NullSink)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_row_leaf_without_checksum() {
        let payload = [(2 << 2) | 0x01, b'k', b'1', (2 << 2) | 0x03, b'v', b'1'];
        let bytes = build_block(PageType::RowLeaf, 2, &payload, 512);
        let outcome = decode(&PageDecoder::new(), bytes);

        assert_eq!(outcome.consumed, 512);
        let decoded = outcome.result.unwrap();
        assert_eq!(decoded.checksum, Verification::Unverified);
        match decoded.body {
            PageBody::Rows(rows) => {
                assert_eq!(rows.cells, 2);
                assert!(rows.halt.is_none());
                assert_eq!(rows.stats.num_keys, 1);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_overflow_and_unimplemented_bodies() {
        let bytes = build_block(PageType::Overflow, 4, b"data", 512);
        match decode(&PageDecoder::new(), bytes).result.unwrap().body {
            PageBody::Overflow(data) => assert_eq!(data, b"data"),
            other => panic!("unexpected body: {:?}", other),
        }

        let bytes = build_block(PageType::ColumnVariable, 0, b"col", 512);
        match decode(&PageDecoder::new(), bytes).result.unwrap().body {
            PageBody::Unimplemented(data) => assert_eq!(data, b"col"),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_header_failure_consumes_prefix_only() {
        let mut bytes = build_block(PageType::RowLeaf, 0, &[], 512);
        bytes[26] = 0x01;
        let outcome = decode(&PageDecoder::new(), bytes);
        assert_eq!(outcome.consumed, BLOCK_PREFIX_SIZE as u64);
        assert!(matches!(outcome.result, Err(DecodeError::InvalidBlockHeader(_))));
    }

    #[test]
    fn test_short_prefix_is_truncation() {
        let mut source = SeekSource::new(Cursor::new(vec![0u8; 20])).unwrap();
        let outcome = PageDecoder::new()
            .decode_block(&mut source, 0, &mut NullSink)
            .unwrap()
            .unwrap();
        assert!(matches!(
            outcome.result,
            Err(DecodeError::TruncatedBlock { needed: 40, available: 20 })
        ));
    }

    #[test]
    fn test_end_of_input() {
        let mut source = SeekSource::new(Cursor::new(vec![0u8; 512])).unwrap();
        let outcome = PageDecoder::new()
            .decode_block(&mut source, 512, &mut NullSink)
            .unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_skip_data() {
        let bytes = build_block(PageType::RowLeaf, 1, &[0xd0], 512);
        let mut decoder = PageDecoder::new();
        decoder.set_skip_data(true);
        let decoded = decode(&decoder, bytes).result.unwrap();
        assert!(matches!(decoded.body, PageBody::Skipped));
    }

    #[test]
    fn test_cell_halt_keeps_block() {
        let payload = [(1 << 2) | 0x01, b'a', 0xd0];
        let bytes = build_block(PageType::RowInternal, 3, &payload, 512);
        let decoded = decode(&PageDecoder::new(), bytes).result.unwrap();
        match decoded.body {
            PageBody::Rows(rows) => {
                assert_eq!(rows.cells, 1);
                let halt = rows.halt.unwrap();
                assert_eq!(halt.index, 1);
                assert_eq!(halt.position, BLOCK_PREFIX_SIZE + 2);
                assert!(matches!(halt.error, DecodeError::UnknownCellType { .. }));
                assert_eq!(halt.remainder, vec![0xd0]);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[cfg(feature = "crc32c")]
    #[test]
    fn test_checksum_mismatch_consumes_prefix_only() {
        use crate::codec::checksum::seal_block;
        use crate::codec::Crc32c;

        let mut bytes = build_block(PageType::RowLeaf, 0, &[], 512);
        let (_, block) = parse_block_prefix(&bytes).unwrap();
        seal_block(&mut bytes, &block, &Crc32c);

        let decoder = PageDecoder::new().with_checksummer(Crc32c);
        let decoded = decode(&decoder, bytes.clone()).result.unwrap();
        assert_eq!(decoded.checksum, Verification::Verified);

        bytes[100] ^= 0x40;
        let outcome = decode(&decoder, bytes);
        assert_eq!(outcome.consumed, BLOCK_PREFIX_SIZE as u64);
        assert!(matches!(outcome.result, Err(DecodeError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_compressed_without_decompressor_skips_block() {
        let mut bytes = build_block(PageType::RowLeaf, 0, &[], 512);
        bytes[25] = PageFlags::COMPRESSED.bits();
        let outcome = decode(&PageDecoder::new(), bytes);
        assert_eq!(outcome.consumed, 512);
        assert!(matches!(outcome.result, Err(DecodeError::DecompressionUnavailable)));
    }
}
