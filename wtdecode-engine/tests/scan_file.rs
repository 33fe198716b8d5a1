//! End-to-end scans over synthetic files

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use wtdecode_engine::codec::checksum::{seal_block, seal_file_header};
use wtdecode_engine::codec::{Crc32c, Verification};
use wtdecode_engine::decode::{BlockReport, CellHalt, RowPage};
use wtdecode_engine::format::header::BLOCK_MAGIC;
use wtdecode_engine::format::{
    varint, BlockFlags, BlockHeader, Cell, CellKind, FileHeader, PageFlags, PageHeader, PageType,
    BLOCK_PREFIX_SIZE,
};
use wtdecode_engine::source::{BlockSource, SeekSource, StreamSource};
use wtdecode_engine::{DecodeError, DecodeSink, PageBody, PageDecoder, ScanOptions, Scanner};

/// File header sealed over a 512-byte allocation unit
fn file_header() -> Vec<u8> {
    let header = FileHeader {
        magic: BLOCK_MAGIC,
        major: 1,
        minor: 0,
        checksum: 0,
    };
    let mut unit = header.to_bytes();
    unit.resize(512, 0);
    seal_file_header(&mut unit, &Crc32c);
    unit
}

/// Build a sealed block holding `cells` as its page data
fn block(page_type: PageType, entries: u32, cells: &[u8], disk_size: u32) -> Vec<u8> {
    let page = PageHeader {
        recno: 0,
        write_gen: 9,
        memsize: (BLOCK_PREFIX_SIZE + cells.len()) as u32,
        entries,
        page_type,
        flags: PageFlags::empty(),
        version: 1,
    };
    let header = BlockHeader {
        disk_size,
        checksum: 0,
        flags: BlockFlags::DATA_CHECKSUM,
    };
    let mut raw = page.to_bytes();
    raw.extend(header.to_bytes());
    raw.extend_from_slice(cells);
    raw.resize(disk_size as usize, 0);
    seal_block(&mut raw, &header, &Crc32c);
    raw
}

/// Build a sealed, snappy-compressed row leaf block
fn compressed_block(entries: u32, cells: &[u8]) -> Vec<u8> {
    let memsize = BLOCK_PREFIX_SIZE + cells.len();
    let mut logical = PageHeader {
        recno: 0,
        write_gen: 10,
        memsize: memsize as u32,
        entries,
        page_type: PageType::RowLeaf,
        flags: PageFlags::COMPRESSED,
        version: 1,
    }
    .to_bytes();
    logical.extend(vec![0u8; BlockHeader::SIZE]);
    logical.extend_from_slice(cells);

    let tail = wtdecode_engine::codec::compress::compress_page_tail(&logical).unwrap();
    let disk_size = ((64 + tail.len() + 511) / 512 * 512) as u32;
    let header = BlockHeader {
        disk_size,
        checksum: 0,
        flags: BlockFlags::empty(),
    };

    let mut raw = logical[..64].to_vec();
    raw[PageHeader::SIZE..BLOCK_PREFIX_SIZE].copy_from_slice(&header.to_bytes());
    raw.extend(tail);
    raw.resize(disk_size as usize, 0);
    seal_block(&mut raw, &header, &Crc32c);
    raw
}

fn key_value_cells(pairs: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut cells = Vec::new();
    for (key, value) in pairs {
        cells.push(((key.len() as u8) << 2) | 0x01);
        cells.extend_from_slice(key);
        cells.push(((value.len() as u8) << 2) | 0x03);
        cells.extend_from_slice(value);
    }
    cells
}

fn long_value_cells() -> Vec<u8> {
    // Long key, then a value with a start timestamp and a 100-byte payload
    let mut cells = vec![5u8 << 4];
    varint::encode_uint_into(0, &mut cells);
    cells.extend(vec![b'k'; 64]);
    cells.push((8 << 4) | 0x08);
    cells.push(0x08);
    varint::encode_uint_into(123_456, &mut cells);
    varint::encode_uint_into(100, &mut cells);
    cells.extend(vec![b'v'; 100]);
    cells
}

/// Layout: header, good leaf, corrupt leaf, compressed leaf, halting leaf
fn synthetic_file() -> Vec<u8> {
    let mut file = file_header();

    file.extend(block(
        PageType::RowLeaf,
        4,
        &key_value_cells(&[(b"a", b"1"), (b"b", b"2")]),
        512,
    ));

    let mut corrupt = block(PageType::RowLeaf, 2, &key_value_cells(&[(b"c", b"3")]), 512);
    corrupt[45] ^= 0xff;
    file.extend(corrupt);

    file.extend(compressed_block(2, &long_value_cells()));

    let mut halting = key_value_cells(&[(b"d", b"4")]);
    halting.extend_from_slice(&[0xe0, 0x00, 0x00]);
    file.extend(block(PageType::RowInternal, 5, &halting, 1024));
    file
}

#[derive(Default)]
struct Recorder {
    headers: Vec<Verification>,
    pages: Vec<u64>,
    cells: Vec<(CellKind, Vec<u8>)>,
    reports: Vec<(u64, u64, Result<(), String>)>,
}

impl DecodeSink for Recorder {
    fn file_header(&mut self, _header: &FileHeader, checksum: Verification) -> io::Result<()> {
        self.headers.push(checksum);
        Ok(())
    }

    fn page_start(&mut self, offset: u64, _page: &PageHeader, _block: &BlockHeader) -> io::Result<()> {
        self.pages.push(offset);
        Ok(())
    }

    fn cell(&mut self, _index: usize, cell: &Cell<'_>) -> io::Result<()> {
        self.cells.push((cell.kind, cell.data.to_vec()));
        Ok(())
    }

    fn block_end(&mut self, report: &BlockReport) -> io::Result<()> {
        let result = match &report.result {
            Ok(_) => Ok(()),
            Err(e) => Err(e.kind().to_string()),
        };
        self.reports.push((report.offset, report.next_offset, result));
        Ok(())
    }
}

fn scan<S: BlockSource>(source: S) -> (Recorder, Vec<BlockReport>) {
    let mut recorder = Recorder::default();
    let mut scanner = Scanner::new(
        source,
        PageDecoder::with_default_capabilities(),
        ScanOptions::default(),
    );
    let mut reports = Vec::new();
    while let Some(report) = scanner.next_block(&mut recorder).unwrap() {
        reports.push(report);
    }
    (recorder, reports)
}

fn temp_file(bytes: &[u8]) -> File {
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    file
}

#[test]
fn test_scan_recovers_from_corrupt_block() {
    let bytes = synthetic_file();
    let source = SeekSource::new(temp_file(&bytes)).unwrap();
    let (recorder, reports) = scan(source);

    assert_eq!(recorder.headers, vec![Verification::Verified]);
    let offsets: Vec<u64> = reports.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![512, 1024, 1536, 2048]);

    // Good leaf: two keys, two values
    let first = reports[0].result.as_ref().unwrap();
    assert_eq!(first.checksum, Verification::Verified);
    match &first.body {
        PageBody::Rows(RowPage { stats, cells, halt }) => {
            assert_eq!(*cells, 4);
            assert!(halt.is_none());
            assert_eq!(stats.num_keys, 2);
            assert_eq!(stats.keys_sz, 2);
        }
        other => panic!("unexpected body: {:?}", other),
    }

    // Corrupt leaf: only the prefix is trusted
    assert!(matches!(
        reports[1].result,
        Err(DecodeError::ChecksumMismatch { .. })
    ));
    assert_eq!(reports[1].next_offset, 1536);

    // Compressed leaf: long key and a timestamped value
    let third = reports[2].result.as_ref().unwrap();
    assert!(third.page.is_compressed());
    let stats = third.body.stats().unwrap();
    assert_eq!(stats.num_keys, 1);
    assert_eq!(stats.keys_sz, 64);
    assert_eq!(stats.num_start_ts, 1);
    assert_eq!(stats.start_ts_sz, 4);

    // Halting page: reported with partial statistics
    match &reports[3].result.as_ref().unwrap().body {
        PageBody::Rows(RowPage {
            stats,
            cells,
            halt: Some(CellHalt { index, error, remainder, .. }),
        }) => {
            assert_eq!(*cells, 2);
            assert_eq!(*index, 2);
            assert_eq!(stats.num_keys, 1);
            assert!(matches!(
                error,
                DecodeError::UnknownCellType { type_bits: 14, .. }
            ));
            assert_eq!(remainder[0], 0xe0);
        }
        other => panic!("unexpected body: {:?}", other),
    }
    assert_eq!(reports[3].next_offset, 3072);

    // Every block reaches the sink, cells only from decoded pages
    assert_eq!(recorder.pages, vec![512, 1024, 1536, 2048]);
    assert_eq!(recorder.reports.len(), 4);
    assert_eq!(recorder.reports[1].2, Err("ChecksumMismatch".to_string()));
    assert_eq!(recorder.cells.len(), 4 + 2 + 2);
    assert_eq!(recorder.cells[5].0, CellKind::Value);
    assert_eq!(recorder.cells[5].1, vec![b'v'; 100]);
}

#[test]
fn test_stream_source_matches_seek_source() {
    let bytes = synthetic_file();
    let (seek, _) = scan(SeekSource::new(temp_file(&bytes)).unwrap());
    let (stream, _) = scan(StreamSource::new(&bytes[..]));
    assert_eq!(seek.reports, stream.reports);
    assert_eq!(seek.cells, stream.cells);
}

#[test]
fn test_without_capabilities() {
    let bytes = synthetic_file();
    let source = SeekSource::new(temp_file(&bytes)).unwrap();
    let mut scanner = Scanner::new(source, PageDecoder::new(), ScanOptions::default());
    let mut results = Vec::new();
    while let Some(report) = scanner.next_block(&mut wtdecode_engine::NullSink).unwrap() {
        results.push(report.result.map(|b| b.checksum).map_err(|e| e.kind()));
    }

    assert_eq!(results[0], Ok(Verification::Unverified));
    // Corruption in the data goes unnoticed without a checksummer
    assert_eq!(results[1], Ok(Verification::Unverified));
    assert_eq!(results[2], Err("DecompressionUnavailable"));
}

#[test]
fn test_skip_data_option() {
    let bytes = synthetic_file();
    let source = SeekSource::new(temp_file(&bytes)).unwrap();
    let options = ScanOptions {
        skip_data: true,
        pages: Some(1),
        ..Default::default()
    };
    let mut scanner = Scanner::new(source, PageDecoder::with_default_capabilities(), options);
    let summary = scanner.run(&mut wtdecode_engine::NullSink).unwrap();
    assert_eq!(summary.blocks, 1);
    assert_eq!(summary.failed, 0);
}

struct BrokenSource;

impl BlockSource for BrokenSource {
    fn read_at(&mut self, offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
        if offset == 0 {
            return Ok(0);
        }
        Err(io::Error::new(io::ErrorKind::Other, "device error"))
    }

    fn len_hint(&self) -> Option<u64> {
        None
    }
}

#[test]
fn test_source_failure_is_fatal() {
    let options = ScanOptions {
        offset: 512,
        ..Default::default()
    };
    let mut scanner = Scanner::new(BrokenSource, PageDecoder::new(), options);
    let err = scanner.run(&mut wtdecode_engine::NullSink).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, DecodeError::SourceUnavailable(_)));
}
