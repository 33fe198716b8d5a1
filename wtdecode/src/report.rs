//! Human-readable block report

use std::io::{self, Write};

use wtdecode_engine::codec::Verification;
use wtdecode_engine::decode::{BlockReport, CellHalt, RowPage};
use wtdecode_engine::format::{varint, BlockHeader, Cell, CellKind, FileHeader, PageHeader, TimeWindow};
use wtdecode_engine::{DecodeSink, PageBody};

use crate::hexdump::pretty_hex;

/// Longest undecoded remainder dumped after a cell error
const HALT_DUMP_LIMIT: usize = 256;

/// Column where raw bytes start in the split view
const SPLIT_INDENT: usize = 40;

/// Raw bytes per line in the split view
const SPLIT_BYTES_PER_LINE: usize = 20;

/// Show a number as decimal and hex
pub fn d_and_h(n: u64) -> String {
    format!("{} (0x{:x})", n, n)
}

fn signed_d_and_h(n: i64) -> String {
    if n < 0 {
        format!("{} (-0x{:x})", n, n.unsigned_abs())
    } else {
        d_and_h(n as u64)
    }
}

/// Best-effort rendering of cell data
///
/// Leading bytes at or above 0x7f are read as packed integers. Whatever
/// follows is shown as a string if it is UTF-8, otherwise the whole value is
/// shown as hex.
pub fn describe_bytes(data: &[u8]) -> String {
    let mut parts = Vec::new();
    let mut rest = data;
    while let Some(&first) = rest.first() {
        if first < 0x7f {
            break;
        }
        match varint::decode(rest) {
            Ok((value, used)) => {
                parts.push(format!("<packed {}>", signed_d_and_h(value)));
                rest = &rest[used..];
            }
            Err(_) => break,
        }
    }

    if rest.is_empty() {
        return parts.join(" ");
    }
    if let Ok(text) = std::str::from_utf8(rest) {
        parts.push(text.to_string());
        return format!("\"{}\"", parts.join(" "));
    }
    pretty_hex(data, 16, "    ")
}

/// Position column of the split view: 8 hex digits, abbreviated if longer
fn split_position(position: u64) -> String {
    let hex = format!("{:x}", position);
    if hex.len() > 8 {
        format!("...{}: ", &hex[hex.len() - 5..])
    } else {
        format!("{:>8}: ", hex)
    }
}

/// Raw bytes shown to the right of the decoded output
///
/// The first line starts with `label`, left-justified in the indent.
pub fn split_lines(label: &str, position: u64, bytes: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut indent = format!("{:<width$.width$}", label, width = SPLIT_INDENT);
    let mut pos = split_position(position);
    for chunk in bytes.chunks(SPLIT_BYTES_PER_LINE) {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        lines.push(format!("{}{}{}", indent, pos, hex.join(" ")));
        indent = " ".repeat(SPLIT_INDENT);
        pos = " ".repeat(10);
    }
    lines
}

fn describe_cell(cell: &Cell<'_>) -> String {
    let len = cell.length;
    match cell.kind {
        CellKind::KeyShort => format!("short key {} bytes", len),
        CellKind::KeyShortPrefix => format!(
            "short key prefix={:#x} {} bytes",
            cell.prefix.unwrap_or(0),
            len
        ),
        CellKind::ValueShort => format!("short val {} bytes", len),
        CellKind::Key => format!("key {} bytes", len),
        CellKind::KeyPrefix => {
            format!("key prefix={:#x} {} bytes", cell.prefix.unwrap_or(0), len)
        }
        CellKind::Value => format!("val {} bytes", len),
        CellKind::KeyOverflow => format!("overflow key {} bytes", len),
        CellKind::ValueOverflow => format!("overflow val {} bytes", len),
        CellKind::KeyOverflowRemoved => format!("removed overflow key {} bytes", len),
        CellKind::ValueOverflowRemoved => format!("removed overflow val {} bytes", len),
        CellKind::AddressDeleted => format!("addr (deleted) {} bytes", len),
        CellKind::AddressInternal => format!("addr (internal) {} bytes", len),
        CellKind::AddressLeaf => format!("addr (leaf) {} bytes", len),
        CellKind::AddressLeafNoOverflow => format!("addr (leaf no-overflow) {} bytes", len),
        CellKind::Deleted => "deleted".to_string(),
        CellKind::ValueCopy => format!(
            "value copy of cell at offset {}",
            d_and_h(cell.copy_offset.unwrap_or(0))
        ),
    }
}

fn time_window_lines(window: &TimeWindow) -> Vec<String> {
    let mut lines = Vec::new();
    if window.prepared() {
        lines.push(" prepared".to_string());
    }
    let fields = [
        ("durable start ts", window.durable_start_ts),
        ("durable stop ts", window.durable_stop_ts),
        ("start ts", window.start_ts),
        ("stop ts", window.stop_ts),
        ("start txn", window.start_txn),
        ("stop txn", window.stop_txn),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            lines.push(format!(" {}: {:#x}", name, value));
        }
    }
    if window.has_junk() {
        lines.push(format!(
            " *** JUNK in extra descriptor: {:#x}",
            window.flags.bits()
        ));
    }
    lines
}

/// Prints headers, and in verbose mode cells and raw payloads
///
/// In split mode the encoded bytes of each header and cell are printed,
/// indented, before its decoded form.
pub struct TextReport<W: Write> {
    out: W,
    verbose: bool,
    split: bool,
}

impl<W: Write> TextReport<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        TextReport {
            out,
            verbose,
            split: false,
        }
    }

    pub fn with_split(mut self, split: bool) -> Self {
        self.split = split;
        self
    }

    fn write_split(&mut self, label: &str, position: u64, bytes: &[u8]) -> io::Result<()> {
        for line in split_lines(label, position, bytes) {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn write_rows(&mut self, rows: &RowPage) -> io::Result<()> {
        if let Some(CellHalt {
            index,
            position,
            error,
            remainder,
        }) = &rows.halt
        {
            writeln!(
                self.out,
                "? cell {} at page position {}: {}",
                index,
                d_and_h(*position as u64),
                error
            )?;
            if self.verbose {
                let shown = &remainder[..remainder.len().min(HALT_DUMP_LIMIT)];
                for (i, chunk) in shown.chunks(16).enumerate() {
                    writeln!(
                        self.out,
                        "{:#x}:  {}",
                        position + i * 16,
                        pretty_hex(chunk, 16, "")
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> DecodeSink for TextReport<W> {
    fn file_header(&mut self, header: &FileHeader, checksum: Verification) -> io::Result<()> {
        writeln!(self.out, "magic: {}", header.magic)?;
        writeln!(self.out, "major: {}", header.major)?;
        writeln!(self.out, "minor: {}", header.minor)?;
        writeln!(self.out, "checksum: {}", header.checksum)?;
        if let Verification::Mismatch { computed } = checksum {
            writeln!(self.out, "? the file header checksum does not match {:#x}", computed)?;
        }
        Ok(())
    }

    fn block_start(&mut self, offset: u64) -> io::Result<()> {
        writeln!(self.out, "Decode at {}", d_and_h(offset))
    }

    fn page_start(&mut self, offset: u64, page: &PageHeader, block: &BlockHeader) -> io::Result<()> {
        if self.split {
            self.write_split("", offset, &page.to_bytes())?;
        }
        writeln!(self.out, "Page Header:")?;
        writeln!(self.out, "  recno: {}", page.recno)?;
        writeln!(self.out, "  writegen: {}", page.write_gen)?;
        writeln!(self.out, "  memsize: {}", page.memsize)?;
        writeln!(self.out, "  ncells (oflow len): {}", page.entries)?;
        writeln!(self.out, "  page type: {}", page.page_type)?;
        writeln!(self.out, "  page flags: {:#x}", page.flags.bits())?;
        writeln!(self.out, "  version: {}", page.version)?;
        if self.split {
            self.write_split("", offset + PageHeader::SIZE as u64, &block.to_bytes())?;
        }
        writeln!(self.out, "Block Header:")?;
        writeln!(self.out, "  disk_size: {}", block.disk_size)?;
        writeln!(self.out, "  checksum: {:#x}", block.checksum)?;
        writeln!(self.out, "  block flags: {:#x}", block.flags.bits())
    }

    fn cell(&mut self, index: usize, cell: &Cell<'_>) -> io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        // In split mode the cell number leads the raw bytes instead
        let mut head = if self.split {
            let label = format!("{}: ", index);
            self.write_split(&label, cell.offset as u64, cell.raw)?;
            format!("  desc: {:#x}", cell.descriptor)
        } else {
            format!("{}: desc: {:#x}", index, cell.descriptor)
        };
        if let Some(window) = &cell.time_window {
            head.push_str(&format!(" extra: {:#x}", window.flags.bits()));
        }
        writeln!(self.out, "{}", head)?;

        if let Some(window) = &cell.time_window {
            let lines = time_window_lines(window);
            if !lines.is_empty() {
                writeln!(self.out, "  cell has timestamps:")?;
                for line in lines {
                    writeln!(self.out, "  {}", line)?;
                }
            }
        }
        if let Some(run_length) = cell.run_length {
            writeln!(self.out, "  runlength/addr: {}", d_and_h(run_length))?;
        }
        writeln!(self.out, "  {}:", describe_cell(cell))?;
        if !cell.data.is_empty() {
            writeln!(self.out, "    {}", describe_bytes(cell.data))?;
        }
        Ok(())
    }

    fn block_end(&mut self, report: &BlockReport) -> io::Result<()> {
        match &report.result {
            Err(e) => {
                writeln!(self.out, "ERROR decoding block at {}: {}", d_and_h(report.offset), e)?;
            }
            Ok(block) => {
                if block.checksum == Verification::Unverified {
                    writeln!(self.out, "? checksum not verified")?;
                }
                match &block.body {
                    PageBody::Skipped => {}
                    PageBody::Rows(rows) => self.write_rows(rows)?,
                    PageBody::Overflow(data) => {
                        if self.verbose {
                            writeln!(self.out, "{}", describe_bytes(data))?;
                        }
                    }
                    PageBody::Unimplemented(data) => {
                        if self.verbose {
                            writeln!(
                                self.out,
                                "? unimplemented decode for page type {}",
                                block.page.page_type
                            )?;
                            writeln!(self.out, "  {}", pretty_hex(data, 16, "  "))?;
                        }
                    }
                }
            }
        }
        writeln!(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wtdecode_engine::format::{PageFlags, PageType, BlockFlags};

    #[test]
    fn test_describe_bytes() {
        assert_eq!(describe_bytes(b"hello"), "\"hello\"");
        assert_eq!(describe_bytes(&[0x85]), "<packed 5 (0x5)>");
        assert_eq!(describe_bytes(&[0x81, 0x82, b'a']), "\"<packed 1 (0x1)> <packed 2 (0x2)> a\"");
        assert_eq!(describe_bytes(&[0x7f]), "<packed -1 (-0x1)>");
        assert!(describe_bytes(&[0x00, 0xff, 0xfe]).starts_with("00 ff fe"));
        assert_eq!(describe_bytes(&[]), "");
    }

    #[test]
    fn test_headers_and_cells() {
        let mut report = TextReport::new(Vec::new(), true);
        let page = PageHeader {
            recno: 0,
            write_gen: 12,
            memsize: 60,
            entries: 1,
            page_type: PageType::RowLeaf,
            flags: PageFlags::empty(),
            version: 1,
        };
        let block = BlockHeader {
            disk_size: 512,
            checksum: 0xabcd,
            flags: BlockFlags::DATA_CHECKSUM,
        };
        report.block_start(512).unwrap();
        report.page_start(512, &page, &block).unwrap();

        let cell = Cell {
            descriptor: 0x0d,
            kind: CellKind::KeyShort,
            time_window: None,
            run_length: None,
            prefix: None,
            copy_offset: None,
            length: 3,
            data: b"abc",
            offset: 40,
            size: 4,
            raw: &[0x0d, b'a', b'b', b'c'],
        };
        report.cell(0, &cell).unwrap();

        let text = String::from_utf8(report.out).unwrap();
        assert!(text.starts_with("Decode at 512 (0x200)\nPage Header:\n"));
        assert!(text.contains("  page type: 7 (WT_PAGE_ROW_LEAF)\n"));
        assert!(text.contains("  checksum: 0xabcd\n"));
        assert!(text.contains("0: desc: 0xd\n  short key 3 bytes:\n    \"abc\"\n"));
    }

    #[test]
    fn test_split_lines() {
        let bytes: Vec<u8> = (0..25).collect();
        let lines = split_lines("3: ", 0x1234, &bytes);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!(
                "3: {}    1234: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f 10 11 12 13",
                " ".repeat(37)
            )
        );
        assert_eq!(lines[1], format!("{}14 15 16 17 18", " ".repeat(50)));
        assert!(split_lines("", 0x123456789, &[1]).contains(&format!("{}...56789: 01", " ".repeat(40))));
    }

    #[test]
    fn test_split_cell() {
        let mut report = TextReport::new(Vec::new(), true).with_split(true);
        let cell = Cell {
            descriptor: 0x09,
            kind: CellKind::KeyShort,
            time_window: None,
            run_length: None,
            prefix: None,
            copy_offset: None,
            length: 2,
            data: b"hi",
            offset: 0x30,
            size: 3,
            raw: &[0x09, b'h', b'i'],
        };
        report.cell(7, &cell).unwrap();

        let text = String::from_utf8(report.out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], format!("7: {}      30: 09 68 69", " ".repeat(37)));
        assert_eq!(lines[1], "  desc: 0x9");
        assert_eq!(lines[2], "  short key 2 bytes:");
    }

    #[test]
    fn test_cells_hidden_unless_verbose() {
        let mut report = TextReport::new(Vec::new(), false);
        let cell = Cell {
            descriptor: 0x40,
            kind: CellKind::Deleted,
            time_window: None,
            run_length: None,
            prefix: None,
            copy_offset: None,
            length: 0,
            data: &[],
            offset: 40,
            size: 1,
            raw: &[0x40],
        };
        report.cell(0, &cell).unwrap();
        assert!(report.out.is_empty());
    }
}
