//! Hex dump input and output
//!
//! Dumps pasted from logs carry a prefix on every line (a timestamp, an
//! address). Everything up to the last ':' on a line is dropped, spaces are
//! removed, and the rest is read as hex.

use std::io::BufRead;

use anyhow::{bail, Context, Result};

/// Read the bytes of a hex dump
pub fn parse_hex_dump<R: BufRead>(reader: R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading hex dump line {}", number + 1))?;
        let data = match line.rfind(':') {
            Some(colon) => &line[colon + 1..],
            None => line.as_str(),
        };
        let digits: Vec<u8> = data
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        if digits.len() % 2 != 0 {
            bail!("hex dump line {}: odd number of hex digits", number + 1);
        }
        for pair in digits.chunks(2) {
            let high = hex_value(pair[0]);
            let low = hex_value(pair[1]);
            match (high, low) {
                (Some(h), Some(l)) => bytes.push((h << 4) | l),
                _ => bail!(
                    "hex dump line {}: invalid hex digits {:?}",
                    number + 1,
                    String::from_utf8_lossy(pair)
                ),
            }
        }
    }
    Ok(bytes)
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Format bytes as hex, `per_line` to a line, with a printable column
///
/// Every line but the first starts with `prefix`.
pub fn pretty_hex(bytes: &[u8], per_line: usize, prefix: &str) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(per_line).enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(prefix);
        }
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let printable: String = chunk
            .iter()
            .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
            .collect();
        out.push_str(&format!(
            "{:<width$}  {}",
            hex.join(" "),
            printable,
            width = per_line * 3 - 1
        ));
    }
    out
}
