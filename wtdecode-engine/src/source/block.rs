//! Byte sources that blocks are read from
//!
//! A scan reads each block twice: first the fixed 40-byte prefix, then, once
//! the headers say how large the block is, the whole block again from its
//! start. That second read is an explicit `read_at` on the same offset, so a
//! source must be able to serve the current block again. Seekable sources
//! simply seek; [`StreamSource`] keeps the bytes from the most recent offset
//! buffered so pipes work too.

use std::io::{self, Read, Seek, SeekFrom};

/// A byte source addressed by absolute offset
pub trait BlockSource {
    /// Read up to `buf.len()` bytes starting at `offset`
    ///
    /// Returns the number of bytes read, which is short only at the end of
    /// input.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total length, when known
    fn len_hint(&self) -> Option<u64>;
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn len_hint(&self) -> Option<u64> {
        (**self).len_hint()
    }
}

/// Source over anything seekable: files, in-memory cursors
pub struct SeekSource<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> SeekSource<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(SeekSource { inner, len })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> BlockSource for SeekSource<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        read_full(&mut self.inner, buf)
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.len)
    }
}

/// Forward-only source over a pipe or other non-seekable reader
///
/// Offsets must not decrease below the start of the most recent read.
pub struct StreamSource<R> {
    inner: R,
    window_start: u64,
    window: Vec<u8>,
}

impl<R: Read> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        StreamSource {
            inner,
            window_start: 0,
            window: Vec::new(),
        }
    }
}

impl<R: Read> BlockSource for StreamSource<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset < self.window_start {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!(
                    "cannot seek back to {:#x} on a stream positioned at {:#x}",
                    offset, self.window_start
                ),
            ));
        }

        // Move the window start forward to `offset`
        let skip = offset - self.window_start;
        if skip >= self.window.len() as u64 {
            let discard = skip - self.window.len() as u64;
            self.window.clear();
            self.window_start = offset;
            if discard > 0 {
                let skipped = io::copy(&mut (&mut self.inner).take(discard), &mut io::sink())?;
                if skipped < discard {
                    return Ok(0);
                }
            }
        } else {
            self.window.drain(..skip as usize);
            self.window_start = offset;
        }

        // Fill the window up to the requested length
        if self.window.len() < buf.len() {
            let want = (buf.len() - self.window.len()) as u64;
            (&mut self.inner).take(want).read_to_end(&mut self.window)?;
        }

        let n = buf.len().min(self.window.len());
        buf[..n].copy_from_slice(&self.window[..n]);
        Ok(n)
    }

    fn len_hint(&self) -> Option<u64> {
        None
    }
}

/// Read until `buf` is full or the reader is exhausted
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
