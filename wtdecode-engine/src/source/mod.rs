//! Byte sources and cursors
//!
//! Reading blocks out of files and streams, and walking the bytes of a single
//! block or page.

pub mod block;
pub mod cursor;

pub use block::{BlockSource, SeekSource, StreamSource};
pub use cursor::{BlockCursor, ByteCursor, PageCursor};
