//! On-disk format definitions
//!
//! This module handles the byte-level layout of WiredTiger files:
//! - Packed integer codec
//! - File, page and block headers
//! - Cell descriptors and cell kinds
//! - Per-page statistics

pub mod varint;
pub mod header;
pub mod cell;
pub mod stats;

pub use header::{
    BlockFlags, BlockHeader, FileHeader, PageFlags, PageHeader, PageType, BLOCK_PREFIX_SIZE,
};
pub use cell::{Cell, CellKind, TimeFlags, TimeWindow};
pub use stats::PageStatistics;
