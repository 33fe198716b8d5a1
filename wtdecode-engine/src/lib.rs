//! wtdecode engine - decoder for WiredTiger on-disk blocks
//!
//! This crate parses raw `.wt` file bytes into file headers, page and block
//! headers, and the variable-length cells stored in row-store pages. It
//! verifies checksums and expands compressed pages when the corresponding
//! capabilities are configured, and reports corruption without panicking.

pub mod error;
pub mod format;
pub mod source;
pub mod codec;
pub mod decode;

pub use error::{DecodeError, DecodeResult};
pub use decode::{
    BlockReport, DecodeSink, DecodedBlock, NullSink, PageBody, PageDecoder, ScanOptions,
    Scanner,
};
