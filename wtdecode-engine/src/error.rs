//! Decode errors and their scope
//!
//! Every failure the decoder can report is a variant of [`DecodeError`].
//! Most are scoped to a single block: the scanner records them against the
//! block offset and moves on to the next aligned block. Three are fatal for the
//! whole scan: an unrecognized file header and a failing byte source or
//! output sink.

use std::io;

use thiserror::Error;

/// Main error type for the decoder
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The 16-byte file header is not a recognized block-manager header
    #[error("invalid file header: {0}")]
    InvalidFileHeader(String),

    /// The 40-byte page/block prefix failed validation
    #[error("invalid block header: {0}")]
    InvalidBlockHeader(String),

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Fewer bytes were available than the block headers require
    #[error("truncated block: needed {needed} bytes, {available} available")]
    TruncatedBlock { needed: usize, available: usize },

    #[error("page is compressed and no decompressor is configured")]
    DecompressionUnavailable,

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// The first byte of a packed integer is in a reserved marker range
    #[error("malformed packed integer: marker {0:#04x}")]
    MalformedVarint(u8),

    /// A buffer ended inside a fixed-width field or a packed integer
    #[error("unexpected end of data: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("unknown cell type {type_bits} in descriptor {descriptor:#04x}")]
    UnknownCellType { descriptor: u8, type_bits: u8 },

    /// Cell decoding reached or crossed the page's in-memory size
    #[error("cell data overflows page memsize {memsize} at position {position}")]
    OverflowDetected { position: usize, memsize: usize },

    /// The underlying byte source failed
    #[error("byte source unavailable: {0}")]
    SourceUnavailable(#[from] io::Error),

    /// Writing decoded output failed
    #[error("output failed: {0}")]
    SinkFailed(#[source] io::Error),
}

impl DecodeError {
    /// Fatal errors stop the scan; everything else only skips the current block
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::InvalidFileHeader(_)
                | DecodeError::SourceUnavailable(_)
                | DecodeError::SinkFailed(_)
        )
    }

    /// Short, stable name for reports and CSV output
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::InvalidFileHeader(_) => "InvalidFileHeader",
            DecodeError::InvalidBlockHeader(_) => "InvalidBlockHeader",
            DecodeError::ChecksumMismatch { .. } => "ChecksumMismatch",
            DecodeError::TruncatedBlock { .. } => "TruncatedBlock",
            DecodeError::DecompressionUnavailable => "DecompressionUnavailable",
            DecodeError::DecompressionFailed(_) => "DecompressionFailed",
            DecodeError::MalformedVarint(_) => "MalformedVarint",
            DecodeError::UnexpectedEof { .. } => "UnexpectedEof",
            DecodeError::UnknownCellType { .. } => "UnknownCellType",
            DecodeError::OverflowDetected { .. } => "OverflowDetected",
            DecodeError::SourceUnavailable(_) => "SourceUnavailable",
            DecodeError::SinkFailed(_) => "SinkFailed",
        }
    }
}

/// Result type for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;
