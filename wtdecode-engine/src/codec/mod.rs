//! Optional block capabilities
//!
//! Checksum verification and payload decompression are injected into the
//! page decoder as trait objects. The default implementations (CRC32C and
//! Snappy) sit behind cargo features of the same name.

pub mod checksum;
pub mod compress;

pub use checksum::{Checksummer, Verification};
pub use compress::Decompressor;

#[cfg(feature = "crc32c")]
pub use checksum::Crc32c;
#[cfg(feature = "snappy")]
pub use compress::Snappy;
