//! Configuration file support
//!
//! An optional TOML file supplies defaults; command-line flags override it.
//!
//! ```toml
//! log_level = "debug"
//! verbose = true
//! split = false
//! checksum = true
//! decompress = false
//!
//! [scan]
//! offset = 4096
//! pages = 10
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use wtdecode_engine::ScanOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Which blocks to decode
    #[serde(default)]
    pub scan: ScanOptions,

    /// Print cells, not just headers
    #[serde(default)]
    pub verbose: bool,

    /// Show raw bytes beside headers and cells
    #[serde(default)]
    pub split: bool,

    /// Verify block checksums
    #[serde(default = "default_true")]
    pub checksum: bool,

    /// Expand compressed pages
    #[serde(default = "default_true")]
    pub decompress: bool,

    /// Write per-block statistics to this CSV file
    #[serde(default)]
    pub csv: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            verbose: false,
            split: false,
            checksum: true,
            decompress: true,
            csv: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}
