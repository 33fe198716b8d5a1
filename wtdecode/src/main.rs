//! wtdecode - print the blocks, pages and cells of WiredTiger files
//!
//! Reads a `.wt` file, stdin, or a hex dump and decodes it block by block.
//! Corrupt blocks are reported and skipped; the scan stops only when the
//! input cannot be read or is not a WiredTiger file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use wtdecode_engine::source::{BlockSource, SeekSource, StreamSource};
use wtdecode_engine::{DecodeError, DecodeSink, PageDecoder, Scanner};

mod config;
mod csv;
mod hexdump;
mod report;

use config::Config;
use csv::CsvReport;
use hexdump::parse_hex_dump;
use report::TextReport;

/// Decode WiredTiger on-disk files
#[derive(Parser, Debug)]
#[command(name = "wtdecode")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File name, or '-' for stdin
    filename: String,

    /// Offset of the first block to decode
    #[arg(short, long)]
    offset: Option<u64>,

    /// Number of blocks to decode (0 for all)
    #[arg(short, long)]
    pages: Option<u64>,

    /// Input is a fragment without a file header
    #[arg(short, long)]
    fragment: bool,

    /// Input is a hex dump, possibly embedded in log lines
    #[arg(short, long)]
    dumpin: bool,

    /// Print cells and payloads, not just headers
    #[arg(short, long)]
    verbose: bool,

    /// Also show the raw bytes behind each header and cell
    #[arg(short, long)]
    split: bool,

    /// Stop each block after its checksum
    #[arg(long)]
    skip_data: bool,

    /// Write per-block statistics to a CSV file
    #[arg(short, long)]
    csv: Option<PathBuf>,

    /// Do not verify checksums
    #[arg(long)]
    no_checksum: bool,

    /// Do not expand compressed pages
    #[arg(long)]
    no_decompress: bool,

    /// TOML config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short = 'D', long)]
    debug: bool,
}

/// Apply command-line flags on top of the config file
fn merge(args: &Args, mut config: Config) -> Config {
    if let Some(offset) = args.offset {
        config.scan.offset = offset;
    }
    if let Some(pages) = args.pages {
        config.scan.pages = if pages == 0 { None } else { Some(pages) };
    }
    config.scan.fragment |= args.fragment || args.dumpin;
    config.scan.skip_data |= args.skip_data;
    config.verbose |= args.verbose;
    config.split |= args.split;
    if args.no_checksum {
        config.checksum = false;
    }
    if args.no_decompress {
        config.decompress = false;
    }
    if args.csv.is_some() {
        config.csv = args.csv.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    } else if args.debug {
        config.log_level = "debug".to_string();
    }
    config
}

fn build_decoder(config: &Config) -> PageDecoder {
    let mut decoder = PageDecoder::with_default_capabilities();
    if !config.checksum {
        decoder = decoder.without_checksum();
    }
    if !config.decompress {
        decoder = decoder.without_decompression();
    }
    decoder
}

fn read_dump(filename: &str) -> Result<Vec<u8>> {
    if filename == "-" {
        parse_hex_dump(io::stdin().lock())
    } else {
        let file = File::open(filename).with_context(|| format!("opening {}", filename))?;
        parse_hex_dump(BufReader::new(file))
    }
}

/// Scan `source`, writing the report to `sink`
fn scan<S, K>(source: S, decoder: PageDecoder, config: &Config, sink: &mut K) -> Result<()>
where
    S: BlockSource,
    K: DecodeSink,
{
    let mut scanner = Scanner::new(source, decoder, config.scan.clone());
    match scanner.run(sink) {
        Ok(summary) => {
            info!(
                blocks = summary.blocks,
                failed = summary.failed,
                halted = summary.halted,
                "scan complete"
            );
            Ok(())
        }
        Err(DecodeError::SinkFailed(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("output closed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn run(args: Args, config: Config) -> Result<()> {
    let decoder = build_decoder(&config);
    let stdout = io::stdout();
    let mut text =
        TextReport::new(BufWriter::new(stdout.lock()), config.verbose).with_split(config.split);

    let csv = match &config.csv {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating CSV file {}", path.display()))?;
            Some(CsvReport::new(BufWriter::new(file))?)
        }
        None => None,
    };
    let mut sink = (&mut text, csv);

    let preamble = format!(
        "{}, position {:#x}, pagelimit {}",
        args.filename,
        config.scan.offset,
        config.scan.page_limit().unwrap_or(0)
    );

    let result = if args.dumpin {
        let bytes = read_dump(&args.filename)?;
        sink.0.line(&preamble)?;
        scan(SeekSource::new(Cursor::new(bytes))?, decoder, &config, &mut sink)
    } else if args.filename == "-" {
        sink.0.line(&preamble)?;
        scan(StreamSource::new(io::stdin().lock()), decoder, &config, &mut sink)
    } else {
        let file = File::open(&args.filename)
            .with_context(|| format!("opening {}", args.filename))?;
        sink.0.line(&preamble)?;
        scan(SeekSource::new(file)?, decoder, &config, &mut sink)
    };

    if let Some(csv) = sink.1.as_mut() {
        csv.flush()?;
    }
    match sink.0.flush() {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        other => other?,
    }
    result
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config = merge(&args, config);

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    debug!(?config, "configuration");
    let result = run(args, config);
    io::stderr().flush().ok();
    result
}
