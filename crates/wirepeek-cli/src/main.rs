//! wirepeek - Inspect schema-less protobuf-style binary payloads
//!
//! This tool decodes raw varint-tagged messages without a schema and prints
//! them as an indented tree of numbered fields.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use wirepeek_core::decoder::DEFAULT_MAX_DEPTH;
use wirepeek_core::{walk, DecodedMessage, Decoder, DecoderConfig, Printer, PrinterConfig, StatsVisitor};

/// Decode protobuf-style binary payloads without a schema
#[derive(Parser, Debug)]
#[command(name = "wirepeek")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Deepest nesting level at which payloads are still tried as messages
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Decode only the first N bytes of each payload
    #[arg(long)]
    length: Option<usize>,

    /// Indent nested fields with N spaces instead of a tab
    #[arg(long)]
    indent: Option<usize>,

    /// Skip payloads whose content was already decoded (directory mode)
    #[arg(long)]
    skip_duplicates: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a file holding one raw payload
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of payload files to decode recursively
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Payload given as a hex string (whitespace and a 0x prefix are ignored)
    #[arg(short = 'x', long)]
    hex: Option<String>,

    /// Read one raw payload from standard input
    #[arg(long)]
    stdin: bool,
}

/// Output format for decoded payloads
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Indented field tree
    Text,
    /// One line of counts per payload
    Stats,
}

/// Tracks decoded payloads by content hash
#[derive(Default)]
struct PayloadRegistry {
    seen: HashSet<blake3::Hash>,
    stats: RegistryStats,
}

#[derive(Default)]
struct RegistryStats {
    decoded: usize,
    failed: usize,
    duplicates_skipped: usize,
}

impl PayloadRegistry {
    fn new() -> Self {
        Self::default()
    }

    /// Short hash of the content (first 8 chars of blake3)
    fn short_hash(hash: &blake3::Hash) -> String {
        hash.to_hex()[..8].to_string()
    }

    /// Record a payload; returns false if identical content was seen before
    fn register(&mut self, data: &[u8]) -> bool {
        let hash = blake3::hash(data);
        if self.seen.insert(hash) {
            true
        } else {
            debug!("Skipping duplicate payload (hash: {})", Self::short_hash(&hash));
            self.stats.duplicates_skipped += 1;
            false
        }
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} decoded, {} failed, {} duplicates skipped",
            self.stats.decoded, self.stats.failed, self.stats.duplicates_skipped
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let stdout = io::stdout();
    run(&cli, &mut stdout.lock())
}

fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    // Decode failures are reported through anyhow, so the sink only needs
    // to feed debug logging.
    let decoder = Decoder::with_config(DecoderConfig::new().max_depth(cli.max_depth))
        .with_sink(|line: &str| debug!("{}", line));

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        let data = read_file(file)?;
        process_payload(cli, &decoder, &data, out)
            .with_context(|| format!("Failed to decode {}", file.display()))
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(cli, &decoder, directory, out)
    } else if let Some(ref hex) = cli.input.hex {
        let data = parse_hex(hex)?;
        process_payload(cli, &decoder, &data, out).context("Failed to decode hex payload")
    } else if cli.input.stdin {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .context("Failed to read standard input")?;
        process_payload(cli, &decoder, &data, out).context("Failed to decode standard input")
    } else {
        bail!("One of --file, --directory, --hex or --stdin must be specified")
    }
}

fn read_file(file: &Path) -> Result<Vec<u8>> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    trace!("Reading {}", file.display());
    fs::read(file).with_context(|| format!("Failed to read input file: {}", file.display()))
}

/// Decode every payload file under a directory
fn process_directory(
    cli: &Cli,
    decoder: &Decoder,
    directory: &Path,
    out: &mut impl Write,
) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut registry = PayloadRegistry::new();

    let mut entries: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| path.is_file() && !is_hidden(path))
        .collect();
    entries.sort();

    for path in entries {
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Error reading {}: {}", path.display(), e);
                registry.stats.failed += 1;
                continue;
            }
        };

        if cli.skip_duplicates && !registry.register(&data) {
            continue;
        }

        writeln!(out, "== {} ({} bytes)", path.display(), data.len())?;
        match process_payload(cli, decoder, &data, out) {
            Ok(()) => registry.stats.decoded += 1,
            Err(e) => {
                // Log error but continue with other files
                warn!("Error decoding {}: {}", path.display(), e);
                writeln!(out, "<decode failed>")?;
                registry.stats.failed += 1;
            }
        }
    }

    registry.print_summary();
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Decode one payload and write it in the selected format
fn process_payload(cli: &Cli, decoder: &Decoder, data: &[u8], out: &mut impl Write) -> Result<()> {
    let len = cli.length.map_or(data.len(), |len| len.min(data.len()));
    trace!("Decoding {} of {} bytes", len, data.len());

    let message = decoder.parse(data, len)?;
    write_message(cli, &message, out)
}

fn write_message(cli: &Cli, message: &DecodedMessage, out: &mut impl Write) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let config = match cli.indent {
                Some(width) => PrinterConfig::new().indent_str(" ".repeat(width)),
                None => PrinterConfig::new(),
            };
            write!(out, "{}", Printer::with_config(config).print(message))?;
        }
        OutputFormat::Stats => {
            let mut stats = StatsVisitor::default();
            walk(message, &mut stats);
            writeln!(
                out,
                "messages={} fields={} repeated={} integers={} strings={} depth={}",
                stats.message_count,
                stats.field_count,
                stats.repeated_count,
                stats.integer_count,
                stats.text_count,
                stats.max_depth
            )?;
        }
    }
    Ok(())
}

/// Parse a hex string, ignoring whitespace and an optional `0x` prefix
fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if digits.len() % 2 != 0 {
        bail!("Hex payload has an odd number of digits: {}", digits.len());
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = digits.get(i..i + 2).context("Hex payload contains non-ASCII characters")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("Invalid hex byte: {pair:?}"))
        })
        .collect()
}
