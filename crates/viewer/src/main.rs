mod config;
mod error;
mod export;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use cmdbuf::conf::DecoderConfig;
use cmdbuf::decode::{CommandDecoder, DecodeSession};
use cmdbuf::integrity::IntegrityScanner;
use cmdbuf::memory::{BufferKind, LocatedBuffer, MemoryResolver};
use cmdbuf::regs::HardwareRegisters;
use cmdbuf::report::{render_text, Report, TextOptions};

use crate::config::{LogFormat, LogOutput, ViewerConfig};
use crate::error::{ViewerError, ViewerResult};
use crate::export::Exporter;

/// Decode VGLite GPU command buffers from hang logs and coredumps.
#[derive(Debug, Parser)]
#[command(name = "cmdbuf-viewer", version)]
struct Cli {
    /// Log file to decode
    #[arg(short, long, conflicts_with_all = ["string", "elf"])]
    file: Option<PathBuf>,

    /// Command words given inline, e.g. "0x30010A00 0x00000100"
    #[arg(short, long, conflicts_with = "elf")]
    string: Option<String>,

    /// Firmware ELF providing the driver symbols
    #[arg(long, requires = "core")]
    elf: Option<PathBuf>,

    /// ELF core or raw memory snapshot
    #[arg(long, requires = "elf")]
    core: Option<PathBuf>,

    /// Decode command ring 0 or 1 instead of the backup buffer
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1), requires = "core", conflicts_with = "init")]
    cmdbuf: Option<u8>,

    /// Decode the init command buffer instead of the backup buffer
    #[arg(long, requires = "core")]
    init: bool,

    /// Print register details under each instruction
    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    no_parse_path: bool,

    #[arg(long)]
    no_parse_image: bool,

    /// Scan the log for corrupted lines
    #[arg(short = 'c', long)]
    check_integrity: bool,

    /// Analyze the GPU register dump printed before the command buffers
    #[arg(short, long)]
    regs: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Export decoded paths (.svg, anything else gets an HTML page)
    #[arg(short = 'S', long)]
    export: Option<PathBuf>,

    #[arg(long)]
    canvas_width: Option<u32>,

    #[arg(long)]
    canvas_height: Option<u32>,
}

impl Cli {
    fn buffer_kind(&self) -> Option<BufferKind> {
        match (self.cmdbuf, self.init) {
            (Some(ring), _) => Some(BufferKind::Ring(ring)),
            (None, true) => Some(BufferKind::Init),
            (None, false) => None,
        }
    }

    fn text_options(&self) -> TextOptions {
        TextOptions {
            verbose: self.verbose,
            show_paths: !self.no_parse_path,
            show_images: !self.no_parse_image,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Thread-local subscriber for config loading, replaced once the
    // logging section is known
    let basic_tracing = init_tracing_basic();

    let mut config = ViewerConfig::load().context("Failed to load viewer configuration")?;
    if let Some(width) = cli.canvas_width {
        config.export.canvas_width = width;
    }
    if let Some(height) = cli.canvas_height {
        config.export.canvas_height = height;
    }
    config.validate().context("Viewer configuration validation failed")?;

    let mut decoder_config = DecoderConfig::load().context("Failed to load decoder configuration")?;
    if cli.no_parse_path {
        decoder_config.parse_path = false;
    }
    if cli.no_parse_image {
        decoder_config.parse_image = false;
    }

    drop(basic_tracing);
    init_tracing_from_config(&config)?;

    info!("cmdbuf-viewer v{}", env!("CARGO_PKG_VERSION"));

    let decoder = CommandDecoder::new(decoder_config);

    let report = match (&cli.elf, &cli.core) {
        (Some(elf), Some(core)) => analyze_coredump(elf, core, cli.buffer_kind(), &decoder)
            .context("Failed to open coredump")?,
        _ => {
            let (name, text) = read_log_input(&cli).context("Failed to read input")?;
            analyze_log(name, &text, &cli, &decoder)?
        }
    };

    if cli.json {
        println!("{}", report.to_json().context("Failed to serialize report")?);
    } else {
        print!("{}", render_text(&report, &cli.text_options()));
    }

    if let Some(path) = &cli.export {
        export(&report, &config, path);
    }

    Ok(())
}

fn read_log_input(cli: &Cli) -> ViewerResult<(String, String)> {
    if let Some(path) = &cli.file {
        let bytes = std::fs::read(path).map_err(|source| ViewerError::Input {
            source_name: path.display().to_string(),
            source,
        })?;
        // Console captures can carry stray non-UTF-8 bytes
        return Ok((path.display().to_string(), String::from_utf8_lossy(&bytes).into_owned()));
    }
    if let Some(text) = &cli.string {
        return Ok(("<string>".to_string(), text.clone()));
    }

    let mut bytes = Vec::new();
    std::io::stdin()
        .read_to_end(&mut bytes)
        .map_err(|source| ViewerError::Input {
            source_name: "<stdin>".to_string(),
            source,
        })?;
    Ok(("<stdin>".to_string(), String::from_utf8_lossy(&bytes).into_owned()))
}

fn analyze_log(name: String, text: &str, cli: &Cli, decoder: &CommandDecoder) -> Result<Report> {
    let session = decoder.decode_log(text);
    let mut report = Report::new(name, session);

    if cli.check_integrity {
        let scanner = IntegrityScanner::new().context("Failed to build integrity scanner")?;
        let findings = scanner.scan(text);
        info!("Integrity scan: {} suspicious lines", findings.len());
        report = report.with_integrity(findings);
    }

    if cli.regs {
        let registers = HardwareRegisters::parse(text);
        if registers.is_empty() {
            warn!("No GPU register dump found in input");
        }
        report = report.with_registers(registers.analyze());
    }

    Ok(report)
}

/// Only a snapshot that cannot be opened is an error. A buffer or render
/// target that cannot be located leaves that part of the report empty.
/// Without an explicit selection the init buffer is decoded as well.
fn analyze_coredump(
    elf: &Path,
    core: &Path,
    requested: Option<BufferKind>,
    decoder: &CommandDecoder,
) -> ViewerResult<Report> {
    let resolver = MemoryResolver::load_files(elf, core, decoder.config())?;
    let mut session = DecodeSession::default();

    let located = match requested {
        Some(kind) => resolver.locate_command_buffer(kind),
        None => resolver.locate_command_buffer(BufferKind::Backup).or_else(|err| {
            let ring = resolver.current_ring().ok_or(err)?;
            warn!("Backup command buffer unavailable, falling back to ring {}", ring);
            resolver.locate_command_buffer(BufferKind::Ring(ring))
        }),
    };
    let primary = match located {
        Ok(buffer) => {
            session.append(decode_located(&buffer, &resolver, decoder));
            Some(buffer)
        }
        Err(err) => {
            error!("Could not locate command buffer: {}", err);
            None
        }
    };

    if requested.is_none() {
        match resolver.locate_command_buffer(BufferKind::Init) {
            Ok(init) => session.append(decode_located(&init, &resolver, decoder)),
            Err(err) => warn!("Init command buffer unavailable: {}", err),
        }
    }

    let mut report = Report::new(core.display().to_string(), session);
    if let Some(buffer) = primary {
        report = report.with_buffer(buffer);
    }

    match resolver.locate_render_target(false) {
        Ok(target) => {
            info!(
                "Render target {}x{} {} at 0x{:08X}",
                target.width, target.height, target.format_name, target.address
            );
            report = report.with_render_target(target);
        }
        Err(err) => warn!("Render target unavailable: {}", err),
    }

    Ok(report)
}

fn decode_located(buffer: &LocatedBuffer, resolver: &MemoryResolver, decoder: &CommandDecoder) -> DecodeSession {
    let mut session = decoder.decode_buffer(&buffer.kind.segment_name(), &buffer.bytes, Some(resolver.memory()));
    if let Some(segment) = session.segments.first_mut() {
        segment.address = u32::try_from(buffer.address).ok();
        segment.size = Some(buffer.size);
    }
    session
}

fn export(report: &Report, config: &ViewerConfig, path: &Path) {
    if report.session.is_empty() {
        warn!("No commands decoded, nothing to export to {}", path.display());
        return;
    }

    let mut exporter = Exporter::new(&config.export);
    if let Some(target) = &report.render_target {
        exporter = exporter.with_canvas(target.width, target.height);
    }

    if let Err(err) = exporter.write(&report.source, &report.session, path) {
        error!("{}", err);
    }
}

fn init_tracing_basic() -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cmdbuf=info,cmdbuf_viewer=info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_default(subscriber)
}

/// Global subscriber following the logging section. Stdout is left to the
/// report.
fn init_tracing_from_config(config: &ViewerConfig) -> Result<()> {
    use std::sync::Arc;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match (&config.logging.format, &config.logging.output) {
        (LogFormat::Json, LogOutput::Stderr) => {
            let layer = fmt::layer().json().with_target(true).with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        (LogFormat::Json, LogOutput::File { path }) => {
            let file = open_log_file(path)?;
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        (LogFormat::Pretty, LogOutput::Stderr) => {
            let layer = fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        (LogFormat::Pretty, LogOutput::File { path }) => {
            let file = open_log_file(path)?;
            let layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }

    Ok(())
}

fn open_log_file(path: &str) -> Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file '{}'", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_buffer_kind_selection() {
        let cli = Cli::parse_from(["cmdbuf-viewer", "--elf", "fw.elf", "--core", "crash.core", "--cmdbuf", "1"]);
        assert_eq!(cli.buffer_kind(), Some(BufferKind::Ring(1)));

        let cli = Cli::parse_from(["cmdbuf-viewer", "--elf", "fw.elf", "--core", "crash.core", "--init"]);
        assert_eq!(cli.buffer_kind(), Some(BufferKind::Init));

        let cli = Cli::parse_from(["cmdbuf-viewer", "--elf", "fw.elf", "--core", "crash.core"]);
        assert_eq!(cli.buffer_kind(), None);
    }

    #[test]
    fn test_cmdbuf_out_of_range_rejected() {
        let parsed = Cli::try_parse_from(["cmdbuf-viewer", "--elf", "a", "--core", "b", "--cmdbuf", "2"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_elf_requires_core() {
        assert!(Cli::try_parse_from(["cmdbuf-viewer", "--elf", "fw.elf"]).is_err());
    }

    #[test]
    fn test_string_input_report() {
        let cli = Cli::parse_from(["cmdbuf-viewer", "-s", "0x30010A00 0x00000100", "--regs", "-c"]);
        let (name, text) = read_log_input(&cli).unwrap();
        assert_eq!(name, "<string>");

        let report = analyze_log(name, &text, &cli, &CommandDecoder::default()).unwrap();
        assert_eq!(report.session.instructions().count(), 1);
        assert!(report.integrity.as_ref().unwrap().summary.is_clean());
    }
}
