//! CLI module - Command line interface definitions and handlers

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::carve::{CarveOptions, CarveProgress, CarveReport, Carver, Pairing, ScanReport, TypeStatus};
use crate::catalog::{encode_hex_escaped, Catalog};
use crate::config::{generate_sample_config, Config};
use crate::engine::EngineKind;

/// Sawmill - carve embedded files out of raw images by signature
///
/// Finds header and footer signatures with a Commentz-Walter automaton (or
/// Boyer-Moore, one signature at a time), pairs them per file type and
/// extracts every pair verbatim. The source is only ever read.
#[derive(Parser, Debug)]
#[command(name = "sawmill")]
#[command(version)]
#[command(about = "Carve embedded files out of raw images by header/footer signature", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan, pair and extract embedded files
    Carve(CarveArgs),

    /// List signature matches without extracting anything
    Scan(ScanArgs),

    /// Show the signature catalog
    Signatures(SignaturesArgs),

    /// Print or create the config file
    Config(ConfigArgs),
}

/// Matching options shared by `carve` and `scan`
#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// Matching engine
    #[arg(long, value_enum)]
    pub engine: Option<EngineArg>,

    /// Bytes per read
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Signature catalog (TOML); default is the built-in catalog
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Only these file types (e.g., jpg,pdf)
    #[arg(long, short = 't', value_delimiter = ',')]
    pub types: Option<Vec<String>>,

    /// Number of scan threads (0 = one per file type)
    #[arg(long, short)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Parser)]
pub struct CarveArgs {
    /// Source image (dd, img, raw dump)
    #[arg(required = true)]
    pub source: PathBuf,

    /// Output directory for carved files
    #[arg(required = true)]
    pub output: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Header/footer pairing strategy
    #[arg(long, value_enum)]
    pub pairing: Option<PairingArg>,

    /// Dry run - pair and report without extracting
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Output format (human, json)
    #[arg(long, value_enum, default_value = "human")]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Parser)]
pub struct ScanArgs {
    /// Source image
    #[arg(required = true)]
    pub source: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Output format (human, json)
    #[arg(long, value_enum, default_value = "human")]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Parser)]
pub struct SignaturesArgs {
    /// Signature catalog (TOML); default is the built-in catalog
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Output format (human, json)
    #[arg(long, value_enum, default_value = "human")]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Parser)]
pub struct ConfigArgs {
    /// Print a commented sample config
    #[arg(long)]
    pub print_sample: bool,

    /// Write the sample config to the default path if none exists
    #[arg(long)]
    pub init: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable (default)
    #[default]
    Human,
    /// JSON output
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    /// Commentz-Walter: every signature of a type in one pass
    CommentzWalter,
    /// Boyer-Moore: one pass per signature
    BoyerMoore,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::CommentzWalter => EngineKind::CommentzWalter,
            EngineArg::BoyerMoore => EngineKind::BoyerMoore,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PairingArg {
    /// i-th header with i-th footer
    Positional,
    /// Each header with the next unused footer after it
    NearestFooter,
}

impl From<PairingArg> for Pairing {
    fn from(arg: PairingArg) -> Self {
        match arg {
            PairingArg::Positional => Pairing::Positional,
            PairingArg::NearestFooter => Pairing::NearestFooter,
        }
    }
}

/// Merge config values and command-line overrides into carve options
pub fn resolve_options(
    config: &Config,
    source: &Path,
    args: &EngineArgs,
) -> Result<(Catalog, CarveOptions)> {
    let mut options = config.carve_options(source.to_path_buf());
    if let Some(engine) = args.engine {
        options.engine = engine.into();
    }
    if let Some(size) = args.buffer_size {
        options.buffer_size = size;
    }
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    options.file_types = args.types.clone();

    let catalog = load_catalog(config, args.catalog.as_deref())?;
    Ok((catalog, options))
}

fn load_catalog(config: &Config, override_path: Option<&Path>) -> Result<Catalog> {
    match override_path {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load catalog: {}", path.display())),
        None => config.catalog(),
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn on_progress(pb: &ProgressBar, progress: CarveProgress) {
    match progress {
        CarveProgress::Scanning { file_types } => {
            pb.set_message(format!("Scanning for {file_types} file types..."));
        }
        CarveProgress::Scanned { file_type, matches } => {
            pb.set_message(format!("{file_type}: {matches} signatures"));
        }
        CarveProgress::Extracting {
            file_type,
            current,
            total,
        } => {
            pb.set_message(format!("Extracting {file_type} {current}/{total}"));
        }
        CarveProgress::Done => {}
    }
}

/// `sawmill carve`
pub fn run_carve(args: &CarveArgs, config: &Config) -> Result<()> {
    let (catalog, mut options) = resolve_options(config, &args.source, &args.engine)?;
    options.output_dir = args.output.clone();
    options.dry_run = args.dry_run;
    if let Some(pairing) = args.pairing {
        options.pairing = pairing.into();
    }

    let carver = Carver::new(&catalog, options).context("Invalid carve configuration")?;

    let pb = spinner("Carving...")?;
    let report = carver
        .carve_with_progress(|p| on_progress(&pb, p))
        .with_context(|| format!("Failed to carve {}", args.source.display()));
    pb.finish_and_clear();
    let report = report?;

    match args.output_format {
        OutputFormat::Human => print!("{}", format_carve_report(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    let failed = report.failed_types();
    if !failed.is_empty() {
        anyhow::bail!("{} file type(s) failed to scan: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

/// `sawmill scan`
pub fn run_scan(args: &ScanArgs, config: &Config) -> Result<()> {
    let (catalog, options) = resolve_options(config, &args.source, &args.engine)?;
    let carver = Carver::new(&catalog, options).context("Invalid scan configuration")?;

    let pb = spinner("Scanning...")?;
    let report = carver
        .scan_with_progress(|p| on_progress(&pb, p))
        .with_context(|| format!("Failed to scan {}", args.source.display()));
    pb.finish_and_clear();
    let report = report?;

    match args.output_format {
        OutputFormat::Human => print!("{}", format_scan_report(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// `sawmill signatures`
pub fn run_signatures(args: &SignaturesArgs, config: &Config) -> Result<()> {
    let catalog = load_catalog(config, args.catalog.as_deref())?;

    match args.output_format {
        OutputFormat::Human => {
            println!(
                "{:<8} {:<6} {:<44} {:<28} {:>10}",
                "TYPE".bold(),
                "EXT".bold(),
                "HEADER".bold(),
                "FOOTER".bold(),
                "MAX SIZE".bold()
            );
            for sig in catalog.signatures() {
                let max = sig
                    .max_size
                    .map(|n| humansize::format_size(n, humansize::BINARY))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<8} {:<6} {:<44} {:<28} {:>10}",
                    sig.name.bright_cyan(),
                    sig.extension,
                    encode_hex_escaped(&sig.header),
                    encode_hex_escaped(&sig.footer),
                    max
                );
            }
        }
        OutputFormat::Json => {
            let records: Vec<serde_json::Value> = catalog
                .signatures()
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "extension": s.extension,
                        "header": hex::encode(&s.header),
                        "footer": hex::encode(&s.footer),
                        "max_size": s.max_size,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

/// `sawmill config`
pub fn run_config(args: &ConfigArgs, config: &Config, path: Option<&Path>) -> Result<()> {
    if args.print_sample {
        print!("{}", generate_sample_config());
        return Ok(());
    }

    if args.init {
        let path = Config::ensure_exists()?;
        println!("{} Config at {}", "✓".bright_green(), path.display());
        return Ok(());
    }

    let path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    Ok(())
}

fn status_text(status: &TypeStatus) -> &'static str {
    match status {
        TypeStatus::NoMatches => "no matches",
        TypeStatus::Unpaired => "unpaired",
        TypeStatus::Carved => "carved",
        TypeStatus::Failed { .. } => "FAILED",
    }
}

/// Status padded to `width` columns, padding applied outside the colour codes
fn status_cell(status: &TypeStatus, width: usize) -> String {
    let text = status_text(status);
    let coloured = match status {
        TypeStatus::NoMatches => text.dimmed(),
        TypeStatus::Unpaired => text.yellow(),
        TypeStatus::Carved => text.bright_green(),
        TypeStatus::Failed { .. } => text.red().bold(),
    };
    format!("{coloured}{}", " ".repeat(width.saturating_sub(text.len())))
}

/// Human-readable carve summary
pub fn format_carve_report(report: &CarveReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{} {} ({}, {}, {} pairing{})\n\n",
        "Carved".bold(),
        report.source.display(),
        humansize::format_size(report.image_size, humansize::BINARY),
        report.engine,
        report.pairing,
        if report.dry_run { ", dry run" } else { "" }
    ));

    out.push_str(&format!(
        "  {:<8} {:<12} {:>7} {:>7} {:>6} {:>7} {:>8} {:>7} {:>10}\n",
        "TYPE", "STATUS", "HEADERS", "FOOTERS", "PAIRS", "CARVED", "SKIPPED", "FAILED", "SIZE"
    ));

    for (name, t) in &report.types {
        out.push_str(&format!(
            "  {:<8} {} {:>7} {:>7} {:>6} {:>7} {:>8} {:>7} {:>10}\n",
            name,
            status_cell(&t.status, 12),
            t.headers,
            t.footers,
            t.pairs,
            t.files.len(),
            t.pairs_skipped,
            t.files_failed,
            humansize::format_size(t.bytes_carved(), humansize::BINARY)
        ));
        if let TypeStatus::Failed { error } = &t.status {
            out.push_str(&format!("    {} {}\n", "✗".red(), error));
        }
        for error in &t.errors {
            out.push_str(&format!("    {} {}\n", "⚠".yellow(), error));
        }
    }

    out.push_str(&format!(
        "\n  {} {} files, {} in {} ms\n",
        "✓".bright_green(),
        report.files_carved(),
        humansize::format_size(report.bytes_carved(), humansize::BINARY),
        report.duration_ms
    ));
    out
}

/// Human-readable match listing
pub fn format_scan_report(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{} {} ({}, {})\n",
        "Scanned".bold(),
        report.source.display(),
        humansize::format_size(report.image_size, humansize::BINARY),
        report.engine
    ));

    for (name, t) in &report.types {
        out.push_str(&format!("\n  {} ({} matches)\n", name.bright_cyan(), t.matches.len()));
        if let Some(error) = &t.error {
            out.push_str(&format!("    {} {}\n", "✗".red(), error));
        }
        for m in &t.matches {
            out.push_str(&format!(
                "    0x{:012x}  {:<6}  {}\n",
                m.offset,
                m.tag,
                hex::encode(&m.bytes)
            ));
        }
    }

    out.push_str(&format!(
        "\n  {} matches in {} ms\n",
        report.total_matches(),
        report.duration_ms
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_carve_command() {
        let cli = Cli::try_parse_from([
            "sawmill",
            "carve",
            "image.dd",
            "out",
            "--engine",
            "boyer-moore",
            "--types",
            "jpg,pdf",
            "--pairing",
            "nearest-footer",
            "-n",
            "--output-format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Carve(args) => {
                assert_eq!(args.source, PathBuf::from("image.dd"));
                assert_eq!(args.output, PathBuf::from("out"));
                assert_eq!(args.engine.engine, Some(EngineArg::BoyerMoore));
                assert_eq!(
                    args.engine.types,
                    Some(vec!["jpg".to_string(), "pdf".to_string()])
                );
                assert_eq!(args.pairing, Some(PairingArg::NearestFooter));
                assert!(args.dry_run);
                assert_eq!(args.output_format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_carve_requires_output() {
        assert!(Cli::try_parse_from(["sawmill", "carve", "image.dd"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sawmill", "scan", "image.dd", "--verbose", "--json-logs"])
            .unwrap();
        assert!(cli.verbose);
        assert!(cli.json_logs);
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.scan.buffer_size = 4096;
        config.scan.workers = 2;

        let args = EngineArgs {
            engine: Some(EngineArg::BoyerMoore),
            workers: Some(8),
            ..Default::default()
        };
        let (catalog, options) = resolve_options(&config, Path::new("image.dd"), &args).unwrap();

        assert_eq!(catalog, Catalog::builtin().unwrap());
        assert_eq!(options.engine, EngineKind::BoyerMoore);
        assert_eq!(options.buffer_size, 4096);
        assert_eq!(options.workers, 8);
        assert_eq!(options.file_types, None);
    }

    #[test]
    fn test_catalog_flag_overrides_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sigs.toml");
        std::fs::write(
            &path,
            "[[signature]]\nname = \"pdf\"\nheader = '\\x25\\x50\\x44\\x46'\nfooter = '\\x25\\x25\\x45\\x4F\\x46'\n",
        )
        .unwrap();

        let args = EngineArgs {
            catalog: Some(path),
            ..Default::default()
        };
        let (catalog, _) = resolve_options(&Config::default(), Path::new("x"), &args).unwrap();
        assert_eq!(catalog.names(), vec!["pdf".to_string()]);
    }

    #[test]
    fn test_carve_report_lists_every_type() {
        let dir = TempDir::new().unwrap();
        let mut data = vec![0u8; 1024];
        data[100..103].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        data[500..502].copy_from_slice(&[0xFF, 0xD9]);
        let source = dir.path().join("image.dd");
        std::fs::write(&source, &data).unwrap();

        let options = CarveOptions {
            source,
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        let report = Carver::new(&Catalog::builtin().unwrap(), options)
            .unwrap()
            .carve()
            .unwrap();

        colored::control::set_override(false);
        let text = format_carve_report(&report);
        assert!(text.contains("jpg"));
        assert!(text.contains("carved"));
        assert!(text.contains("no matches"));
        assert!(text.contains("1 files"));
    }
}
