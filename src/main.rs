//! Binary entry point for rowport.
//!
//! Parses the command line, layers it over the optional configuration
//! file, and hands one immutable [`ExportConfig`] to the pipeline.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for the assemble step; the Cli is consumed
#![allow(clippy::needless_pass_by_value)]

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use rowport::config::{
    Destination, Driver, EncoderConfig, ExportConfig, FileConfig, FormatterConfig, SinkConfig,
    SourceConfig, TimestampFormat, Timezone, WriteMode, parse_single_char, unescape_terminator,
};
use rowport::pipeline::{ExportPipeline, ExportReport};
use rowport::sink::DigestAlgorithm;
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;

/// Default statement, mirroring a quick connectivity probe.
const DEFAULT_STATEMENT: &str = "select datetime('now') as \"time\"";

/// Rowport - stream a SQL result set to delimited text.
#[derive(Parser)]
#[command(name = "rowport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data source driver name.
    #[arg(short = 'j', long, env = "ROWPORT_DRIVER")]
    driver: Option<String>,

    /// Connection URL (a file path or `:memory:` for SQLite).
    #[arg(short = 'u', long, env = "ROWPORT_URL")]
    url: Option<String>,

    /// Login user.
    #[arg(short = 'l', long, env = "ROWPORT_USER")]
    user: Option<String>,

    /// Login password; may be a `file:` or `cp:` reference.
    #[arg(short = 'p', long = "pass", env = "ROWPORT_PASS", hide_env_values = true)]
    pass: Option<String>,

    /// SQL statement; may be a `file:` or `cp:` reference.
    #[arg(short = 's', long)]
    statement: Option<String>,

    /// Output destination path, or `-` for standard output.
    #[arg(short = 'o', long)]
    out: Option<String>,

    /// File write mode: create, truncate-existing or create-new.
    #[arg(short = 'w', long)]
    write: Option<String>,

    /// Output text encoding.
    #[arg(short = 'e', long)]
    encoding: Option<String>,

    /// Column delimiter character.
    #[arg(short = 'd', long)]
    delimiter: Option<String>,

    /// Column quote character.
    #[arg(short = 'q', long)]
    quote: Option<String>,

    /// Escape character applied inside quoted columns.
    #[arg(short = 'x', long)]
    escape: Option<String>,

    /// Line terminator (supports `\n` escapes).
    #[arg(short = 't', long)]
    terminator: Option<String>,

    /// Include the header row.
    #[arg(long, value_name = "BOOL")]
    header: Option<bool>,

    /// Replacement text for NULL values.
    #[arg(long)]
    null_value: Option<String>,

    /// Timestamp strftime pattern.
    #[arg(long)]
    timestamp_format: Option<String>,

    /// Timezone for timestamp rendering: utc, local or a fixed offset.
    #[arg(long)]
    timezone: Option<String>,

    /// Render booleans as 1 / 0.
    #[arg(long)]
    bool_as_int: bool,

    /// Render arrays recursively wrapped in square brackets.
    #[arg(long)]
    array_brackets: bool,

    /// Quote every column regardless of content.
    #[arg(long, value_name = "BOOL")]
    quote_all: Option<bool>,

    /// Flush every N rows (0 disables flush checkpoints).
    #[arg(short = 'f', long)]
    flush: Option<u64>,

    /// Generate a checksum artifact.
    #[arg(short = 'c', long, value_name = "BOOL")]
    checksum: Option<bool>,

    /// Checksum digest algorithm.
    #[arg(short = 'a', long)]
    algorithm: Option<String>,

    /// Path to a configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Print shell completions and exit.
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

/// Main entry point.
fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        print_completions(shell);
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose);

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration and executes the export.
fn run(cli: Cli) -> anyhow::Result<ExportReport> {
    let file = FileConfig::load(cli.config.as_deref()).context("loading configuration file")?;
    let config = assemble(cli, file)?;
    let report = ExportPipeline::new(config).run()?;
    Ok(report)
}

/// Merges command-line flags over file-config values over defaults into
/// one immutable run configuration.
fn assemble(cli: Cli, file: FileConfig) -> anyhow::Result<ExportConfig> {
    let file_source = file.source.unwrap_or_default();
    let csv = file.csv.unwrap_or_default();
    let output = file.output.unwrap_or_default();

    let driver: Driver = cli
        .driver
        .or(file_source.driver)
        .as_deref()
        .unwrap_or("sqlite")
        .parse()?;
    let source = SourceConfig {
        driver,
        url: cli
            .url
            .or(file_source.url)
            .unwrap_or_else(|| ":memory:".to_string()),
        user: cli.user.or(file_source.user).unwrap_or_default(),
        password: cli.pass.map(SecretString::from),
    };

    let statement = cli
        .statement
        .unwrap_or_else(|| DEFAULT_STATEMENT.to_string());

    let timezone: Timezone = cli
        .timezone
        .or(csv.timezone)
        .as_deref()
        .map(str::parse)
        .transpose()?
        .unwrap_or_default();
    let timestamp_format = cli
        .timestamp_format
        .or(csv.timestamp_format)
        .map(|pattern| TimestampFormat::new(pattern, timezone))
        .transpose()?;
    let formatter = FormatterConfig {
        null_replacement: cli.null_value.or(csv.null_value),
        boolean_as_int: cli.bool_as_int || csv.bool_as_int.unwrap_or(false),
        array_in_square_brackets: cli.array_brackets || csv.array_brackets.unwrap_or(false),
        timestamp_format,
    };

    let encoder = EncoderConfig {
        delimiter: parse_single_char(
            "delimiter",
            &cli.delimiter.or(csv.delimiter).unwrap_or_else(|| ",".to_string()),
        )?,
        quote_char: parse_single_char(
            "quote",
            &cli.quote.or(csv.quote).unwrap_or_else(|| "\"".to_string()),
        )?,
        escape_char: parse_single_char(
            "escape",
            &cli.escape.or(csv.escape).unwrap_or_else(|| "\"".to_string()),
        )?,
        line_terminator: unescape_terminator(
            &cli.terminator
                .or(csv.terminator)
                .unwrap_or_else(|| "\\n".to_string()),
        ),
        quote_all_columns: cli.quote_all.or(csv.quote_all).unwrap_or(true),
        include_header: cli.header.or(csv.header).unwrap_or(true),
    };

    let checksum = cli.checksum.or(output.checksum).unwrap_or(true);
    let algorithm: DigestAlgorithm = cli
        .algorithm
        .or(output.algorithm)
        .as_deref()
        .unwrap_or("SHA-256")
        .parse()?;
    let write_mode: WriteMode = cli
        .write
        .or(output.write_mode)
        .as_deref()
        .unwrap_or("truncate-existing")
        .parse()?;
    let sink = SinkConfig {
        destination: Destination::parse(cli.out.as_deref().unwrap_or("-")),
        write_mode,
        text_encoding: cli
            .encoding
            .or(output.encoding)
            .unwrap_or_else(|| "utf-8".to_string()),
        digest_algorithm: checksum.then_some(algorithm),
    };
    // Surface encoding problems before the pipeline starts.
    sink.validate()?;

    Ok(ExportConfig {
        source,
        statement,
        formatter,
        encoder,
        sink,
        flush_interval: cli.flush.or(output.flush).unwrap_or(0),
    })
}

/// Initializes tracing output on stderr; stdout may carry data.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "rowport=debug" } else { "rowport=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints completions for the requested shell.
fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
