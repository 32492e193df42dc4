//! Configuration management.
//!
//! One immutable [`ExportConfig`] is assembled before the pipeline starts
//! (CLI flags over optional TOML file values over built-in defaults) and is
//! never re-read mid-run.

use crate::sink::DigestAlgorithm;
use crate::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Registered data source drivers, checked in order.
const DRIVERS: &[(&str, Driver)] = &[("sqlite", Driver::Sqlite)];

/// Supported text encodings for the sink.
///
/// The artifact format is byte-oriented UTF-8 text; ASCII names are accepted
/// as a strict subset.
const TEXT_ENCODINGS: &[&str] = &["utf-8", "utf8", "ascii", "us-ascii"];

/// Full configuration for one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Data source settings.
    pub source: SourceConfig,
    /// SQL statement, possibly a resolvable reference (`file:`, `cp:`).
    pub statement: String,
    /// Value formatting settings.
    pub formatter: FormatterConfig,
    /// Delimited encoding settings.
    pub encoder: EncoderConfig,
    /// Sink settings. A checksum artifact is emitted when a digest
    /// algorithm is configured here.
    pub sink: SinkConfig,
    /// Flush every N rows; `0` disables flush checkpoints.
    pub flush_interval: u64,
}

/// Data source connection settings.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// The driver handling the connection URL.
    pub driver: Driver,
    /// Connection URL (a file path or `:memory:` for SQLite).
    pub url: String,
    /// Login user.
    pub user: String,
    /// Login credential, possibly a resolvable reference. Never logged.
    pub password: Option<SecretString>,
}

/// Available data source drivers.
///
/// Dispatch is an ordered registry keyed by driver name; unknown names are
/// a configuration error. Additional engines slot into [`DRIVERS`] without
/// touching the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Driver {
    /// `SQLite` via rusqlite.
    #[default]
    Sqlite,
}

impl Driver {
    /// Returns the registry name of the driver.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Driver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.to_lowercase();
        DRIVERS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, d)| *d)
            .ok_or_else(|| {
                let known: Vec<&str> = DRIVERS.iter().map(|(n, _)| *n).collect();
                Error::Configuration(format!(
                    "unknown driver '{s}' (known drivers: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Value formatting settings (the formatter's behavior lives in
/// [`crate::format`]).
#[derive(Debug, Clone, Default)]
pub struct FormatterConfig {
    /// Replacement text for absent values; `None` renders an empty field.
    pub null_replacement: Option<String>,
    /// Render booleans as `1` / `0` instead of `true` / `false`.
    pub boolean_as_int: bool,
    /// Render arrays recursively wrapped in square brackets.
    pub array_in_square_brackets: bool,
    /// Pattern-based timestamp rendering; `None` uses the canonical form.
    pub timestamp_format: Option<TimestampFormat>,
}

/// A validated timestamp pattern plus the timezone it renders in.
#[derive(Debug, Clone)]
pub struct TimestampFormat {
    pattern: String,
    timezone: Timezone,
}

impl TimestampFormat {
    /// Creates a timestamp format, validating the strftime pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the pattern contains an invalid
    /// specifier.
    pub fn new(pattern: impl Into<String>, timezone: Timezone) -> Result<Self> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(Error::Configuration(format!(
                "malformed timestamp pattern '{pattern}'"
            )));
        }
        Ok(Self { pattern, timezone })
    }

    /// Renders a timestamp with this pattern in the configured timezone.
    #[must_use]
    pub fn apply(&self, ts: &DateTime<Utc>) -> String {
        match self.timezone {
            Timezone::Utc => ts.format(&self.pattern).to_string(),
            Timezone::Local => ts.with_timezone(&Local).format(&self.pattern).to_string(),
            Timezone::Offset(offset) => {
                ts.with_timezone(&offset).format(&self.pattern).to_string()
            }
        }
    }
}

/// Timezone choice for pattern-based timestamp rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timezone {
    /// Coordinated universal time.
    Utc,
    /// The system-default timezone.
    #[default]
    Local,
    /// A fixed offset such as `+09:00`.
    Offset(FixedOffset),
}

impl FromStr for Timezone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "utc" | "z" => Ok(Self::Utc),
            "local" | "system" => Ok(Self::Local),
            _ => s.parse::<FixedOffset>().map(Self::Offset).map_err(|_| {
                Error::Configuration(format!(
                    "unknown timezone '{s}' (expected 'utc', 'local' or a fixed offset like '+09:00')"
                ))
            }),
        }
    }
}

/// Delimited encoding settings.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Column delimiter character.
    pub delimiter: char,
    /// Quote character.
    pub quote_char: char,
    /// Escape character applied inside quoted fields.
    pub escape_char: char,
    /// Line terminator appended to every encoded row.
    pub line_terminator: String,
    /// Quote every column regardless of content.
    pub quote_all_columns: bool,
    /// Emit a header row of column labels before any data row.
    pub include_header: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_char: '"',
            escape_char: '"',
            line_terminator: "\n".to_string(),
            quote_all_columns: true,
            include_header: true,
        }
    }
}

/// Sink settings.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Where the bytes go.
    pub destination: Destination,
    /// How a file destination is opened.
    pub write_mode: WriteMode,
    /// Text encoding name; validated by [`SinkConfig::validate`].
    pub text_encoding: String,
    /// Digest accumulated over the bytes reaching the sink, if requested.
    pub digest_algorithm: Option<DigestAlgorithm>,
}

impl SinkConfig {
    /// Validates settings that are not checked by construction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unsupported text encoding.
    pub fn validate(&self) -> Result<()> {
        let name = self.text_encoding.to_lowercase();
        if TEXT_ENCODINGS.contains(&name.as_str()) {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "unsupported text encoding '{}' (supported: {})",
                self.text_encoding,
                TEXT_ENCODINGS.join(", ")
            )))
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            destination: Destination::Stdout,
            write_mode: WriteMode::Truncate,
            text_encoding: "utf-8".to_string(),
            digest_algorithm: None,
        }
    }
}

/// The ultimate byte destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A file path.
    File(PathBuf),
    /// The process standard output stream (`-` on the command line).
    Stdout,
}

impl Destination {
    /// Parses a destination argument; `-` selects standard output.
    #[must_use]
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    /// Returns the destination file name, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Self::File(path) => path.file_name().and_then(|n| n.to_str()),
            Self::Stdout => None,
        }
    }

    /// Whether the destination is standard output.
    #[must_use]
    pub const fn is_stdout(&self) -> bool {
        matches!(self, Self::Stdout)
    }
}

/// How a file destination is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Create the file if missing; existing content past the written range
    /// is left in place.
    Create,
    /// Create the file if missing, truncating any existing content.
    #[default]
    Truncate,
    /// Fail if the file already exists.
    CreateNew,
}

impl WriteMode {
    /// Opens `path` for writing according to this mode.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; `CreateNew` fails with
    /// `AlreadyExists` when the destination is present.
    pub fn open(self, path: &Path) -> io::Result<File> {
        let mut opts = OpenOptions::new();
        opts.write(true);
        match self {
            Self::Create => opts.create(true),
            Self::Truncate => opts.create(true).truncate(true),
            Self::CreateNew => opts.create_new(true),
        };
        opts.open(path)
    }

    /// Returns the command-line name of the mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Truncate => "truncate-existing",
            Self::CreateNew => "create-new",
        }
    }
}

impl FromStr for WriteMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "truncate" | "truncate-existing" | "truncate_existing" => Ok(Self::Truncate),
            "create-new" | "create_new" => Ok(Self::CreateNew),
            _ => Err(Error::Configuration(format!(
                "unknown write mode '{s}' (expected create, truncate-existing or create-new)"
            ))),
        }
    }
}

/// Configuration file structure (for TOML parsing).
///
/// Every field is optional; file values sit below command-line flags and
/// above built-in defaults.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    /// Data source section.
    pub source: Option<FileSource>,
    /// Delimited text section.
    pub csv: Option<FileCsv>,
    /// Output section.
    pub output: Option<FileOutput>,
}

/// `[source]` section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct FileSource {
    /// Driver name.
    pub driver: Option<String>,
    /// Connection URL.
    pub url: Option<String>,
    /// Login user.
    pub user: Option<String>,
}

/// `[csv]` section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct FileCsv {
    /// Column delimiter (single character).
    pub delimiter: Option<String>,
    /// Quote character (single character).
    pub quote: Option<String>,
    /// Escape character (single character).
    pub escape: Option<String>,
    /// Line terminator (supports `\n` escapes).
    pub terminator: Option<String>,
    /// Header row inclusion.
    pub header: Option<bool>,
    /// Quote every column.
    pub quote_all: Option<bool>,
    /// Null replacement text.
    pub null_value: Option<String>,
    /// Timestamp pattern.
    pub timestamp_format: Option<String>,
    /// Timezone for timestamp rendering.
    pub timezone: Option<String>,
    /// Render booleans as integers.
    pub bool_as_int: Option<bool>,
    /// Render arrays in square brackets.
    pub array_brackets: Option<bool>,
}

/// `[output]` section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct FileOutput {
    /// Write mode name.
    pub write_mode: Option<String>,
    /// Text encoding name.
    pub encoding: Option<String>,
    /// Flush interval in rows.
    pub flush: Option<u64>,
    /// Checksum artifact generation.
    pub checksum: Option<bool>,
    /// Digest algorithm name.
    pub algorithm: Option<String>,
}

impl FileConfig {
    /// Loads the configuration file from `path`, or from the default
    /// location when `path` is `None`.
    ///
    /// A missing default file yields an empty configuration; an explicit
    /// path that cannot be read is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::load_default()),
        }
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Io {
            operation: "read_config_file".to_string(),
            cause: e.to_string(),
        })?;

        toml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("invalid config file: {e}")))
    }

    /// Loads configuration from the default location
    /// (`<config dir>/rowport/config.toml`), falling back to an empty
    /// configuration.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let config_path = base_dirs.config_dir().join("rowport").join("config.toml");
        if config_path.exists() {
            if let Ok(config) = Self::load_from_file(&config_path) {
                return config;
            }
        }

        Self::default()
    }
}

/// Parses a single-character option such as the delimiter.
///
/// # Errors
///
/// Returns [`Error::Configuration`] unless the value is exactly one
/// character.
pub fn parse_single_char(name: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::Configuration(format!(
            "{name} must be a single character, got '{value}'"
        ))),
    }
}

/// Expands the `\n`, `\r` and `\t` escapes a line terminator option may use.
#[must_use]
pub fn unescape_terminator(value: &str) -> String {
    value
        .replace("\\r\\n", "\r\n")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
}
