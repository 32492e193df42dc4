//! # Rowport
//!
//! Executes a single parameterless SQL query against a relational data
//! source and streams the result set to a delimited text sink.
//!
//! The output pipeline composes, in a fixed order, an optional streaming
//! compressor, a byte counter, and an optional content digest around the
//! underlying sink, so the emitted checksum always covers exactly the bytes
//! that land in the artifact. Extracts are reproducible byte-for-byte and
//! independently verifiable by re-hashing the artifact.
//!
//! ## Features
//!
//! - Streaming row-by-row export (rows are never materialized)
//! - Configurable value formatting (null replacement, boolean-as-int,
//!   bracketed arrays, timestamp patterns with timezone)
//! - Configurable delimited encoding (delimiter, quote, escape, terminator,
//!   quote-all, header row)
//! - Suffix-selected compression (`.deflate`, `.gz`, `.bz2`)
//! - Incremental SHA-2 digest with a sibling checksum artifact
//! - Periodic flush checkpoints every N rows
//!
//! ## Example
//!
//! ```rust,ignore
//! use rowport::pipeline::ExportPipeline;
//!
//! let report = ExportPipeline::new(config).run()?;
//! eprintln!("{} rows, {} bytes", report.rows_written, report.bytes_written);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod encode;
pub mod format;
pub mod pipeline;
pub mod resolve;
pub mod sink;
pub mod source;

// Re-exports for convenience
pub use config::{
    Destination, Driver, EncoderConfig, ExportConfig, FormatterConfig, SinkConfig, SourceConfig,
    WriteMode,
};
pub use encode::DelimitedEncoder;
pub use format::{FormattedField, ValueFormatter};
pub use pipeline::{ExportPipeline, ExportReport, should_flush};
pub use sink::{Codec, DigestAlgorithm, SinkStack};
pub use source::{Column, Cursor, SqlType, Value};

/// Error type for rowport operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait
/// implementations. Each variant carries enough context (phase plus
/// underlying cause) to diagnose a failed run.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Configuration` | Unknown driver or digest algorithm, malformed timestamp pattern, unsupported encoding, unresolvable resource reference |
/// | `Connection` | Data source cannot be opened or rejects credentials |
/// | `Query` | Statement fails to prepare or execute, cursor advance fails |
/// | `Io` | Sink cannot be opened or written, compressor failure, flush failure |
/// | `Format` | A cell cannot be rendered per its declared column type |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The run configuration is invalid.
    ///
    /// Raised before the pipeline leaves the `Idle` state: unknown driver
    /// names, unknown digest algorithms, malformed timestamp patterns,
    /// unsupported text encodings, or a `classpath:` reference that matches
    /// nothing on the resource search path.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The data source connection could not be established.
    #[error("connection to '{url}' failed: {cause}")]
    Connection {
        /// The connection URL (never includes the credential).
        url: String,
        /// The underlying cause.
        cause: String,
    },

    /// The statement failed to execute or the cursor failed to advance.
    #[error("query failed: {cause}")]
    Query {
        /// The underlying cause.
        cause: String,
    },

    /// An I/O operation on the sink stack failed.
    #[error("I/O failure during {operation}: {cause}")]
    Io {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A value could not be rendered for its declared column type.
    ///
    /// This is a data boundary error, not a recoverable condition: the cell
    /// contents contradict what the column metadata reports (for example an
    /// array-typed column carrying text that is not a JSON array).
    #[error("cannot render column '{column}': {cause}")]
    Format {
        /// The column label.
        column: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::Io`] from an operation name and an I/O error.
    pub(crate) fn io(operation: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            cause: err.to_string(),
        }
    }
}

/// Result type alias for rowport operations.
pub type Result<T> = std::result::Result<T, Error>;
