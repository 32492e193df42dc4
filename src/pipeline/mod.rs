//! Export pipeline orchestration.
//!
//! [`ExportPipeline`] drives one run through its states:
//! `Idle → Connected → Executing → Streaming → Finalizing → Done`, with
//! failure reachable from any non-terminal state. The run is
//! single-threaded and strictly sequential; every resource (connection,
//! statement, cursor, sink layer) is scoped so drop order releases it in
//! reverse acquisition order on every exit path.

use crate::config::{Destination, ExportConfig};
use crate::encode::DelimitedEncoder;
use crate::format::ValueFormatter;
use crate::resolve::resolve_text;
use crate::sink::SinkStack;
use crate::source::{Column, Cursor, SqliteConnection};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// The terminal state of one successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Data rows written (the header row is not counted).
    pub rows_written: u64,
    /// Bytes that reached the underlying sink, post-compression.
    pub bytes_written: u64,
    /// Lowercase hex digest of the artifact bytes, when requested.
    pub checksum_hex: Option<String>,
}

/// Whether a flush checkpoint fires after `rows` rows with the given
/// interval.
///
/// An interval of `0` disables checkpoints entirely.
#[must_use]
pub const fn should_flush(rows: u64, interval: u64) -> bool {
    interval > 0 && rows % interval == 0
}

/// Orchestrates one export run.
pub struct ExportPipeline {
    config: ExportConfig,
}

impl ExportPipeline {
    /// Creates a pipeline over an immutable run configuration.
    #[must_use]
    pub const fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Executes the run.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered, tagged with the phase it
    /// surfaced from; open resources are released before returning.
    pub fn run(&self) -> Result<ExportReport> {
        // Idle → Connected: resolve the credential, open the connection.
        let credential = self
            .config
            .source
            .password
            .as_ref()
            .map(|secret| resolve_text(secret.expose_secret()))
            .transpose()?
            .map(SecretString::from);

        info!(
            url = %self.config.source.url,
            user = %self.config.source.user,
            driver = self.config.source.driver.name(),
            "connecting"
        );
        let connection = SqliteConnection::connect(&self.config.source, credential)?;

        // Connected → Executing: resolve the query, obtain column metadata.
        let sql = resolve_text(&self.config.statement)?;
        let mut statement = connection.prepare(&sql)?;
        let columns = statement.columns().to_vec();

        // Executing → Streaming: compose the sink stack, open the cursor.
        let destination = match &self.config.sink.destination {
            Destination::File(path) => path.display().to_string(),
            Destination::Stdout => "-".to_string(),
        };
        info!(
            destination = %destination,
            mode = self.config.sink.write_mode.name(),
            encoding = %self.config.sink.text_encoding,
            "writing"
        );
        let sink = SinkStack::open(&self.config.sink)?;
        let mut cursor = statement.cursor()?;

        let report = self.stream(&mut cursor, &columns, sink)?;

        // Finalizing → Done: emit the checksum artifact.
        if let Some(checksum) = &report.checksum_hex {
            self.emit_checksum(checksum)?;
        }
        info!(
            rows = report.rows_written,
            bytes = report.bytes_written,
            "finished output"
        );
        Ok(report)
    }

    /// The streaming loop: format, encode, write, flush on cadence, then
    /// finalize the sink.
    ///
    /// A row is fully formatted before any byte of it is encoded, so no
    /// partial row is ever written.
    fn stream(
        &self,
        cursor: &mut dyn Cursor,
        columns: &[Column],
        mut sink: SinkStack,
    ) -> Result<ExportReport> {
        let formatter = ValueFormatter::new(self.config.formatter.clone());
        let encoder = DelimitedEncoder::new(
            self.config.encoder.clone(),
            self.config.formatter.null_replacement.clone(),
        );

        if self.config.encoder.include_header {
            let header = encoder.encode_header(columns);
            sink.write_all(header.as_bytes())
                .map_err(|e| Error::io("write_header", &e))?;
        }

        let mut rows: u64 = 0;
        let mut fields = Vec::with_capacity(columns.len());
        while let Some(row) = cursor.next_row()? {
            fields.clear();
            for (value, column) in row.iter().zip(columns) {
                fields.push(formatter.format(value, column));
            }

            let line = encoder.encode_row(&fields);
            sink.write_all(line.as_bytes())
                .map_err(|e| Error::io("write_row", &e))?;
            rows += 1;

            if should_flush(rows, self.config.flush_interval) {
                sink.flush_all()
                    .map_err(|e| Error::io("flush_checkpoint", &e))?;
                info!(rows, bytes = sink.bytes_written(), "flush checkpoint");
            }
        }

        let (bytes_written, digest) = sink.finish()?;
        Ok(ExportReport {
            rows_written: rows,
            bytes_written,
            checksum_hex: digest.map(hex::encode),
        })
    }

    /// Writes the checksum artifact next to the destination, or prints the
    /// digest line when the destination is standard output.
    ///
    /// Runs only after a fully successful finalize, so the artifact's
    /// absence is itself a reliable failure signal.
    fn emit_checksum(&self, checksum: &str) -> Result<()> {
        let Some(algorithm) = self.config.sink.digest_algorithm else {
            return Ok(());
        };

        match &self.config.sink.destination {
            Destination::Stdout => {
                let mut stdout = std::io::stdout();
                writeln!(stdout, "{checksum}").map_err(|e| Error::io("write_checksum", &e))?;
            }
            Destination::File(path) => {
                let artifact = PathBuf::from(format!(
                    "{}.{}",
                    path.display(),
                    algorithm.artifact_suffix()
                ));
                let mut file = self
                    .config
                    .sink
                    .write_mode
                    .open(&artifact)
                    .map_err(|e| Error::io(format!("open '{}'", artifact.display()), &e))?;
                file.write_all(checksum.as_bytes())
                    .map_err(|e| Error::io("write_checksum", &e))?;
                info!(artifact = %artifact.display(), checksum, "generated checksum");
            }
        }
        Ok(())
    }
}
