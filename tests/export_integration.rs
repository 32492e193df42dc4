//! End-to-end pipeline tests against a temporary `SQLite` database.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use rowport::config::{
    Destination, Driver, EncoderConfig, ExportConfig, FormatterConfig, SinkConfig, SourceConfig,
    TimestampFormat, Timezone, WriteMode,
};
use rowport::pipeline::ExportPipeline;
use rowport::sink::DigestAlgorithm;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Builds a run configuration with the crate defaults: header on,
/// quote-all on, checksum on with SHA-256.
fn config_for(statement: &str, out: &Path) -> ExportConfig {
    ExportConfig {
        source: SourceConfig {
            driver: Driver::Sqlite,
            url: ":memory:".to_string(),
            user: String::new(),
            password: None,
        },
        statement: statement.to_string(),
        formatter: FormatterConfig::default(),
        encoder: EncoderConfig::default(),
        sink: SinkConfig {
            destination: Destination::File(out.to_path_buf()),
            write_mode: WriteMode::Truncate,
            text_encoding: "utf-8".to_string(),
            digest_algorithm: Some(DigestAlgorithm::Sha256),
        },
        flush_interval: 0,
    }
}

/// Creates a populated database file and returns its path.
fn seeded_database(dir: &Path) -> std::path::PathBuf {
    let db_path = dir.join("source.db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "create table events (
             id INTEGER,
             flag BOOLEAN,
             seen TIMESTAMP,
             tags TEXT_ARRAY,
             note TEXT
         );
         insert into events values
             (1, 1, '2024-05-01 10:30:00', '[1,[2,3]]', 'plain'),
             (2, 0, '2024-06-02 08:15:00', '[]', null);",
    )
    .unwrap();
    db_path
}

#[test]
fn default_config_exports_quoted_header_and_row() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let config = config_for("select 'foo bar' as TEST", &out);
    let report = ExportPipeline::new(config).run().unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content, "\"TEST\"\n\"foo bar\"\n");
    assert_eq!(report.rows_written, 1);
    assert_eq!(report.bytes_written, content.len() as u64);

    // The sibling artifact carries the digest of the artifact bytes.
    let checksum = std::fs::read_to_string(dir.path().join("out.csv.sha256")).unwrap();
    assert_eq!(checksum, hex::encode(Sha256::digest(content.as_bytes())));
    assert_eq!(report.checksum_hex.unwrap(), checksum);
}

#[test]
fn header_off_with_flush_interval_one() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let mut config = config_for("select 'foo bar' as TEST", &out);
    config.encoder.include_header = false;
    config.flush_interval = 1;

    let report = ExportPipeline::new(config).run().unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content, "\"foo bar\"\n");
    assert_eq!(report.rows_written, 1);

    let checksum = std::fs::read_to_string(dir.path().join("out.csv.sha256")).unwrap();
    assert_eq!(checksum, hex::encode(Sha256::digest(content.as_bytes())));
}

#[test]
fn gzip_artifact_checksums_compressed_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let plain_out = dir.path().join("plain.csv");
    let gz_out = dir.path().join("out.csv.gz");

    let statement = "select 'foo bar' as TEST";
    ExportPipeline::new(config_for(statement, &plain_out))
        .run()
        .unwrap();
    ExportPipeline::new(config_for(statement, &gz_out))
        .run()
        .unwrap();

    let plain_bytes = std::fs::read(&plain_out).unwrap();
    let gz_bytes = std::fs::read(&gz_out).unwrap();

    // Decompressed content matches the uncompressed scenario byte for byte.
    let mut decoder = flate2::read::GzDecoder::new(gz_bytes.as_slice());
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed).unwrap();
    assert_eq!(decompressed, plain_bytes);

    // The checksum covers the compressed artifact, not the content.
    let checksum = std::fs::read_to_string(dir.path().join("out.csv.gz.sha256")).unwrap();
    assert_eq!(checksum, hex::encode(Sha256::digest(&gz_bytes)));
    assert_ne!(checksum, hex::encode(Sha256::digest(&decompressed)));
}

#[test]
fn bzip2_artifact_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv.bz2");

    ExportPipeline::new(config_for("select 'foo bar' as TEST", &out))
        .run()
        .unwrap();

    let artifact = std::fs::read(&out).unwrap();
    let mut decoder = bzip2::read::BzDecoder::new(artifact.as_slice());
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed).unwrap();
    assert_eq!(decompressed, b"\"TEST\"\n\"foo bar\"\n");

    let checksum = std::fs::read_to_string(dir.path().join("out.csv.bz2.sha256")).unwrap();
    assert_eq!(checksum, hex::encode(Sha256::digest(&artifact)));
}

#[test]
fn typed_columns_format_through_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seeded_database(dir.path());
    let out = dir.path().join("out.csv");

    let mut config = config_for("select id, flag, seen, tags, note from events order by id", &out);
    config.source.url = db_path.display().to_string();
    config.encoder.quote_all_columns = false;
    config.formatter = FormatterConfig {
        null_replacement: Some("NA".to_string()),
        boolean_as_int: true,
        array_in_square_brackets: true,
        timestamp_format: Some(TimestampFormat::new("%Y/%m/%d", Timezone::Utc).unwrap()),
    };

    let report = ExportPipeline::new(config).run().unwrap();
    assert_eq!(report.rows_written, 2);

    let content = std::fs::read_to_string(&out).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("id,flag,seen,tags,note"));
    // Bracketed arrays are quoted so they never read ambiguously.
    assert_eq!(lines.next(), Some("1,1,2024/05/01,\"[1,[2,3]]\",plain"));
    assert_eq!(lines.next(), Some("2,0,2024/06/02,\"[]\",NA"));
    assert_eq!(lines.next(), None);
}

#[test]
fn statement_resolves_from_file_reference() {
    let dir = tempfile::tempdir().unwrap();
    let sql_path = dir.path().join("query.sql");
    std::fs::write(&sql_path, "select 'resolved' as SRC").unwrap();
    let out = dir.path().join("out.csv");

    let config = config_for(&format!("file:{}", sql_path.display()), &out);
    ExportPipeline::new(config).run().unwrap();

    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "\"SRC\"\n\"resolved\"\n"
    );
}

#[test]
fn create_new_mode_refuses_existing_destination() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");
    std::fs::write(&out, "already here").unwrap();

    let mut config = config_for("select 1 as N", &out);
    config.sink.write_mode = WriteMode::CreateNew;

    let err = ExportPipeline::new(config).run().unwrap_err();
    assert!(matches!(err, rowport::Error::Io { .. }));

    // The destination is untouched and no checksum artifact appears.
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "already here");
    assert!(!dir.path().join("out.csv.sha256").exists());
}

#[test]
fn failed_query_leaves_no_checksum_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let config = config_for("select broken from nowhere", &out);
    let err = ExportPipeline::new(config).run().unwrap_err();
    assert!(matches!(err, rowport::Error::Query { .. }));
    assert!(!dir.path().join("out.csv.sha256").exists());
}

#[test]
fn checksum_disabled_emits_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let mut config = config_for("select 'foo bar' as TEST", &out);
    config.sink.digest_algorithm = None;

    let report = ExportPipeline::new(config).run().unwrap();
    assert!(report.checksum_hex.is_none());
    assert!(!dir.path().join("out.csv.sha256").exists());
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "\"TEST\"\n\"foo bar\"\n"
    );
}

#[test]
fn sha512_selects_its_own_artifact_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let mut config = config_for("select 'x' as C", &out);
    config.sink.digest_algorithm = Some(DigestAlgorithm::Sha512);

    ExportPipeline::new(config).run().unwrap();

    let artifact = dir.path().join("out.csv.sha512");
    assert!(artifact.exists());
    let checksum = std::fs::read_to_string(artifact).unwrap();
    assert_eq!(checksum.len(), 128);

    let content = std::fs::read(&out).unwrap();
    assert_eq!(
        checksum,
        hex::encode(sha2::Sha512::digest(content.as_slice()))
    );
}

#[test]
fn flush_checkpoints_do_not_change_the_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seeded_database(dir.path());

    let flushed_out = dir.path().join("flushed.csv");
    let unflushed_out = dir.path().join("unflushed.csv");

    let statement = "select id, note from events order by id";
    let mut flushed = config_for(statement, &flushed_out);
    flushed.source.url = db_path.display().to_string();
    flushed.flush_interval = 1;
    let mut unflushed = config_for(statement, &unflushed_out);
    unflushed.source.url = db_path.display().to_string();

    let flushed_report = ExportPipeline::new(flushed).run().unwrap();
    let unflushed_report = ExportPipeline::new(unflushed).run().unwrap();

    assert_eq!(
        std::fs::read(&flushed_out).unwrap(),
        std::fs::read(&unflushed_out).unwrap()
    );
    assert_eq!(flushed_report.checksum_hex, unflushed_report.checksum_hex);
}
