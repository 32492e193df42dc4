//! Suffix-selected streaming compression.
//!
//! Codec choice is an ordered dispatch table over the destination file
//! name, first match wins; no match means identity. Standard output is
//! never compressed.

use crate::config::Destination;
use bzip2::write::BzEncoder;
use flate2::write::{DeflateEncoder, GzEncoder};
use std::io::{self, Write};

/// Ordered suffix dispatch rules, evaluated first-match-wins.
const RULES: &[(&str, Codec)] = &[
    (".deflate", Codec::Deflate),
    (".gz", Codec::Gzip),
    (".bz2", Codec::Bzip2),
];

/// A streaming compression choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Raw deflate (RFC 1951, no container framing).
    Deflate,
    /// Gzip.
    Gzip,
    /// Bzip2.
    Bzip2,
    /// No transformation.
    #[default]
    Identity,
}

impl Codec {
    /// Selects the codec for a destination.
    ///
    /// Standard output never compresses regardless of any notional name.
    #[must_use]
    pub fn for_destination(destination: &Destination) -> Self {
        destination.file_name().map_or(Self::Identity, Self::for_file_name)
    }

    /// Selects the codec for a file name by suffix.
    ///
    /// Unknown suffixes are not an error; they select identity.
    #[must_use]
    pub fn for_file_name(name: &str) -> Self {
        RULES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map_or(Self::Identity, |(_, codec)| *codec)
    }

    /// Returns a short display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Deflate => "deflate",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Identity => "none",
        }
    }

    /// Wraps a sink in this codec's compressing writer.
    pub fn wrap<W: Write>(self, sink: W) -> CodecWriter<W> {
        match self {
            Self::Deflate => {
                CodecWriter::Deflate(DeflateEncoder::new(sink, flate2::Compression::default()))
            }
            Self::Gzip => CodecWriter::Gzip(GzEncoder::new(sink, flate2::Compression::default())),
            Self::Bzip2 => CodecWriter::Bzip2(BzEncoder::new(sink, bzip2::Compression::default())),
            Self::Identity => CodecWriter::Identity(sink),
        }
    }
}

/// A writer transformed by a [`Codec`].
///
/// [`CodecWriter::finish`] finalizes trailing compressor bytes (for
/// example the gzip trailer) and hands the inner sink back; it must run
/// before byte counts or digests are read.
pub enum CodecWriter<W: Write> {
    /// Untransformed pass-through.
    Identity(W),
    /// Raw deflate stream.
    Deflate(DeflateEncoder<W>),
    /// Gzip stream.
    Gzip(GzEncoder<W>),
    /// Bzip2 stream.
    Bzip2(BzEncoder<W>),
}

impl<W: Write> CodecWriter<W> {
    /// Finalizes the compressed stream and returns the inner sink.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if finalization fails.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Identity(w) => Ok(w),
            Self::Deflate(encoder) => encoder.finish(),
            Self::Gzip(encoder) => encoder.finish(),
            Self::Bzip2(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for CodecWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Identity(w) => w.write(buf),
            Self::Deflate(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
            Self::Bzip2(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Identity(w) => w.flush(),
            Self::Deflate(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
            Self::Bzip2(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;
    use test_case::test_case;

    #[test_case("out.csv.deflate", Codec::Deflate; "deflate suffix")]
    #[test_case("out.csv.gz", Codec::Gzip; "gzip suffix")]
    #[test_case("out.csv.bz2", Codec::Bzip2; "bzip2 suffix")]
    #[test_case("out.csv", Codec::Identity; "plain csv")]
    #[test_case("out.txt", Codec::Identity; "unknown suffix is not an error")]
    #[test_case("gz", Codec::Identity; "suffix requires the dot")]
    fn test_suffix_dispatch(name: &str, expected: Codec) {
        assert_eq!(Codec::for_file_name(name), expected);
        assert_eq!(
            Codec::for_destination(&Destination::File(PathBuf::from(name))),
            expected
        );
    }

    #[test]
    fn test_stdout_never_compresses() {
        assert_eq!(Codec::for_destination(&Destination::Stdout), Codec::Identity);
    }

    #[test]
    fn test_gzip_round_trip() {
        let mut writer = Codec::Gzip.wrap(Vec::new());
        writer.write_all(b"hello,world\n").unwrap();
        let compressed = writer.finish().unwrap();

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, b"hello,world\n");
    }

    #[test]
    fn test_deflate_is_raw() {
        let mut writer = Codec::Deflate.wrap(Vec::new());
        writer.write_all(b"raw deflate body").unwrap();
        let compressed = writer.finish().unwrap();

        // Raw deflate has no container framing, so only a raw decoder
        // accepts it.
        let mut decoder = flate2::read::DeflateDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, b"raw deflate body");
    }

    #[test]
    fn test_bzip2_round_trip() {
        let mut writer = Codec::Bzip2.wrap(Vec::new());
        writer.write_all(b"foo,bar\na,b\n").unwrap();
        let compressed = writer.finish().unwrap();

        let mut decoder = bzip2::read::BzDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, b"foo,bar\na,b\n");
    }

    #[test]
    fn test_identity_passes_through() {
        let mut writer = Codec::Identity.wrap(Vec::new());
        writer.write_all(b"untouched").unwrap();
        assert_eq!(writer.finish().unwrap(), b"untouched");
    }
}
