//! The layered output sink.
//!
//! [`SinkStack`] composes, innermost to outermost, the raw byte sink, a
//! digesting wrapper, a counting wrapper, the suffix-selected compressing
//! wrapper, and a write buffer the encoder writes into. Bytes therefore
//! flow encoder → compressor → counter → digest → sink, so the byte count
//! and the digest cover exactly the bytes that land in the artifact: a
//! user can re-hash the produced file independently and get the same
//! value.
//!
//! Layer release is by ownership: [`SinkStack::finish`] consumes the stack
//! and finalizes the compressor (trailer bytes included) before the final
//! count and digest are read; on error paths drop order releases the
//! layers innermost-last.

mod codec;
mod digest;

pub use codec::{Codec, CodecWriter};
pub use digest::DigestAlgorithm;

use crate::config::{Destination, SinkConfig};
use crate::{Error, Result};
use sha2::digest::DynDigest;
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The ultimate byte destination.
type RawSink = Box<dyn Write + Send>;

/// Digest state shared between the writing layer and the stack's
/// accessors; the compressor layer type-erases any path to the inner
/// writers, so observation goes through this handle instead.
type SharedDigest = Arc<Mutex<Box<dyn DynDigest + Send>>>;

/// Acquires a mutex, recovering the guard if a panic poisoned it.
fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Updates a running digest with every byte passed through.
///
/// With no digest configured this is a no-op pass-through, so checksum
/// generation toggles without restructuring the stack.
struct DigestWriter<W: Write> {
    inner: W,
    digest: Option<SharedDigest>,
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if let Some(digest) = &self.digest {
            acquire(digest).update(&buf[..written]);
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Counts every byte passed through.
struct CountingWriter<W: Write> {
    inner: W,
    count: Arc<AtomicU64>,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count.fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// The composed writable sink with live progress accessors.
pub struct SinkStack {
    writer: BufWriter<CodecWriter<CountingWriter<DigestWriter<RawSink>>>>,
    bytes: Arc<AtomicU64>,
    digest: Option<SharedDigest>,
}

impl fmt::Debug for SinkStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkStack")
            .field("bytes", &self.bytes)
            .field("digest", &self.digest.is_some())
            .finish_non_exhaustive()
    }
}

impl SinkStack {
    /// Opens the sink and composes the wrapper layers.
    ///
    /// The codec is selected once here, from the destination's file name;
    /// a stdout destination never compresses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unsupported text encoding
    /// or [`Error::Io`] if the destination cannot be opened.
    pub fn open(config: &SinkConfig) -> Result<Self> {
        config.validate()?;

        let raw: RawSink = match &config.destination {
            Destination::Stdout => Box::new(io::stdout()),
            Destination::File(path) => {
                let file = config
                    .write_mode
                    .open(path)
                    .map_err(|e| Error::io(format!("open '{}'", path.display()), &e))?;
                Box::new(file)
            }
        };

        let digest = config
            .digest_algorithm
            .map(|algorithm| Arc::new(Mutex::new(algorithm.hasher())));
        let bytes = Arc::new(AtomicU64::new(0));

        let digesting = DigestWriter {
            inner: raw,
            digest: digest.clone(),
        };
        let counting = CountingWriter {
            inner: digesting,
            count: Arc::clone(&bytes),
        };
        let codec = Codec::for_destination(&config.destination);
        tracing::debug!(codec = codec.name(), "sink stack composed");

        Ok(Self {
            writer: BufWriter::new(codec.wrap(counting)),
            bytes,
            digest,
        })
    }

    /// Bytes written to the underlying sink so far (post-compression).
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Snapshot of the running digest, if one is configured.
    ///
    /// Only covers bytes already flushed through the compressor; the
    /// value is final only after [`SinkStack::finish`].
    #[must_use]
    pub fn digest_so_far(&self) -> Option<Vec<u8>> {
        self.digest
            .as_ref()
            .map(|digest| acquire(digest).box_clone().finalize().to_vec())
    }

    /// Flushes every buffered layer down to the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn flush_all(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Releases the stack in reverse construction order: flushes the
    /// buffer, finalizes the compressor, flushes the inner layers, and
    /// returns the final byte count and digest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if any layer fails to flush or finalize.
    pub fn finish(self) -> Result<(u64, Option<Vec<u8>>)> {
        let codec = self
            .writer
            .into_inner()
            .map_err(|e| Error::io("flush_sink_buffer", &e.into_error()))?;
        let mut counting = codec
            .finish()
            .map_err(|e| Error::io("finalize_compressor", &e))?;
        counting
            .flush()
            .map_err(|e| Error::io("flush_sink", &e))?;

        let bytes = self.bytes.load(Ordering::Relaxed);
        let digest = self
            .digest
            .as_ref()
            .map(|digest| acquire(digest).finalize_reset().to_vec());
        Ok((bytes, digest))
    }
}

impl Write for SinkStack {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
