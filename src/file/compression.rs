//! Compression of whole perma files.
//!
//! The compression of a file is implied by its name suffix. Compressed files
//! wrap the complete byte stream (header and records) in a gzip or snappy
//! frame stream.

use crate::config::CompressionType;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

/// Base extension of every perma file.
pub const PERMA_EXTENSION: &str = ".perma";

const GZIP_SUFFIX: &str = ".perma.gzip";
#[cfg(feature = "snappy")]
const SNAPPY_SUFFIX: &str = ".perma.snappy";

impl CompressionType {
    /// File name suffix of files written with this compression.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            CompressionType::None => PERMA_EXTENSION,
            CompressionType::Gzip => GZIP_SUFFIX,
            #[cfg(feature = "snappy")]
            CompressionType::Snappy => SNAPPY_SUFFIX,
        }
    }

    /// Splits a file name into its stem and the compression implied by its
    /// suffix. Returns `None` if the name carries no perma suffix.
    pub fn split_file_name(file_name: &str) -> Option<(&str, CompressionType)> {
        if let Some(stem) = file_name.strip_suffix(GZIP_SUFFIX) {
            return Some((stem, CompressionType::Gzip));
        }
        #[cfg(feature = "snappy")]
        if let Some(stem) = file_name.strip_suffix(SNAPPY_SUFFIX) {
            return Some((stem, CompressionType::Snappy));
        }
        file_name.strip_suffix(PERMA_EXTENSION).map(|stem| (stem, CompressionType::None))
    }
}

/// Writer that compresses everything written through it.
pub enum CompressedWriter<W: Write> {
    /// Uncompressed passthrough.
    Plain(W),
    /// Gzip stream.
    Gzip(GzEncoder<W>),
    /// Snappy frame stream.
    #[cfg(feature = "snappy")]
    Snappy(snap::write::FrameEncoder<W>),
}

impl<W: Write> CompressedWriter<W> {
    /// Wraps `inner` with the given compression.
    pub fn new(inner: W, compression: CompressionType) -> Self {
        match compression {
            CompressionType::None => CompressedWriter::Plain(inner),
            CompressionType::Gzip => {
                CompressedWriter::Gzip(GzEncoder::new(inner, flate2::Compression::default()))
            }
            #[cfg(feature = "snappy")]
            CompressionType::Snappy => CompressedWriter::Snappy(snap::write::FrameEncoder::new(inner)),
        }
    }

    /// Writes any trailing compression data and returns the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            CompressedWriter::Plain(inner) => Ok(inner),
            CompressedWriter::Gzip(encoder) => encoder.finish(),
            #[cfg(feature = "snappy")]
            CompressedWriter::Snappy(encoder) => encoder
                .into_inner()
                .map_err(|e| io::Error::new(e.error().kind(), e.error().to_string())),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Plain(inner) => inner.write(buf),
            CompressedWriter::Gzip(encoder) => encoder.write(buf),
            #[cfg(feature = "snappy")]
            CompressedWriter::Snappy(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(inner) => inner.flush(),
            CompressedWriter::Gzip(encoder) => encoder.flush(),
            #[cfg(feature = "snappy")]
            CompressedWriter::Snappy(encoder) => encoder.flush(),
        }
    }
}

/// Wraps `input` with a decompressing reader.
pub fn decompress<'a, R: Read + 'a>(input: R, compression: CompressionType) -> Box<dyn Read + 'a> {
    match compression {
        CompressionType::None => Box::new(input),
        CompressionType::Gzip => Box::new(GzDecoder::new(input)),
        #[cfg(feature = "snappy")]
        CompressionType::Snappy => Box::new(snap::read::FrameDecoder::new(input)),
    }
}

/// Opens a perma file for reading through its decompressor.
///
/// A file that does not exist is reported as [`Error::NotFound`] naming it.
pub fn open_reader(path: &Path, compression: CompressionType) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::not_found(format!("File {} does not exist", path.display())),
        _ => Error::Io(e),
    })?;
    let input = decompress(BufReader::new(file), compression);
    match compression {
        CompressionType::None => Ok(input),
        _ => Ok(Box::new(StreamReader { inner: input, file: path.display().to_string() })),
    }
}

/// Reports a damaged compressed stream as invalid data naming its file.
struct StreamReader<R> {
    inner: R,
    file: String,
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|e| {
            if is_damaged_stream(&e) {
                io::Error::new(io::ErrorKind::InvalidData, format!("Damaged stream in {}: {}", self.file, e))
            } else {
                e
            }
        })
    }
}

/// gzip reports bad input as `InvalidInput`, snap wraps its own error type.
fn is_damaged_stream(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => true,
        #[cfg(feature = "snappy")]
        _ if e.get_ref().is_some_and(|inner| inner.is::<snap::Error>()) => true,
        _ => false,
    }
}
