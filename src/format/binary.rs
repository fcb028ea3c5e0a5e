//! Primitive big-endian reads and writes with an optional running checksum.
//!
//! Every multi-byte integer is written in network byte order. Byte blocks are
//! prefixed with an `i32` length; a length of `-1` stands for a null block.
//! A checksum scope is opened by constructing a reader or writer with
//! [`Crc32`]; the stored checksum is always written as an `i64` and is itself
//! not part of the scope.

use crate::error::{Error, Result};
use std::io::{self, Read, Write};

/// Length prefix of a null byte block.
pub const NULL_LENGTH: i32 = -1;

/// A running checksum over the bytes passing through a reader or writer.
pub trait Checksum {
    /// Feeds bytes into the checksum.
    fn update(&mut self, bytes: &[u8]);

    /// Returns the checksum of everything fed so far.
    fn value(&self) -> u64;
}

/// Checksum that ignores its input and always reports 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoChecksum;

impl Checksum for NoChecksum {
    fn update(&mut self, _bytes: &[u8]) {}

    fn value(&self) -> u64 {
        0
    }
}

/// CRC-32 checksum.
#[derive(Debug, Default, Clone)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Checksum for Crc32 {
    fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    fn value(&self) -> u64 {
        self.hasher.clone().finalize() as u64
    }
}

/// Writes primitives to an output stream.
pub struct BinaryWriter<'a, W: Write, C: Checksum = NoChecksum> {
    out: &'a mut W,
    checksum: C,
}

impl<'a, W: Write> BinaryWriter<'a, W, NoChecksum> {
    /// Creates a writer without checksum.
    pub fn new(out: &'a mut W) -> Self {
        Self { out, checksum: NoChecksum }
    }
}

impl<'a, W: Write> BinaryWriter<'a, W, Crc32> {
    /// Creates a writer that opens a CRC-32 scope.
    pub fn with_checksum(out: &'a mut W) -> Self {
        Self { out, checksum: Crc32::default() }
    }
}

impl<'a, W: Write, C: Checksum> BinaryWriter<'a, W, C> {
    /// Writes raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.checksum.update(bytes);
        self.out.write_all(bytes)?;
        Ok(())
    }

    /// Writes a single byte.
    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Writes a 2 byte integer.
    pub fn write_short(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes a 4 byte integer.
    pub fn write_int(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes an 8 byte integer.
    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes a length-prefixed block, `None` as the null length.
    pub fn write_with_length(&mut self, bytes: Option<&[u8]>) -> Result<()> {
        match bytes {
            None => self.write_int(NULL_LENGTH),
            Some(bytes) => {
                let length = i32::try_from(bytes.len()).map_err(|_| {
                    Error::invalid_argument(format!("Block of {} bytes is too large", bytes.len()))
                })?;
                self.write_int(length)?;
                self.write_bytes(bytes)
            }
        }
    }

    /// Writes the checksum value outside of the checksum scope.
    pub fn write_checksum(&mut self) -> Result<()> {
        let value = self.checksum.value();
        self.out.write_all(&(value as i64).to_be_bytes())?;
        Ok(())
    }

    /// Returns the current checksum value.
    pub fn checksum(&self) -> u64 {
        self.checksum.value()
    }
}

/// Reads primitives from an input stream.
pub struct BinaryReader<'a, R: Read, C: Checksum = NoChecksum> {
    input: &'a mut R,
    checksum: C,
}

impl<'a, R: Read> BinaryReader<'a, R, NoChecksum> {
    /// Creates a reader without checksum.
    pub fn new(input: &'a mut R) -> Self {
        Self { input, checksum: NoChecksum }
    }
}

impl<'a, R: Read> BinaryReader<'a, R, Crc32> {
    /// Creates a reader that opens a CRC-32 scope.
    pub fn with_checksum(input: &'a mut R) -> Self {
        Self { input, checksum: Crc32::default() }
    }
}

impl<'a, R: Read, C: Checksum> BinaryReader<'a, R, C> {
    /// Reads one byte, or `None` at a clean end of stream.
    pub fn read_byte_or_eof(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.checksum.update(&buf);
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_error(e)),
            }
        }
    }

    /// Reads one byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a 2 byte integer.
    pub fn read_short(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.fill(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    /// Reads a 4 byte integer.
    pub fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Reads an 8 byte integer.
    pub fn read_long(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// Reads exactly `length` bytes.
    ///
    /// The buffer grows with the data actually read, so a corrupt length
    /// cannot force a huge allocation.
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        (&mut *self.input).take(length as u64).read_to_end(&mut bytes).map_err(read_error)?;
        if bytes.len() != length {
            return Err(Error::invalid_data(format!(
                "Unexpected end of data: expected {} bytes, got {}",
                length,
                bytes.len()
            )));
        }
        self.checksum.update(&bytes);
        Ok(bytes)
    }

    /// Reads a length-prefixed block; the null length yields `None`.
    pub fn read_with_length(&mut self) -> Result<Option<Vec<u8>>> {
        let length = self.read_int()?;
        if length == NULL_LENGTH {
            return Ok(None);
        }
        if length < 0 {
            return Err(Error::invalid_data(format!("Invalid block length: {}", length)));
        }
        self.read_bytes(length as usize).map(Some)
    }

    /// Reads the stored checksum and compares it to the running one.
    pub fn read_and_check_checksum(&mut self, what: &str) -> Result<()> {
        let actual = self.checksum.value();
        let mut buf = [0u8; 8];
        read_exact_or_invalid(&mut *self.input, &mut buf)?;
        let expected = i64::from_be_bytes(buf) as u64;
        if expected != actual {
            return Err(Error::ChecksumMismatch { what: what.to_string(), expected, actual });
        }
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        read_exact_or_invalid(&mut *self.input, buf)?;
        self.checksum.update(buf);
        Ok(())
    }
}

fn read_exact_or_invalid<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<()> {
    match input.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::invalid_data(format!(
            "Unexpected end of data while reading {} bytes",
            buf.len()
        ))),
        Err(e) => Err(read_error(e)),
    }
}

/// Decoders report damaged input through `io::Error`; that is malformed data.
fn read_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => Error::invalid_data(e.to_string()),
        io::ErrorKind::UnexpectedEof => Error::invalid_data(format!("Unexpected end of data: {}", e)),
        _ => Error::Io(e),
    }
}
