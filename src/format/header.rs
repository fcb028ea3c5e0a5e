//! File header: the framed metadata block at the start of every perma file.
//!
//! ```text
//! MARKER "PeMa" (4 bytes, not checksummed)
//! VERSION (i16) TYPE (u8) UUID_HI (i64) UUID_LO (i64)
//! SEQUENCE (i32) NAME (length-prefixed UTF-8) COUNT (i32)
//! CRC32 (i64) over VERSION..COUNT
//! ```

use super::binary::{BinaryReader, BinaryWriter};
use crate::error::{Error, Result};
use std::fmt;
use std::io::{Read, Write};
use uuid::Uuid;

/// Marker bytes every perma file starts with.
pub const FILE_MARKER: &[u8; 4] = b"PeMa";

/// Format version written into every header.
pub const VERSION: i16 = 1;

/// Kind of a perma file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    /// A complete snapshot of the map.
    Full = 0,
    /// Changes since the previous file of the chain.
    Delta = 1,
}

impl FileType {
    /// Convert from u8 to FileType
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FileType::Full),
            1 => Ok(FileType::Delta),
            _ => Err(Error::invalid_data(format!("Invalid FileType byte code: {}", value))),
        }
    }
}

/// Per-file metadata identifying the lineage and declaring the entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    file_type: FileType,
    lineage: Uuid,
    sequence: i32,
    name: String,
    entry_count: i32,
}

impl Header {
    /// Creates the header of a new full file with a fresh lineage.
    pub fn new_full(name: &str, entry_count: usize) -> Result<Self> {
        Ok(Self {
            file_type: FileType::Full,
            lineage: Uuid::new_v4(),
            sequence: 0,
            name: name.to_string(),
            entry_count: to_count(entry_count)?,
        })
    }

    /// Creates the header of the delta file following this one.
    pub fn next_delta(&self, entry_count: usize) -> Result<Self> {
        Ok(Self {
            file_type: FileType::Delta,
            lineage: self.lineage,
            sequence: self.sequence + 1,
            name: self.name.clone(),
            entry_count: to_count(entry_count)?,
        })
    }

    /// Kind of file this header belongs to.
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// UUID of the full file lineage.
    pub fn lineage(&self) -> Uuid {
        self.lineage
    }

    /// Update sequence number: 0 for full files, incrementing per delta.
    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    /// Logical name of the map.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared number of records.
    pub fn entry_count(&self) -> i32 {
        self.entry_count
    }

    /// Returns true for a full file header.
    pub fn is_full(&self) -> bool {
        self.file_type == FileType::Full
    }

    /// Returns true if both headers belong to the same full file lineage.
    pub fn belongs_to_same_full_file_as(&self, other: &Header) -> bool {
        self.name == other.name && self.lineage == other.lineage
    }

    /// Returns true if this header is the delta directly following `previous`.
    pub fn is_next_delta_of(&self, previous: &Header) -> bool {
        !self.is_full()
            && self.belongs_to_same_full_file_as(previous)
            && self.sequence == previous.sequence + 1
    }

    /// Returns true if `count` equals the declared entry count.
    pub fn has_size(&self, count: usize) -> bool {
        i32::try_from(count).map_or(false, |count| count == self.entry_count)
    }

    /// Writes the header.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        BinaryWriter::new(out).write_bytes(FILE_MARKER)?;

        let mut writer = BinaryWriter::with_checksum(out);
        writer.write_short(VERSION)?;
        writer.write_byte(self.file_type as u8)?;
        let (high, low) = split_uuid(self.lineage);
        writer.write_long(high)?;
        writer.write_long(low)?;
        writer.write_int(self.sequence)?;
        writer.write_with_length(Some(self.name.as_bytes()))?;
        writer.write_int(self.entry_count)?;
        writer.write_checksum()
    }

    /// Reads and verifies a header.
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let marker = BinaryReader::new(input).read_bytes(FILE_MARKER.len())?;
        if marker.as_slice() != FILE_MARKER {
            return Err(Error::invalid_data(format!(
                "Not a perma file, file marker invalid: {:02x?}",
                marker
            )));
        }

        let mut reader = BinaryReader::with_checksum(input);
        let version = reader.read_short()?;
        let file_type = FileType::from_u8(reader.read_byte()?)?;
        let high = reader.read_long()?;
        let low = reader.read_long()?;
        let lineage = join_uuid(high, low);
        let sequence = reader.read_int()?;
        let name = match reader.read_with_length()? {
            Some(bytes) => String::from_utf8(bytes)
                .map_err(|e| Error::invalid_data(format!("Header name is not UTF-8: {}", e)))?,
            None => return Err(Error::invalid_data("Header name is null")),
        };
        let entry_count = reader.read_int()?;
        let what = format!("file header of {:.999} with uuid {}", name, lineage);
        reader.read_and_check_checksum(&what)?;

        if version != VERSION {
            return Err(Error::invalid_data(format!(
                "Unsupported file version {} in {}",
                version, what
            )));
        }
        if entry_count < 0 {
            return Err(Error::invalid_data(format!(
                "Negative entry count {} in {}",
                entry_count, what
            )));
        }

        Ok(Self { file_type, lineage, sequence, name, entry_count })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header{{type={:?}, uuid={}, sequence={}, name='{}', entries={}}}",
            self.file_type, self.lineage, self.sequence, self.name, self.entry_count
        )
    }
}

fn to_count(count: usize) -> Result<i32> {
    i32::try_from(count)
        .map_err(|_| Error::invalid_argument(format!("Too many entries for one file: {}", count)))
}

fn split_uuid(uuid: Uuid) -> (i64, i64) {
    let value = uuid.as_u128();
    ((value >> 64) as u64 as i64, value as u64 as i64)
}

fn join_uuid(high: i64, low: i64) -> Uuid {
    Uuid::from_u128(((high as u64 as u128) << 64) | low as u64 as u128)
}
