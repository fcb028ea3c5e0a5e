//! Map entry record format.
//!
//! Each record consists of:
//! - Marker (1 byte): `0xF5`, not checksummed
//! - Type (1 byte): 0 = new or updated, 1 = deleted
//! - Key (length-prefixed encoded bytes)
//! - Value (length-prefixed encoded bytes, null length for deleted entries)
//! - Checksum (8 bytes): CRC32 of type, key and value

use super::binary::{BinaryReader, BinaryWriter};
use crate::codec::Codecs;
use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Marker byte in front of every record.
pub const RECORD_MARKER: u8 = 0xF5;

/// Kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// The key was added or its value changed.
    NewOrUpdated = 0,
    /// The key was removed.
    Deleted = 1,
}

impl RecordType {
    /// Convert from u8 to RecordType
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RecordType::NewOrUpdated),
            1 => Ok(RecordType::Deleted),
            _ => Err(Error::invalid_data(format!("Invalid RecordType byte code: {}", value))),
        }
    }
}

/// A record with its key and value still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Type of the record
    pub record_type: RecordType,
    /// Encoded key
    pub key: Option<Vec<u8>>,
    /// Encoded value, absent for deleted entries
    pub value: Option<Vec<u8>>,
}

impl RawRecord {
    /// Writes the record including marker and checksum.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        BinaryWriter::new(out).write_byte(RECORD_MARKER)?;

        let mut writer = BinaryWriter::with_checksum(out);
        writer.write_byte(self.record_type as u8)?;
        writer.write_with_length(self.key.as_deref())?;
        writer.write_with_length(self.value.as_deref())?;
        writer.write_checksum()
    }

    /// Reads the next record, or `None` at the end of the stream.
    pub fn read_from<R: Read>(input: &mut R) -> Result<Option<Self>> {
        let marker = match BinaryReader::new(input).read_byte_or_eof()? {
            Some(marker) => marker,
            None => return Ok(None),
        };
        if marker != RECORD_MARKER {
            return Err(Error::invalid_data(format!("Invalid record marker: {:#x}", marker)));
        }

        let mut reader = BinaryReader::with_checksum(input);
        let record_type = RecordType::from_u8(reader.read_byte()?)?;
        let key = reader.read_with_length()?;
        let value = reader.read_with_length()?;
        reader.read_and_check_checksum("record")?;

        Ok(Some(Self { record_type, key, value }))
    }
}

/// One map entry change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRecord<K, V> {
    /// The key was added or its value changed.
    NewOrUpdated(K, V),
    /// The key was removed.
    Deleted(K),
}

impl<K, V> EntryRecord<K, V> {
    /// Encodes a new or updated entry without taking ownership.
    pub fn encode_new_or_updated(key: &K, value: &V, codecs: &Codecs<K, V>) -> Result<RawRecord> {
        Ok(RawRecord {
            record_type: RecordType::NewOrUpdated,
            key: codecs.key.encode(key)?,
            value: codecs.value.encode(value)?,
        })
    }

    /// Encodes a deleted entry without taking ownership.
    pub fn encode_deleted(key: &K, codecs: &Codecs<K, V>) -> Result<RawRecord> {
        Ok(RawRecord { record_type: RecordType::Deleted, key: codecs.key.encode(key)?, value: None })
    }

    /// Decodes a raw record.
    pub fn decode(raw: RawRecord, codecs: &Codecs<K, V>) -> Result<Self> {
        let key = codecs.key.decode(raw.key)?;
        match raw.record_type {
            RecordType::NewOrUpdated => Ok(EntryRecord::NewOrUpdated(key, codecs.value.decode(raw.value)?)),
            RecordType::Deleted => {
                if raw.value.is_some() {
                    return Err(Error::invalid_data("Deleted record carries a value"));
                }
                Ok(EntryRecord::Deleted(key))
            }
        }
    }
}
