//! Perma file format.
//!
//! A perma file is a header followed by map entry records:
//!
//! ```text
//! FILE   := MARKER("PeMa") HEADER RECORD*
//! HEADER := VERSION TYPE UUID_HI UUID_LO SEQ NAME COUNT CRC32
//! RECORD := MARKER(0xF5) TYPE KEY VALUE CRC32
//! ```
//!
//! The end of the stream terminates the record sequence; the number of
//! records read must equal the count declared in the header.
//!
//! ## Usage
//!
//! ```rust
//! use perma::codec::Codecs;
//! use perma::format::{read_map_file, write_map_file, Header};
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<(), perma::Error> {
//! let codecs = Codecs::strings();
//! let entries = vec![("a".to_string(), "1".to_string())];
//!
//! let mut bytes = Vec::new();
//! let header = Header::new_full("orders", entries.len())?;
//! write_map_file(&mut bytes, &header, entries.iter().map(|(k, v)| (k, v)), std::iter::empty(), &codecs)?;
//!
//! let mut map = HashMap::new();
//! let read = read_map_file(&mut bytes.as_slice(), &codecs, &mut map, "orders")?;
//! assert_eq!(read, header);
//! assert_eq!(map.get("a").map(String::as_str), Some("1"));
//! # Ok(())
//! # }
//! ```

pub mod binary;
pub mod header;
pub mod record;

pub use binary::{BinaryReader, BinaryWriter, Checksum, Crc32, NoChecksum};
pub use header::{FileType, Header};
pub use record::{EntryRecord, RawRecord, RecordType};

use crate::codec::Codecs;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::hash::Hash;
use std::io::{Read, Write};

/// Writes a header and its records: first new or updated entries, then deletions.
///
/// Fails without a complete file if the number of records differs from the
/// header's declared count.
pub fn write_map_file<'a, W, K, V, U, D>(
    out: &mut W,
    header: &Header,
    new_or_updated: U,
    deleted: D,
    codecs: &Codecs<K, V>,
) -> Result<()>
where
    W: Write,
    K: 'a,
    V: 'a,
    U: IntoIterator<Item = (&'a K, &'a V)>,
    D: IntoIterator<Item = &'a K>,
{
    header.write_to(out)?;
    let mut count = 0usize;
    for (key, value) in new_or_updated {
        EntryRecord::encode_new_or_updated(key, value, codecs)?.write_to(out)?;
        count += 1;
    }
    for key in deleted {
        EntryRecord::<K, V>::encode_deleted(key, codecs)?.write_to(out)?;
        count += 1;
    }
    if !header.has_size(count) {
        return Err(Error::EntryCountMismatch {
            file: header.name().to_string(),
            declared: header.entry_count(),
            actual: i32::try_from(count).unwrap_or(i32::MAX),
        });
    }
    out.flush()?;
    Ok(())
}

/// Reads a whole file and folds its records into `collector`.
///
/// New or updated records are inserted, deleted records removed, in file
/// order. `file` names the source in error messages. On error the collector
/// may hold a partial fold and must be discarded.
pub fn read_map_file<R, K, V>(
    input: &mut R,
    codecs: &Codecs<K, V>,
    collector: &mut HashMap<K, V>,
    file: &str,
) -> Result<Header>
where
    R: Read,
    K: Eq + Hash,
{
    let header = Header::read_from(input)?;
    read_records(input, &header, codecs, collector, file)?;
    Ok(header)
}

/// Reads the records following `header` and folds them into `collector`.
///
/// Used when the header must be validated before any record is applied.
pub fn read_records<R, K, V>(
    input: &mut R,
    header: &Header,
    codecs: &Codecs<K, V>,
    collector: &mut HashMap<K, V>,
    file: &str,
) -> Result<()>
where
    R: Read,
    K: Eq + Hash,
{
    let mut count = 0usize;
    while let Some(raw) = RawRecord::read_from(input)? {
        match EntryRecord::decode(raw, codecs)? {
            EntryRecord::NewOrUpdated(key, value) => {
                collector.insert(key, value);
            }
            EntryRecord::Deleted(key) => {
                collector.remove(&key);
            }
        }
        count += 1;
    }
    if !header.has_size(count) {
        return Err(Error::EntryCountMismatch {
            file: file.to_string(),
            declared: header.entry_count(),
            actual: i32::try_from(count).unwrap_or(i32::MAX),
        });
    }
    Ok(())
}
