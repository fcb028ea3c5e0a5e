//! File name grammar.
//!
//! ```text
//! full file:  {name}_{full}_0.perma[.gzip|.snappy]    full >= 1
//! delta file: {name}_{full}_{delta}.perma[...]         delta >= 1
//! temp file:  {name}-{random}.perma.temp
//! ```
//!
//! Numbers are written in canonical decimal form; names with leading zeros
//! or signs are not perma files.

use crate::config::CompressionType;
use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Location and identity of one full or delta file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermaFile {
    dir: PathBuf,
    name: String,
    full_number: u32,
    delta_number: u32,
    compression: CompressionType,
}

impl PermaFile {
    /// Full file number `full_number` of `name` in `dir`.
    pub fn full(dir: &Path, name: &str, full_number: u32, compression: CompressionType) -> Self {
        Self { dir: dir.to_path_buf(), name: name.to_string(), full_number, delta_number: 0, compression }
    }

    /// Parses a file name found in `dir`. Returns `None` unless it is a full
    /// or delta file of `name`.
    pub fn parse(dir: &Path, name: &str, file_name: &str) -> Option<Self> {
        let (stem, compression) = CompressionType::split_file_name(file_name)?;
        let numbers = stem.strip_prefix(name)?.strip_prefix('_')?;
        let (full, delta) = numbers.split_once('_')?;
        let full_number = parse_number(full)?;
        let delta_number = parse_number(delta)?;
        if full_number == 0 {
            return None;
        }
        Some(Self { dir: dir.to_path_buf(), name: name.to_string(), full_number, delta_number, compression })
    }

    /// Logical name of the map.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generation of the full file this file belongs to.
    pub fn full_number(&self) -> u32 {
        self.full_number
    }

    /// Position in the delta chain; 0 for the full file itself.
    pub fn delta_number(&self) -> u32 {
        self.delta_number
    }

    /// Compression implied by the file suffix.
    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    /// Returns true for a full file.
    pub fn is_full(&self) -> bool {
        self.delta_number == 0
    }

    /// File name without directory.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}{}",
            self.name,
            self.full_number,
            self.delta_number,
            self.compression.file_suffix()
        )
    }

    /// Full path of the file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(self.file_name())
    }

    /// The delta file following this one, with the same compression.
    pub fn next_delta(&self) -> Result<Self> {
        let delta_number = self
            .delta_number
            .checked_add(1)
            .ok_or_else(|| Error::invalid_argument(format!("Delta numbers exhausted for {}", self)))?;
        Ok(Self { delta_number, ..self.clone() })
    }

    /// The full file of the next generation.
    pub fn next_full(&self, compression: CompressionType) -> Result<Self> {
        let full_number = self
            .full_number
            .checked_add(1)
            .ok_or_else(|| Error::invalid_argument(format!("Full file numbers exhausted for {}", self)))?;
        Ok(Self::full(&self.dir, &self.name, full_number, compression))
    }

    /// Returns true if this file is a delta of the full file `full`.
    pub fn is_delta_of(&self, full: &PermaFile) -> bool {
        !self.is_full()
            && self.name == full.name
            && self.full_number == full.full_number
            && self.compression == full.compression
    }
}

impl fmt::Display for PermaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

fn parse_number(digits: &str) -> Option<u32> {
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !canonical {
        return None;
    }
    digits.parse().ok()
}

/// Checks that `name` can be embedded in a file name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_argument("Name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_argument(format!("Invalid name: {}", name)));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(Error::invalid_argument(format!(
            "Name must not contain path separators or NUL: {:?}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir() -> PathBuf {
        PathBuf::from("/data")
    }

    #[test]
    fn test_file_names() {
        let full = PermaFile::full(&dir(), "orders", 1, CompressionType::None);
        assert_eq!(full.file_name(), "orders_1_0.perma");
        assert_eq!(full.path(), PathBuf::from("/data/orders_1_0.perma"));

        let delta = full.next_delta().unwrap().next_delta().unwrap();
        assert_eq!(delta.file_name(), "orders_1_2.perma");
        assert!(delta.is_delta_of(&full));

        let gzip = full.next_full(CompressionType::Gzip).unwrap();
        assert_eq!(gzip.file_name(), "orders_2_0.perma.gzip");
        assert_eq!(gzip.next_delta().unwrap().file_name(), "orders_2_1.perma.gzip");
        assert!(!delta.is_delta_of(&gzip));
    }

    #[test]
    fn test_parse() {
        let file = PermaFile::parse(&dir(), "orders", "orders_12_3.perma.gzip").unwrap();
        assert_eq!(file.full_number(), 12);
        assert_eq!(file.delta_number(), 3);
        assert_eq!(file.compression(), CompressionType::Gzip);
        assert_eq!(file.file_name(), "orders_12_3.perma.gzip");

        let full = PermaFile::parse(&dir(), "my_map", "my_map_1_0.perma").unwrap();
        assert!(full.is_full());
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        for file_name in [
            "orders_0_0.perma",
            "orders_01_0.perma",
            "orders_1_00.perma",
            "orders_1.perma",
            "orders_1_0_0.perma",
            "orders_+1_0.perma",
            "orders_1_0.perma.temp",
            "orders-0123.perma.temp",
            "orders_a_0.perma",
            "order_1_0.perma",
            "orders__1_0.perma",
            "orders_1_0",
            "orders_99999999999_0.perma",
        ] {
            assert!(PermaFile::parse(&dir(), "orders", file_name).is_none(), "{} was accepted", file_name);
        }
        // a longer name sharing the prefix
        assert!(PermaFile::parse(&dir(), "a", "a_b_1_0.perma").is_none());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("orders").is_ok());
        assert!(validate_name("my map_v2").is_ok());
        for name in ["", ".", "..", "a/b", "a\\b", "a\0b"] {
            assert!(matches!(validate_name(name), Err(Error::InvalidArgument(_))), "{:?}", name);
        }
    }
}
