//! Configuration options for perma.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default share of the previous snapshot that may be changed or removed
/// before a write is rolled into a new full file.
pub const DEFAULT_COMPACT_THRESHOLD_PERCENT: u32 = 33;

/// Configuration options for loading and writing a persistent map or set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Create the directory if it doesn't exist.
    /// Default: true
    pub create_if_missing: bool,

    /// Compression used for new full files. Deltas always inherit the
    /// compression of their full file.
    /// Default: CompressionType::None
    pub compression: CompressionType,

    /// Percentage of the previous snapshot size that removed plus changed
    /// entries must exceed to trigger compaction. Must lie in `0..=100`.
    /// Default: 33
    pub compact_threshold_percent: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            compression: CompressionType::None,
            compact_threshold_percent: DEFAULT_COMPACT_THRESHOLD_PERCENT,
        }
    }
}

/// Compression algorithms for perma files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// No compression.
    #[default]
    None,

    /// Gzip compression.
    Gzip,

    /// Snappy frame compression (fast, moderate compression ratio).
    #[cfg(feature = "snappy")]
    Snappy,
}

/// Shape of a JSON configuration document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OptionsFile {
    #[serde(default)]
    compress: bool,
    #[serde(default)]
    compression: Option<CompressionType>,
    #[serde(default = "default_threshold")]
    compact_threshold_percent: u32,
    #[serde(default)]
    create_if_missing: Option<bool>,
}

fn default_threshold() -> u32 {
    DEFAULT_COMPACT_THRESHOLD_PERCENT
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if it doesn't exist.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Switches between gzip and no compression.
    pub fn compress(mut self, value: bool) -> Self {
        self.compression = if value { CompressionType::Gzip } else { CompressionType::None };
        self
    }

    /// Sets the compression algorithm.
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the compaction threshold percentage.
    pub fn compact_threshold_percent(mut self, percent: u32) -> Self {
        self.compact_threshold_percent = percent;
        self
    }

    /// Parses options from a JSON document and validates them.
    ///
    /// Recognized keys: `compress`, `compression`, `compactThresholdPercent`
    /// and `createIfMissing`. An explicit `compression` wins over `compress`.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: OptionsFile = serde_json::from_str(json)?;
        let mut options = Options::new()
            .compress(file.compress)
            .compact_threshold_percent(file.compact_threshold_percent);
        if let Some(compression) = file.compression {
            options.compression = compression;
        }
        if let Some(create) = file.create_if_missing {
            options.create_if_missing = create;
        }
        options.validate()?;
        Ok(options)
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.compact_threshold_percent > 100 {
            return Err(Error::invalid_argument(format!(
                "Invalid percent value for compact_threshold_percent: {}",
                self.compact_threshold_percent
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert!(opts.create_if_missing);
        assert_eq!(opts.compression, CompressionType::None);
        assert_eq!(opts.compact_threshold_percent, 33);
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new().compress(true).compact_threshold_percent(50).create_if_missing(false);

        assert_eq!(opts.compression, CompressionType::Gzip);
        assert_eq!(opts.compact_threshold_percent, 50);
        assert!(!opts.create_if_missing);

        let opts = opts.compress(false);
        assert_eq!(opts.compression, CompressionType::None);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        assert!(opts.validate().is_ok());

        opts.compact_threshold_percent = 0;
        assert!(opts.validate().is_ok());

        opts.compact_threshold_percent = 100;
        assert!(opts.validate().is_ok());

        opts.compact_threshold_percent = 101;
        assert!(matches!(opts.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_options_from_json() {
        let opts = Options::from_json(r#"{"compress": true, "compactThresholdPercent": 20}"#).unwrap();
        assert_eq!(opts.compression, CompressionType::Gzip);
        assert_eq!(opts.compact_threshold_percent, 20);
        assert!(opts.create_if_missing);

        let opts = Options::from_json("{}").unwrap();
        assert_eq!(opts, Options::default());

        let opts = Options::from_json(r#"{"compress": true, "compression": "none"}"#).unwrap();
        assert_eq!(opts.compression, CompressionType::None);
    }

    #[test]
    fn test_options_from_json_rejects_invalid() {
        assert!(matches!(
            Options::from_json(r#"{"compactThresholdPercent": 150}"#),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Options::from_json(r#"{"unknownKey": 1}"#),
            Err(Error::Serialization(_))
        ));
        assert!(Options::from_json("not json").is_err());
    }
}
