//! Error types for the perma storage engine.

use std::io;
use std::path::PathBuf;

/// The result type used throughout perma.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for perma operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed data was read: bad marker, unknown type byte, truncated block.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A stored checksum did not match the checksum of the data read.
    #[error("Checksum mismatch in {what}: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// What was being verified.
        what: String,
        /// The checksum stored in the file.
        expected: u64,
        /// The checksum computed over the data read.
        actual: u64,
    },

    /// A file holds a different number of records than its header declares.
    #[error("Entry count mismatch in {file}: header declares {declared}, found {actual}")]
    EntryCountMismatch {
        /// The file that was read.
        file: String,
        /// The count declared in the header.
        declared: i32,
        /// The number of records actually present.
        actual: i32,
    },

    /// A file header does not continue the chain it was read into.
    #[error("Header mismatch: {0}")]
    HeaderMismatch(String),

    /// An expected file was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Renaming a temp file onto its target failed; the write was not committed.
    #[error("Could not rename temporary file {from:?} to {to:?}: {source}")]
    FileRename {
        /// The temp file.
        from: PathBuf,
        /// The target file.
        to: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A key or value could not be encoded, or a configuration document could
    /// not be parsed. Stored bytes that fail to decode are [`Error::InvalidData`].
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Creates a new invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Error::InvalidData(msg.into())
    }

    /// Creates a new header mismatch error.
    pub fn header_mismatch(msg: impl Into<String>) -> Self {
        Error::HeaderMismatch(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Returns true for the malformed-data class: the bytes on disk are wrong.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::InvalidData(_) | Error::ChecksumMismatch { .. } | Error::EntryCountMismatch { .. }
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
