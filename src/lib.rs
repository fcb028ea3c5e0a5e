//! # Perma - Persistent Maps and Sets on Full and Delta Files
//!
//! Perma keeps an application's map or set in memory and records it on disk
//! as a chain of binary files: a full file holding a complete snapshot,
//! followed by delta files holding only what changed since the previous
//! file. Once the changes grow large relative to the map, the chain is
//! compacted back into a single new full file.
//!
//! ## Architecture
//!
//! - **Format**: big-endian primitives, CRC-32 framed headers and records
//! - **Files**: file naming, discovery of the latest chain, compression
//! - **Durability**: every file is written to a temp file and renamed
//! - **Snapshot**: the engine that diffs, writes deltas, compacts and refreshes
//! - **Facades**: thread-safe map, set and read-only handles
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use perma::{Options, ReadOnlyPerMa, WritablePerMa};
//! use perma::codec::Codecs;
//!
//! # fn main() -> Result<(), perma::Error> {
//! // Load or create a map
//! let orders = WritablePerMa::load_or_create_string_map("./data", "orders", &Options::default())?;
//!
//! // Change the live map
//! orders.insert("a".to_string(), "1".to_string());
//! orders.insert("b".to_string(), "2".to_string());
//!
//! // Write the changes: a full file first, deltas afterwards
//! orders.persist()?;
//!
//! // Another handle picks up the changes
//! let reader = ReadOnlyPerMa::load("./data", "orders", &Options::default(), Codecs::strings())?;
//! orders.remove("a");
//! orders.persist()?;
//! reader.refresh()?;
//! assert_eq!(reader.get("a"), None);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod codec;
pub mod compaction;
pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod map;
pub mod read_only;
pub mod set;
pub mod snapshot;

// Re-exports
pub use codec::{Codec, Codecs};
pub use compaction::{ChangedRemovedThreshold, CompactionThreshold};
pub use config::{CompressionType, Options};
pub use error::{Error, Result};
pub use map::WritablePerMa;
pub use read_only::{ReadOnlyPerMa, ReadOnlyPerMaSet};
pub use set::WritablePerMaSet;
pub use snapshot::{MapDifference, MapSnapshot};
