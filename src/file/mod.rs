//! On-disk layout of perma files.
//!
//! A name owns, inside one directory, a chain of files:
//!
//! ```text
//! orders_1_0.perma        full file, generation 1
//! orders_1_1.perma        first delta of generation 1
//! orders_1_2.perma        second delta of generation 1
//! orders-<id>.perma.temp  file being written
//! ```
//!
//! - `name`: file name grammar and validation
//! - `group`: discovery of the latest full file and its deltas
//! - `compression`: compression implied by the file suffix
//! - `temp`: write to a temp file, then rename

pub mod compression;
pub mod group;
pub mod name;
pub mod temp;

pub use compression::{open_reader, CompressedWriter};
pub use group::FileGroup;
pub use name::{validate_name, PermaFile};
pub use temp::TempFile;
