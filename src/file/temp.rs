//! Temp files: every perma file is written under a unique temp name and
//! renamed onto its target once complete.

use super::compression::CompressedWriter;
use crate::config::CompressionType;
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const TEMP_SUFFIX: &str = ".perma.temp";

/// A file being written that is not yet visible under its final name.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Picks a fresh temp file path for `name` in `dir`.
    pub fn new(dir: &Path, name: &str) -> Self {
        let file_name = format!("{}-{}{}", name, Uuid::new_v4().simple(), TEMP_SUFFIX);
        Self { path: dir.join(file_name) }
    }

    /// Path of the temp file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the temp file and fills it through `write`, compressed with
    /// `compression`, then flushes and syncs it to disk.
    ///
    /// If writing fails the temp file is removed again.
    pub fn write<F>(&self, compression: CompressionType, write: F) -> Result<()>
    where
        F: FnOnce(&mut CompressedWriter<BufWriter<File>>) -> Result<()>,
    {
        let result = self.write_and_sync(compression, write);
        if result.is_err() {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Failed to remove temp file {}: {}", self.path.display(), e);
                }
            }
        }
        result
    }

    fn write_and_sync<F>(&self, compression: CompressionType, write: F) -> Result<()>
    where
        F: FnOnce(&mut CompressedWriter<BufWriter<File>>) -> Result<()>,
    {
        let file = File::create(&self.path)?;
        let mut writer = CompressedWriter::new(BufWriter::new(file), compression);
        write(&mut writer)?;
        let mut buffered = writer.finish()?;
        buffered.flush()?;
        buffered.get_ref().sync_all()?;
        Ok(())
    }

    /// Atomically renames the temp file onto `target`.
    ///
    /// On failure the temp file stays behind and is swept by a later write.
    pub fn commit(self, target: &Path) -> Result<()> {
        fs::rename(&self.path, target).map_err(|source| Error::FileRename {
            from: self.path.clone(),
            to: target.to_path_buf(),
            source,
        })
    }
}

/// Deletes temp files of `name` left over by writes that never committed.
///
/// Returns the number of files removed. A failure to remove one file is
/// logged and does not stop the sweep.
pub fn delete_stale(dir: &Path, name: &str) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !is_temp_file_of(name, file_name) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                log::debug!("Deleted stale temp file {}", file_name);
                removed += 1;
            }
            Err(e) => log::warn!("Failed to delete stale temp file {}: {}", file_name, e),
        }
    }
    Ok(removed)
}

fn is_temp_file_of(name: &str, file_name: &str) -> bool {
    file_name
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(TEMP_SUFFIX))
        .is_some_and(|id| id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit()))
}
