//! Discovery of the full file and delta chain of a name.

use super::name::PermaFile;
use crate::config::CompressionType;
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The latest full file of a name plus its deltas in read order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    dir: PathBuf,
    name: String,
    full: Option<PermaFile>,
    deltas: Vec<PermaFile>,
}

impl FileGroup {
    /// A group without files.
    pub fn empty(dir: &Path, name: &str) -> Self {
        Self { dir: dir.to_path_buf(), name: name.to_string(), full: None, deltas: Vec::new() }
    }

    /// Lists the files of `name` in `dir`.
    ///
    /// The full file with the highest number wins. Only deltas of that full
    /// file with the same compression belong to the group, sorted by delta
    /// number. A missing directory yields an empty group.
    pub fn list(dir: &Path, name: &str) -> Result<Self> {
        let files = list_files(dir, name)?;

        let full = files.iter().filter(|f| f.is_full()).max_by_key(|f| f.full_number()).cloned();
        let mut deltas: Vec<PermaFile> = match &full {
            Some(full) => files.into_iter().filter(|f| f.is_delta_of(full)).collect(),
            None => Vec::new(),
        };
        deltas.sort_by_key(|f| f.delta_number());

        Ok(Self { dir: dir.to_path_buf(), name: name.to_string(), full, deltas })
    }

    /// Returns true if a full file exists.
    pub fn exists(&self) -> bool {
        self.full.is_some()
    }

    /// The full file, or `NotFound` if there is none.
    pub fn full_file(&self) -> Result<&PermaFile> {
        self.full.as_ref().ok_or_else(|| {
            Error::not_found(format!("No full file for {} in {}", self.name, self.dir.display()))
        })
    }

    /// Deltas in read order.
    pub fn delta_files(&self) -> &[PermaFile] {
        &self.deltas
    }

    /// The last delta, if any.
    pub fn latest_delta_file(&self) -> Option<&PermaFile> {
        self.deltas.last()
    }

    /// Number of the last delta; 0 without deltas.
    pub fn latest_delta_number(&self) -> u32 {
        self.latest_delta_file().map_or(0, PermaFile::delta_number)
    }

    /// Deltas numbered after `delta_number`, in read order.
    pub fn deltas_after(&self, delta_number: u32) -> impl Iterator<Item = &PermaFile> {
        self.deltas.iter().filter(move |f| f.delta_number() > delta_number)
    }

    /// Returns true if both groups are built on the same full file.
    pub fn has_same_full_file_as(&self, other: &FileGroup) -> bool {
        self.full.is_some() && self.full == other.full
    }

    /// The full file of the next generation: 1 for an empty group.
    pub fn next_full_file(&self, compression: CompressionType) -> Result<PermaFile> {
        match &self.full {
            Some(full) => full.next_full(compression),
            None => Ok(PermaFile::full(&self.dir, &self.name, 1, compression)),
        }
    }

    /// The next delta file, inheriting the compression of the full file.
    pub fn next_delta_file(&self) -> Result<PermaFile> {
        match self.latest_delta_file() {
            Some(delta) => delta.next_delta(),
            None => self.full_file()?.next_delta(),
        }
    }

    /// A group consisting only of the full file `full`.
    pub fn with_full(&self, full: PermaFile) -> Self {
        Self { dir: self.dir.clone(), name: self.name.clone(), full: Some(full), deltas: Vec::new() }
    }

    /// This group extended by `delta`.
    pub fn with_delta(&self, delta: PermaFile) -> Self {
        let mut group = self.clone();
        group.deltas.push(delta);
        group
    }

    /// Deletes every file of generations older than this group's full file.
    ///
    /// This covers the group replaced by a compaction as well as generations
    /// left behind by a compaction that crashed before its cleanup. Failures
    /// are logged; returns the number of files deleted.
    pub fn delete_superseded(&self) -> Result<usize> {
        let Some(full) = &self.full else {
            return Ok(0);
        };
        let mut deleted = 0;
        for file in list_files(&self.dir, &self.name)? {
            if file.full_number() >= full.full_number() {
                continue;
            }
            match fs::remove_file(file.path()) {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to delete superseded file {}: {}", file, e),
            }
        }
        Ok(deleted)
    }
}

/// Deletes deltas numbered for the full file `full_number`, whatever their
/// compression. They are leftovers of an earlier generation with the same
/// number that never committed its full file.
pub fn delete_orphan_deltas(dir: &Path, name: &str, full_number: u32) -> Result<usize> {
    let mut deleted = 0;
    for file in list_files(dir, name)? {
        if !file.is_full() && file.full_number() == full_number {
            log::debug!("Deleting orphaned delta file {}", file);
            match fs::remove_file(file.path()) {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(deleted)
}

fn list_files(dir: &Path, name: &str) -> Result<Vec<PermaFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Some(file) = entry.file_name().to_str().and_then(|f| PermaFile::parse(dir, name, f)) {
            files.push(file);
        }
    }
    Ok(files)
}
