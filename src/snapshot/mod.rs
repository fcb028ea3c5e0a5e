//! Snapshot engine.
//!
//! A [`MapSnapshot`] is an immutable, persisted state of a map. Every
//! operation that writes or reads files returns a new snapshot and leaves the
//! receiver untouched, so a failed operation never exposes half-applied
//! state.
//!
//! A snapshot is either *new* (no file exists for its name yet) or
//! *persisted* (it holds the file group it was read from or written to, and
//! the header of the last file of the chain).
//!
//! ## Writing
//!
//! ```text
//! write_next(current)
//!   new, empty map       -> no-op
//!   new                  -> full file, generation 1
//!   persisted, no change -> no-op
//!   threshold trips      -> full file, generation N+1, old generations deleted
//!   otherwise            -> next delta of generation N
//! ```
//!
//! The engine is not synchronized; callers serialize writes per name.

mod diff;

pub use diff::MapDifference;

use crate::codec::Codecs;
use crate::compaction::{ChangedRemovedThreshold, CompactionThreshold};
use crate::config::{CompressionType, Options};
use crate::error::{Error, Result};
use crate::file::group::delete_orphan_deltas;
use crate::file::{open_reader, temp, validate_name, FileGroup, PermaFile, TempFile};
use crate::format::{read_records, write_map_file, Header};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum State {
    New,
    Persisted { files: FileGroup, last_header: Header },
}

/// Immutable persisted state of a map.
pub struct MapSnapshot<K, V> {
    dir: PathBuf,
    name: String,
    compression: CompressionType,
    codecs: Codecs<K, V>,
    threshold: Arc<dyn CompactionThreshold>,
    state: State,
    map: Arc<HashMap<K, V>>,
}

impl<K, V> MapSnapshot<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
{
    /// Loads the latest state of `name` from `dir`, or a new empty snapshot
    /// if no full file exists.
    ///
    /// The directory is created if missing and `options.create_if_missing`
    /// is set; otherwise a missing directory is [`Error::NotFound`].
    pub fn load_or_create(dir: impl AsRef<Path>, name: &str, options: &Options, codecs: Codecs<K, V>) -> Result<Self> {
        validate_name(name)?;
        options.validate()?;
        let dir = dir.as_ref();
        if !dir.exists() {
            if !options.create_if_missing {
                return Err(Error::not_found(format!("Directory {} does not exist", dir.display())));
            }
            fs::create_dir_all(dir)?;
        }

        let snapshot = Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            compression: options.compression,
            codecs,
            threshold: Arc::new(ChangedRemovedThreshold::new(options.compact_threshold_percent)?),
            state: State::New,
            map: Arc::new(HashMap::new()),
        };

        let files = FileGroup::list(dir, name)?;
        if !files.exists() {
            log::debug!("No files for {} in {}, starting new", name, dir.display());
            return Ok(snapshot);
        }
        snapshot.load(files)
    }

    /// Replaces the compaction policy.
    pub fn with_threshold(mut self, threshold: impl CompactionThreshold + 'static) -> Self {
        self.threshold = Arc::new(threshold);
        self
    }

    /// Logical name of the map.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The persisted map.
    pub fn map(&self) -> &Arc<HashMap<K, V>> {
        &self.map
    }

    /// Returns true once a full file exists for this snapshot.
    pub fn is_persisted(&self) -> bool {
        matches!(self.state, State::Persisted { .. })
    }

    /// Files this snapshot was read from or written to.
    pub fn file_group(&self) -> Option<&FileGroup> {
        match &self.state {
            State::New => None,
            State::Persisted { files, .. } => Some(files),
        }
    }

    /// Header of the last file of the chain.
    pub fn header(&self) -> Option<&Header> {
        match &self.state {
            State::New => None,
            State::Persisted { last_header, .. } => Some(last_header),
        }
    }

    /// Persists `current`, returning the snapshot of it.
    ///
    /// Writes a delta holding only the difference to this snapshot, or a new
    /// full file if the compaction threshold trips. Nothing is written if
    /// `current` equals this snapshot or if a new snapshot receives an empty
    /// map.
    pub fn write_next(&self, current: &HashMap<K, V>) -> Result<Self> {
        let (files, last_header) = match &self.state {
            State::New if current.is_empty() => {
                log::debug!("Nothing to write for new {}", self.name);
                return Ok(self.clone());
            }
            State::New => {
                let files = FileGroup::empty(&self.dir, &self.name);
                return self.write_full(&files, Arc::new(current.clone()));
            }
            State::Persisted { files, last_header } => (files, last_header),
        };

        let diff = MapDifference::between(&self.map, current);
        if diff.are_equal() {
            log::debug!("No changes for {}, nothing to write", self.name);
            return Ok(self.clone());
        }
        log::debug!(
            "Changes for {}: {} added, {} changed, {} removed",
            self.name,
            diff.only_in_new.len(),
            diff.differing.len(),
            diff.only_in_old.len()
        );

        if self.threshold.trigger(diff.only_in_old.len(), diff.differing.len(), self.map.len()) {
            log::debug!("Compaction threshold reached for {}", self.name);
            return self.write_full(files, Arc::new(current.clone()));
        }

        let file = files.next_delta_file()?;
        let header = last_header.next_delta(diff.len())?;
        self.write_file(&file, &header, diff.upserts(), diff.only_in_old.iter().copied())?;
        Ok(self.persisted(files.with_delta(file), header, Arc::new(current.clone())))
    }

    /// Rewrites this snapshot as a new full file generation and deletes the
    /// files of older generations.
    ///
    /// A new snapshot has nothing to compact and is returned unchanged.
    pub fn compact(&self) -> Result<Self> {
        match &self.state {
            State::New => Ok(self.clone()),
            State::Persisted { files, .. } => self.write_full(files, Arc::clone(&self.map)),
        }
    }

    /// Writes `current` as a new full file generation, whatever the
    /// difference to this snapshot.
    pub fn compact_to(&self, current: &HashMap<K, V>) -> Result<Self> {
        match &self.state {
            State::New if current.is_empty() => Ok(self.clone()),
            State::New => self.write_full(&FileGroup::empty(&self.dir, &self.name), Arc::new(current.clone())),
            State::Persisted { files, .. } => self.write_full(files, Arc::new(current.clone())),
        }
    }

    /// Picks up files written by another handle since this snapshot was
    /// built.
    ///
    /// New deltas of the same full file are folded into a copy of the map.
    /// If the full file was replaced, the state is reloaded from scratch. A
    /// vanished full file is [`Error::NotFound`].
    pub fn refresh(&self) -> Result<Self> {
        let listed = FileGroup::list(&self.dir, &self.name)?;
        let (files, last_header) = match &self.state {
            State::New if listed.exists() => {
                log::debug!("Full file appeared for {}, loading", self.name);
                return self.load(listed);
            }
            State::New => return Ok(self.clone()),
            State::Persisted { files, last_header } => (files, last_header),
        };

        let full = listed.full_file()?;
        if !listed.has_same_full_file_as(files) {
            log::debug!("Full file of {} changed to {}, reloading", self.name, full);
            return self.load(listed);
        }
        let on_disk = Header::read_from(&mut open_reader(&full.path(), full.compression())?)?;
        if !on_disk.belongs_to_same_full_file_as(last_header) {
            log::debug!("Full file {} was rewritten, reloading", full);
            return self.load(listed);
        }

        let new_deltas: Vec<&PermaFile> = listed.deltas_after(files.latest_delta_number()).collect();
        if new_deltas.is_empty() {
            log::debug!("No new deltas for {}", self.name);
            return Ok(self.clone());
        }
        log::debug!("Folding {} new deltas into {}", new_deltas.len(), self.name);

        let mut map = (*self.map).clone();
        let header = self.fold_deltas(new_deltas.iter().copied(), last_header.clone(), &mut map)?;
        let files = new_deltas.into_iter().fold(files.clone(), |group, delta| group.with_delta(delta.clone()));
        Ok(self.persisted(files, header, Arc::new(map)))
    }

    fn load(&self, files: FileGroup) -> Result<Self> {
        let full = files.full_file()?;
        let mut input = open_reader(&full.path(), full.compression())?;
        let header = Header::read_from(&mut input)?;
        if !header.is_full() {
            return Err(Error::header_mismatch(format!("{} does not start with a full file header: {}", full, header)));
        }
        if header.name() != self.name {
            return Err(Error::header_mismatch(format!(
                "{} belongs to '{}', expected '{}'",
                full,
                header.name(),
                self.name
            )));
        }

        let mut map = HashMap::new();
        read_records(&mut input, &header, &self.codecs, &mut map, &full.file_name())?;
        let last_header = self.fold_deltas(files.delta_files().iter(), header, &mut map)?;
        log::debug!(
            "Loaded {} with {} deltas: {} entries",
            full,
            files.delta_files().len(),
            map.len()
        );
        Ok(self.persisted(files, last_header, Arc::new(map)))
    }

    fn fold_deltas<'f>(
        &self,
        deltas: impl IntoIterator<Item = &'f PermaFile>,
        mut previous: Header,
        map: &mut HashMap<K, V>,
    ) -> Result<Header> {
        for delta in deltas {
            let mut input = open_reader(&delta.path(), delta.compression())?;
            let header = Header::read_from(&mut input)?;
            if !header.is_next_delta_of(&previous) {
                return Err(Error::header_mismatch(format!(
                    "{} does not continue the chain: expected the delta after {}, found {}",
                    delta, previous, header
                )));
            }
            read_records(&mut input, &header, &self.codecs, map, &delta.file_name())?;
            previous = header;
        }
        Ok(previous)
    }

    fn write_full(&self, previous: &FileGroup, map: Arc<HashMap<K, V>>) -> Result<Self> {
        let file = previous.next_full_file(self.compression)?;
        let header = Header::new_full(&self.name, map.len())?;
        delete_orphan_deltas(&self.dir, &self.name, file.full_number())?;
        self.write_file(&file, &header, map.iter(), std::iter::empty())?;

        let files = previous.with_full(file);
        let deleted = files.delete_superseded()?;
        if deleted > 0 {
            log::debug!("Deleted {} superseded files of {}", deleted, self.name);
        }
        Ok(self.persisted(files, header, map))
    }

    fn write_file<'a, U, D>(&self, file: &PermaFile, header: &Header, new_or_updated: U, deleted: D) -> Result<()>
    where
        K: 'a,
        V: 'a,
        U: IntoIterator<Item = (&'a K, &'a V)>,
        D: IntoIterator<Item = &'a K>,
    {
        let stale = temp::delete_stale(&self.dir, &self.name)?;
        if stale > 0 {
            log::debug!("Deleted {} stale temp files of {}", stale, self.name);
        }

        let temp = TempFile::new(&self.dir, &self.name);
        temp.write(file.compression(), |out| write_map_file(out, header, new_or_updated, deleted, &self.codecs))?;
        temp.commit(&file.path())?;
        log::debug!("Wrote {} ({} records)", file, header.entry_count());
        Ok(())
    }

    fn persisted(&self, files: FileGroup, last_header: Header, map: Arc<HashMap<K, V>>) -> Self {
        Self { state: State::Persisted { files, last_header }, map, ..self.clone() }
    }
}

impl<K, V> Clone for MapSnapshot<K, V> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            name: self.name.clone(),
            compression: self.compression,
            codecs: self.codecs.clone(),
            threshold: Arc::clone(&self.threshold),
            state: self.state.clone(),
            map: Arc::clone(&self.map),
        }
    }
}

impl<K, V> fmt::Debug for MapSnapshot<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapSnapshot")
            .field("dir", &self.dir)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("entries", &self.map.len())
            .finish()
    }
}
