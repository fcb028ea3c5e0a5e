//! Writable persistent set.
//!
//! A set is stored as a map whose values are all null.

use crate::codec::{Codec, Codecs, StringCodec};
use crate::config::Options;
use crate::error::Result;
use crate::snapshot::MapSnapshot;
use parking_lot::{Mutex, RwLock};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::Path;

/// A live in-memory set that is persisted on demand.
///
/// Works like [`WritablePerMa`](crate::WritablePerMa) with set semantics.
pub struct WritablePerMaSet<T> {
    live: RwLock<HashSet<T>>,
    snapshot: Mutex<MapSnapshot<T, ()>>,
}

impl<T> WritablePerMaSet<T>
where
    T: Eq + Hash + Clone,
{
    /// Loads the set `name` from `dir`, or starts an empty one.
    pub fn load_or_create(
        dir: impl AsRef<Path>,
        name: &str,
        options: &Options,
        codec: impl Codec<T> + 'static,
    ) -> Result<Self> {
        let snapshot = MapSnapshot::load_or_create(dir, name, options, Codecs::set(codec))?;
        log::info!(
            "Loaded set {} from {} with {} elements",
            name,
            snapshot.dir().display(),
            snapshot.map().len()
        );
        let live = snapshot.map().keys().cloned().collect();
        Ok(Self { live: RwLock::new(live), snapshot: Mutex::new(snapshot) })
    }

    /// Returns true if the live set contains `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.live.read().contains(value)
    }

    /// Number of elements in the live set.
    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    /// Returns true if the live set is empty.
    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }

    /// Adds an element; returns false if it was already present.
    pub fn insert(&self, value: T) -> bool {
        self.live.write().insert(value)
    }

    /// Removes an element; returns true if it was present.
    pub fn remove<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.live.write().remove(value)
    }

    /// Removes all elements.
    pub fn clear(&self) {
        self.live.write().clear();
    }

    /// Runs `f` with exclusive access to the live set.
    pub fn update<R>(&self, f: impl FnOnce(&mut HashSet<T>) -> R) -> R {
        f(&mut self.live.write())
    }

    /// Copy of the live set.
    pub fn to_set(&self) -> HashSet<T> {
        self.live.read().clone()
    }

    /// Writes the changes of the live set since the last persist.
    pub fn persist(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        let next = snapshot.write_next(&self.live_as_map())?;
        log::debug!("Persisted set {} with {} elements", next.name(), next.map().len());
        *snapshot = next;
        Ok(())
    }

    /// Writes the live set as a new full file and deletes the older files.
    pub fn compact(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        let next = snapshot.compact_to(&self.live_as_map())?;
        log::info!("Compacted set {} to {} elements", next.name(), next.map().len());
        *snapshot = next;
        Ok(())
    }

    fn live_as_map(&self) -> HashMap<T, ()> {
        self.live.read().iter().map(|value| (value.clone(), ())).collect()
    }
}

impl WritablePerMaSet<String> {
    /// Loads a set of UTF-8 strings.
    pub fn load_or_create_string_set(dir: impl AsRef<Path>, name: &str, options: &Options) -> Result<Self> {
        Self::load_or_create(dir, name, options, StringCodec)
    }
}
