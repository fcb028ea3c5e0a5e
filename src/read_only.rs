//! Read-only views of a persistent map and set.

use crate::codec::{Codec, Codecs, StringCodec};
use crate::config::Options;
use crate::error::Result;
use crate::snapshot::MapSnapshot;
use parking_lot::{Mutex, RwLock};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

/// A map read from files written by another handle, possibly in another
/// process, and updated by [`refresh`](Self::refresh).
///
/// Readers always see a complete snapshot: refresh builds the new map aside
/// and swaps it in only on success.
pub struct ReadOnlyPerMa<K, V> {
    map: RwLock<Arc<HashMap<K, V>>>,
    snapshot: Mutex<MapSnapshot<K, V>>,
}

impl<K, V> ReadOnlyPerMa<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
{
    /// Loads the map `name` from `dir`. Never creates the directory.
    ///
    /// A directory without files of `name` yields an empty map that a later
    /// refresh fills.
    pub fn load(dir: impl AsRef<Path>, name: &str, options: &Options, codecs: Codecs<K, V>) -> Result<Self> {
        let options = options.clone().create_if_missing(false);
        let snapshot = MapSnapshot::load_or_create(dir, name, &options, codecs)?;
        log::info!(
            "Loaded read-only map {} from {} with {} entries",
            name,
            snapshot.dir().display(),
            snapshot.map().len()
        );
        Ok(Self { map: RwLock::new(Arc::clone(snapshot.map())), snapshot: Mutex::new(snapshot) })
    }

    /// The current map.
    pub fn map(&self) -> Arc<HashMap<K, V>> {
        Arc::clone(&self.map.read())
    }

    /// Returns a clone of the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.read().get(key).cloned()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Reads files written since the last load or refresh.
    ///
    /// Returns true if the map changed. On error the current map stays in
    /// place.
    pub fn refresh(&self) -> Result<bool> {
        let mut snapshot = self.snapshot.lock();
        let next = snapshot.refresh()?;
        let changed = !Arc::ptr_eq(next.map(), snapshot.map());
        if changed {
            log::debug!("Refreshed map {} to {} entries", next.name(), next.map().len());
            *self.map.write() = Arc::clone(next.map());
        }
        *snapshot = next;
        Ok(changed)
    }
}

/// A set read from files written by a [`WritablePerMaSet`](crate::WritablePerMaSet),
/// updated by [`refresh`](Self::refresh).
pub struct ReadOnlyPerMaSet<T> {
    set: RwLock<Arc<HashSet<T>>>,
    snapshot: Mutex<MapSnapshot<T, ()>>,
}

impl<T> ReadOnlyPerMaSet<T>
where
    T: Eq + Hash + Clone,
{
    /// Loads the set `name` from `dir`. Never creates the directory.
    pub fn load(dir: impl AsRef<Path>, name: &str, options: &Options, codec: impl Codec<T> + 'static) -> Result<Self> {
        let options = options.clone().create_if_missing(false);
        let snapshot = MapSnapshot::load_or_create(dir, name, &options, Codecs::set(codec))?;
        log::info!(
            "Loaded read-only set {} from {} with {} elements",
            name,
            snapshot.dir().display(),
            snapshot.map().len()
        );
        let set = snapshot.map().keys().cloned().collect();
        Ok(Self { set: RwLock::new(Arc::new(set)), snapshot: Mutex::new(snapshot) })
    }

    /// The current set.
    pub fn set(&self) -> Arc<HashSet<T>> {
        Arc::clone(&self.set.read())
    }

    /// Returns true if the set contains `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.set.read().contains(value)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.set.read().len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.set.read().is_empty()
    }

    /// Reads files written since the last load or refresh.
    ///
    /// Returns true if the set changed. On error the current set stays in
    /// place.
    pub fn refresh(&self) -> Result<bool> {
        let mut snapshot = self.snapshot.lock();
        let next = snapshot.refresh()?;
        let changed = !Arc::ptr_eq(next.map(), snapshot.map());
        if changed {
            log::debug!("Refreshed set {} to {} elements", next.name(), next.map().len());
            *self.set.write() = Arc::new(next.map().keys().cloned().collect());
        }
        *snapshot = next;
        Ok(changed)
    }
}

impl ReadOnlyPerMaSet<String> {
    /// Loads a set of UTF-8 strings.
    pub fn load_string_set(dir: impl AsRef<Path>, name: &str, options: &Options) -> Result<Self> {
        Self::load(dir, name, options, StringCodec)
    }
}
