//! Writable persistent map.

use crate::codec::Codecs;
use crate::config::Options;
use crate::error::Result;
use crate::snapshot::MapSnapshot;
use parking_lot::{Mutex, RwLock};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

/// A live in-memory map that is persisted on demand.
///
/// Reads and writes go to the live map only. [`persist`](Self::persist)
/// writes the changes since the last persist as a delta file (or a new full
/// file once the compaction threshold trips).
///
/// # Thread Safety
///
/// `WritablePerMa` can be shared across threads using `Arc<WritablePerMa>`.
/// Persisting holds a read lock on the live map while computing the
/// difference, so concurrent writers cannot tear it.
pub struct WritablePerMa<K, V> {
    /// The map callers read and modify
    live: RwLock<HashMap<K, V>>,

    /// State of the files; the lock serializes persist and compact
    snapshot: Mutex<MapSnapshot<K, V>>,
}

impl<K, V> WritablePerMa<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
{
    /// Loads the map `name` from `dir`, or starts an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name or options are invalid
    /// - The directory is missing and `create_if_missing` is off
    /// - The files are corrupted or do not form a valid chain
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use perma::codec::{Codecs, I64Codec, StringCodec};
    /// use perma::{Options, WritablePerMa};
    ///
    /// # fn main() -> Result<(), perma::Error> {
    /// let orders = WritablePerMa::load_or_create(
    ///     "./data",
    ///     "orders",
    ///     &Options::default(),
    ///     Codecs::new(StringCodec, I64Codec),
    /// )?;
    /// orders.insert("order-1".to_string(), 120);
    /// orders.persist()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_or_create(dir: impl AsRef<Path>, name: &str, options: &Options, codecs: Codecs<K, V>) -> Result<Self> {
        let snapshot = MapSnapshot::load_or_create(dir, name, options, codecs)?;
        log::info!(
            "Loaded map {} from {} with {} entries",
            name,
            snapshot.dir().display(),
            snapshot.map().len()
        );
        Ok(Self { live: RwLock::new(snapshot.map().as_ref().clone()), snapshot: Mutex::new(snapshot) })
    }

    /// Returns a clone of the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.live.read().get(key).cloned()
    }

    /// Returns true if the live map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.live.read().contains_key(key)
    }

    /// Number of entries in the live map.
    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    /// Returns true if the live map is empty.
    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }

    /// Inserts an entry, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.live.write().insert(key, value)
    }

    /// Removes an entry, returning its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.live.write().remove(key)
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.live.write().clear();
    }

    /// Runs `f` with exclusive access to the live map.
    pub fn update<R>(&self, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        f(&mut self.live.write())
    }

    /// Copy of the live map.
    pub fn to_map(&self) -> HashMap<K, V> {
        self.live.read().clone()
    }

    /// The map as of the last successful persist, compact or load.
    pub fn persisted(&self) -> Arc<HashMap<K, V>> {
        Arc::clone(self.snapshot.lock().map())
    }

    /// Writes the changes of the live map since the last persist.
    pub fn persist(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        let next = {
            let live = self.live.read();
            snapshot.write_next(&live)?
        };
        log::debug!("Persisted map {} with {} entries", next.name(), next.map().len());
        *snapshot = next;
        Ok(())
    }

    /// Writes the live map as a new full file and deletes the older files.
    pub fn compact(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        let next = {
            let live = self.live.read();
            snapshot.compact_to(&live)?
        };
        log::info!("Compacted map {} to {} entries", next.name(), next.map().len());
        *snapshot = next;
        Ok(())
    }
}

impl WritablePerMa<String, String> {
    /// Loads a map with UTF-8 keys and values.
    pub fn load_or_create_string_map(dir: impl AsRef<Path>, name: &str, options: &Options) -> Result<Self> {
        Self::load_or_create(dir, name, options, Codecs::strings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{OptionCodec, StringCodec};
    use tempfile::TempDir;

    #[test]
    fn test_insert_and_persist() {
        let dir = TempDir::new().unwrap();
        let map = WritablePerMa::load_or_create_string_map(dir.path(), "orders", &Options::default()).unwrap();
        assert!(map.is_empty());

        map.insert("a".to_string(), "1".to_string());
        map.insert("b".to_string(), "2".to_string());
        assert_eq!(map.get("a"), Some("1".to_string()));
        assert!(map.persisted().is_empty());

        map.persist().unwrap();
        assert_eq!(map.persisted().len(), 2);

        let reopened = WritablePerMa::load_or_create_string_map(dir.path(), "orders", &Options::default()).unwrap();
        assert_eq!(reopened.to_map(), map.to_map());
    }

    #[test]
    fn test_remove_clear_update() {
        let dir = TempDir::new().unwrap();
        let map = WritablePerMa::load_or_create_string_map(dir.path(), "orders", &Options::default()).unwrap();
        map.update(|m| {
            for i in 0..5 {
                m.insert(format!("k{}", i), format!("v{}", i));
            }
        });
        assert_eq!(map.len(), 5);
        assert_eq!(map.remove("k0"), Some("v0".to_string()));
        assert!(!map.contains_key("k0"));
        map.persist().unwrap();

        map.clear();
        map.persist().unwrap();
        let reopened = WritablePerMa::load_or_create_string_map(dir.path(), "orders", &Options::default()).unwrap();
        assert!(reopened.is_empty());
    }

    #[test]
    fn test_compact_persists_pending_changes() {
        let dir = TempDir::new().unwrap();
        let map = WritablePerMa::load_or_create_string_map(dir.path(), "orders", &Options::default()).unwrap();
        map.insert("a".to_string(), "1".to_string());
        map.persist().unwrap();
        map.insert("b".to_string(), "2".to_string());
        map.persist().unwrap();
        map.insert("c".to_string(), "3".to_string());

        map.compact().unwrap();
        assert_eq!(map.persisted().len(), 3);
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert!(dir.path().join("orders_2_0.perma").exists());
    }

    #[test]
    fn test_nullable_values() {
        let dir = TempDir::new().unwrap();
        let codecs = Codecs::new(StringCodec, OptionCodec(StringCodec));
        let map = WritablePerMa::load_or_create(dir.path(), "nullable", &Options::default(), codecs.clone()).unwrap();
        map.insert("present".to_string(), Some("x".to_string()));
        map.insert("absent".to_string(), None);
        map.persist().unwrap();

        let reopened = WritablePerMa::load_or_create(dir.path(), "nullable", &Options::default(), codecs).unwrap();
        assert_eq!(reopened.get("present"), Some(Some("x".to_string())));
        assert_eq!(reopened.get("absent"), Some(None));
    }
}
