//! Difference between two map snapshots.

use std::collections::HashMap;
use std::hash::Hash;

/// Entries that differ between an old and a new map, computed in one pass
/// over each map.
#[derive(Debug)]
pub struct MapDifference<'a, K, V> {
    /// Keys present only in the old map.
    pub only_in_old: Vec<&'a K>,
    /// Entries present only in the new map.
    pub only_in_new: Vec<(&'a K, &'a V)>,
    /// Keys in both maps with different values, paired with the new value.
    pub differing: Vec<(&'a K, &'a V)>,
}

impl<'a, K, V> MapDifference<'a, K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
    /// Compares `old` to `new`.
    pub fn between(old: &'a HashMap<K, V>, new: &'a HashMap<K, V>) -> Self {
        let mut only_in_new = Vec::new();
        let mut differing = Vec::new();
        for (key, value) in new {
            match old.get(key) {
                None => only_in_new.push((key, value)),
                Some(old_value) if old_value != value => differing.push((key, value)),
                Some(_) => {}
            }
        }
        let only_in_old = old.keys().filter(|key| !new.contains_key(*key)).collect();
        Self { only_in_old, only_in_new, differing }
    }

    /// Returns true if both maps hold the same entries.
    pub fn are_equal(&self) -> bool {
        self.only_in_old.is_empty() && self.only_in_new.is_empty() && self.differing.is_empty()
    }

    /// Number of records a delta for this difference holds.
    pub fn len(&self) -> usize {
        self.only_in_old.len() + self.only_in_new.len() + self.differing.len()
    }

    /// Returns true if there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.are_equal()
    }

    /// Added and changed entries: the new or updated records of a delta.
    pub fn upserts(&self) -> impl Iterator<Item = (&'a K, &'a V)> + '_ {
        self.only_in_new.iter().chain(self.differing.iter()).copied()
    }
}
