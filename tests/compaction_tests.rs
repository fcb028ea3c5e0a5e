// Compaction Tests for Perma
// These tests verify when deltas are rolled into a new full file and what is left on disk

use perma::codec::{Codecs, I32Codec, StringCodec};
use perma::{ChangedRemovedThreshold, CompactionThreshold, MapSnapshot, Options, WritablePerMa};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

fn numbered(n: i32) -> HashMap<String, i32> {
    (0..n).map(|i| (format!("k{:03}", i), i)).collect()
}

fn open(dir: &Path, percent: u32) -> MapSnapshot<String, i32> {
    let options = Options::default().compact_threshold_percent(percent);
    MapSnapshot::load_or_create(dir, "data", &options, Codecs::new(StringCodec, I32Codec)).unwrap()
}

/// Test the threshold boundary on a map of 100 entries
#[test]
fn test_threshold_boundary_hundred() {
    let dir = TempDir::new().unwrap();
    let base = numbered(100);

    // 33 of 100 changed: delta
    let snapshot = open(dir.path(), 33).write_next(&base).unwrap();
    let mut current = base.clone();
    for i in 0..33 {
        current.insert(format!("k{:03}", i), -i - 1);
    }
    let snapshot = snapshot.write_next(&current).unwrap();
    assert!(!snapshot.header().unwrap().is_full());
    assert_eq!(file_names(dir.path()).len(), 2);

    // 34 of 100 changed: compaction
    let mut current = snapshot.map().as_ref().clone();
    for i in 0..34 {
        current.insert(format!("k{:03}", i), 1000 + i);
    }
    let snapshot = snapshot.write_next(&current).unwrap();
    assert!(snapshot.header().unwrap().is_full());
    assert_eq!(file_names(dir.path()), vec!["data_2_0.perma"]);
}

/// Test the threshold boundary on a map of 9 entries
#[test]
fn test_threshold_boundary_nine() {
    let dir = TempDir::new().unwrap();
    let snapshot = open(dir.path(), 33).write_next(&numbered(9)).unwrap();

    // 2 removed of 9: 22% stays below 33%
    let mut current = numbered(9);
    current.remove("k000");
    current.remove("k001");
    let snapshot = snapshot.write_next(&current).unwrap();
    assert!(!snapshot.header().unwrap().is_full());

    let dir = TempDir::new().unwrap();
    let snapshot = open(dir.path(), 33).write_next(&numbered(9)).unwrap();
    // 3 removed of 9: 33.3% exceeds 33%
    let mut current = numbered(9);
    for key in ["k000", "k001", "k002"] {
        current.remove(key);
    }
    let snapshot = snapshot.write_next(&current).unwrap();
    assert!(snapshot.header().unwrap().is_full());
    assert_eq!(snapshot.map().len(), 6);
}

/// Test that added entries never count towards the threshold
#[test]
fn test_additions_do_not_compact() {
    let dir = TempDir::new().unwrap();
    let mut snapshot = open(dir.path(), 33).write_next(&numbered(1)).unwrap();
    for n in 2..=20 {
        snapshot = snapshot.write_next(&numbered(n)).unwrap();
    }
    assert_eq!(file_names(dir.path()).len(), 20);
    assert_eq!(snapshot.header().unwrap().sequence(), 19);
    assert_eq!(open(dir.path(), 33).map().as_ref(), &numbered(20));
}

/// Test that a threshold of 0 compacts on every write
#[test]
fn test_zero_threshold_always_compacts() {
    let dir = TempDir::new().unwrap();
    let mut snapshot = open(dir.path(), 0).write_next(&numbered(3)).unwrap();
    snapshot = snapshot.write_next(&numbered(4)).unwrap();
    snapshot = snapshot.write_next(&numbered(5)).unwrap();
    assert_eq!(file_names(dir.path()), vec!["data_3_0.perma"]);
    assert_eq!(snapshot.map().len(), 5);
}

/// Test that a threshold of 100 never compacts on its own
#[test]
fn test_full_threshold_never_compacts() {
    let dir = TempDir::new().unwrap();
    let snapshot = open(dir.path(), 100).write_next(&numbered(10)).unwrap();
    let snapshot = snapshot.write_next(&HashMap::new()).unwrap();
    assert!(!snapshot.header().unwrap().is_full());
    assert_eq!(snapshot.header().unwrap().entry_count(), 10);
    assert!(open(dir.path(), 100).map().is_empty());
}

/// Test that compaction leaves exactly one full file with the logical content
#[test]
fn test_compaction_reduces_file_count() {
    let dir = TempDir::new().unwrap();
    let mut snapshot = open(dir.path(), 100).write_next(&numbered(10)).unwrap();
    let mut current = numbered(10);
    for i in 0..5 {
        current.insert(format!("extra{}", i), i);
        current.remove(&format!("k{:03}", i));
        snapshot = snapshot.write_next(&current).unwrap();
    }
    assert_eq!(file_names(dir.path()).len(), 6);

    let compacted = snapshot.compact().unwrap();
    assert_eq!(file_names(dir.path()), vec!["data_2_0.perma"]);
    assert_eq!(compacted.map().as_ref(), &current);
    assert_eq!(compacted.file_group().unwrap().delta_files().len(), 0);
    assert_eq!(open(dir.path(), 100).map().as_ref(), &current);
}

/// Test that generations keep counting up across compactions
#[test]
fn test_repeated_compaction() {
    let dir = TempDir::new().unwrap();
    let map = WritablePerMa::load_or_create_string_map(dir.path(), "gen", &Options::default()).unwrap();
    for generation in 1..=5 {
        map.insert(format!("k{}", generation), generation.to_string());
        map.compact().unwrap();
        assert_eq!(file_names(dir.path()), vec![format!("gen_{}_0.perma", generation)]);
    }
    assert_eq!(map.persisted().len(), 5);
}

/// A policy compacting once the chain would grow past a fixed number of deltas
#[derive(Debug)]
struct MaxDeltas {
    max: usize,
    written: std::sync::atomic::AtomicUsize,
}

impl CompactionThreshold for MaxDeltas {
    fn trigger(&self, _removed: usize, _changed: usize, _previous_total: usize) -> bool {
        let written = self.written.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        if written > self.max {
            self.written.store(0, std::sync::atomic::Ordering::SeqCst);
            return true;
        }
        false
    }
}

/// Test a custom compaction policy
#[test]
fn test_custom_policy() {
    let dir = TempDir::new().unwrap();
    let policy = MaxDeltas { max: 2, written: Default::default() };
    let mut snapshot = open(dir.path(), 33).with_threshold(policy).write_next(&numbered(1)).unwrap();
    for n in 2..=4 {
        snapshot = snapshot.write_next(&numbered(n)).unwrap();
    }
    // two deltas, then the third write compacts
    assert_eq!(file_names(dir.path()), vec!["data_2_0.perma"]);
    assert_eq!(snapshot.map().len(), 4);

    let default_policy = ChangedRemovedThreshold::default();
    assert_eq!(default_policy.percent(), 33);
}
