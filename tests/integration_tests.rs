// Integration Tests for Perma
// These tests exercise the snapshot engine and the facades through files on disk

use perma::codec::{BincodeCodec, Codecs, I32Codec, StringCodec};
use perma::{CompressionType, MapSnapshot, Options, ReadOnlyPerMa, WritablePerMa, WritablePerMaSet};
use serde::{Deserialize, Serialize};
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

fn orders(entries: &[(&str, i32)]) -> HashMap<String, i32> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn open_orders(dir: &Path, options: &Options) -> MapSnapshot<String, i32> {
    MapSnapshot::load_or_create(dir, "orders", options, Codecs::new(StringCodec, I32Codec)).unwrap()
}

/// Test the full life cycle: full file, two deltas, refresh, compaction
#[test]
fn test_orders_end_to_end() {
    env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();
    // a single removal out of two entries stays a delta
    let options = Options::default().compact_threshold_percent(50);

    let snapshot = open_orders(dir.path(), &options);
    assert!(!snapshot.is_persisted());
    let reader = open_orders(dir.path(), &options);

    let snapshot = snapshot.write_next(&orders(&[("a", 1)])).unwrap();
    assert_eq!(file_names(dir.path()), vec!["orders_1_0.perma"]);
    assert_eq!(snapshot.header().unwrap().entry_count(), 1);

    let snapshot = snapshot.write_next(&orders(&[("a", 1), ("b", 2)])).unwrap();
    assert_eq!(file_names(dir.path()), vec!["orders_1_0.perma", "orders_1_1.perma"]);
    assert_eq!(snapshot.header().unwrap().entry_count(), 1);

    let snapshot = snapshot.write_next(&orders(&[("b", 2)])).unwrap();
    assert_eq!(
        file_names(dir.path()),
        vec!["orders_1_0.perma", "orders_1_1.perma", "orders_1_2.perma"]
    );
    assert_eq!(snapshot.header().unwrap().sequence(), 2);

    let refreshed = reader.refresh().unwrap();
    assert_eq!(refreshed.map().as_ref(), &orders(&[("b", 2)]));

    let compacted = snapshot.compact().unwrap();
    assert_eq!(file_names(dir.path()), vec!["orders_2_0.perma"]);
    assert!(compacted.header().unwrap().is_full());
    assert_eq!(open_orders(dir.path(), &options).map().as_ref(), &orders(&[("b", 2)]));

    // the refreshed handle notices the new generation
    let reloaded = refreshed.refresh().unwrap();
    assert_eq!(reloaded.file_group().unwrap().full_file().unwrap().full_number(), 2);
    assert_eq!(reloaded.map().as_ref(), &orders(&[("b", 2)]));
}

/// Test reading back a map written by another handle
#[test]
fn test_map_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let map = WritablePerMa::load_or_create_string_map(dir.path(), "cities", &Options::default()).unwrap();
        for i in 0..100 {
            map.insert(format!("city_{}", i), format!("zip_{}", i));
        }
        map.persist().unwrap();
        for i in 0..10 {
            map.insert(format!("city_{}", i), format!("new_zip_{}", i));
        }
        map.persist().unwrap();
    }

    let map = WritablePerMa::load_or_create_string_map(dir.path(), "cities", &Options::default()).unwrap();
    assert_eq!(map.len(), 100);
    assert_eq!(map.get("city_5"), Some("new_zip_5".to_string()));
    assert_eq!(map.get("city_50"), Some("zip_50".to_string()));
}

/// Test that several names share one directory without interfering
#[test]
fn test_names_are_independent() {
    let dir = TempDir::new().unwrap();
    let a = WritablePerMa::load_or_create_string_map(dir.path(), "map", &Options::default()).unwrap();
    let b = WritablePerMa::load_or_create_string_map(dir.path(), "map_1", &Options::default()).unwrap();

    a.insert("k".to_string(), "a".to_string());
    b.insert("k".to_string(), "b".to_string());
    a.persist().unwrap();
    b.persist().unwrap();
    a.compact().unwrap();

    let a = WritablePerMa::load_or_create_string_map(dir.path(), "map", &Options::default()).unwrap();
    let b = WritablePerMa::load_or_create_string_map(dir.path(), "map_1", &Options::default()).unwrap();
    assert_eq!(a.get("k"), Some("a".to_string()));
    assert_eq!(b.get("k"), Some("b".to_string()));
    assert!(dir.path().join("map_1_1_0.perma").exists());
}

/// Test every compression mode over a full chain
#[test]
fn test_compression_modes() {
    let mut modes = vec![CompressionType::None, CompressionType::Gzip];
    #[cfg(feature = "snappy")]
    modes.push(CompressionType::Snappy);

    for compression in modes {
        let dir = TempDir::new().unwrap();
        let options = Options::default().compression(compression);
        let map = WritablePerMa::load_or_create_string_map(dir.path(), "compressed", &options).unwrap();
        for i in 0..50 {
            map.insert(format!("key{}", i), "x".repeat(100));
        }
        map.persist().unwrap();
        map.insert("extra".to_string(), "y".to_string());
        map.persist().unwrap();

        let expected = vec![
            format!("compressed_1_0{}", compression.file_suffix()),
            format!("compressed_1_1{}", compression.file_suffix()),
        ];
        assert_eq!(file_names(dir.path()), expected);

        let reader =
            ReadOnlyPerMa::load(dir.path(), "compressed", &Options::default(), Codecs::strings()).unwrap();
        assert_eq!(reader.len(), 51);
        assert_eq!(reader.get("extra"), Some("y".to_string()));
    }
}

/// Test switching compression: deltas keep the compression of their full file
#[test]
fn test_compression_switch_applies_to_next_full_file() {
    let dir = TempDir::new().unwrap();
    {
        let map = WritablePerMa::load_or_create_string_map(dir.path(), "m", &Options::default()).unwrap();
        map.insert("a".to_string(), "1".to_string());
        map.persist().unwrap();
    }

    let options = Options::default().compress(true);
    let map = WritablePerMa::load_or_create_string_map(dir.path(), "m", &options).unwrap();
    map.insert("b".to_string(), "2".to_string());
    map.persist().unwrap();
    assert_eq!(file_names(dir.path()), vec!["m_1_0.perma", "m_1_1.perma"]);

    map.compact().unwrap();
    assert_eq!(file_names(dir.path()), vec!["m_2_0.perma.gzip"]);
    assert_eq!(
        WritablePerMa::load_or_create_string_map(dir.path(), "m", &Options::default()).unwrap().len(),
        2
    );
}

/// Test a set of strings through reopen
#[test]
fn test_set_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let set = WritablePerMaSet::load_or_create_string_set(dir.path(), "tags", &Options::default()).unwrap();
        set.update(|s| s.extend(["a", "b", "c"].map(String::from)));
        set.persist().unwrap();
        set.remove("b");
        set.persist().unwrap();
    }

    let set = WritablePerMaSet::load_or_create_string_set(dir.path(), "tags", &Options::default()).unwrap();
    assert_eq!(set.len(), 2);
    assert!(set.contains("a"));
    assert!(!set.contains("b"));
}

/// Test structured values through the bincode codec
#[test]
fn test_bincode_values() {
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        items: Vec<String>,
        total: f64,
    }

    let dir = TempDir::new().unwrap();
    let codecs = Codecs::new(StringCodec, BincodeCodec::<Order>::new());
    let order = Order { id: 7, items: vec!["tea".into(), "scone".into()], total: 9.5 };

    let map = WritablePerMa::load_or_create(dir.path(), "orders", &Options::default(), codecs.clone()).unwrap();
    map.insert("o7".to_string(), order.clone());
    map.persist().unwrap();

    let reopened = WritablePerMa::load_or_create(dir.path(), "orders", &Options::default(), codecs).unwrap();
    assert_eq!(reopened.get("o7"), Some(order));
}

/// Test options loaded from JSON
#[test]
fn test_options_from_json() {
    let dir = TempDir::new().unwrap();
    let options = Options::from_json(r#"{"compress": true, "compactThresholdPercent": 10}"#).unwrap();
    let map = WritablePerMa::load_or_create_string_map(dir.path(), "json", &options).unwrap();
    map.insert("a".to_string(), "1".to_string());
    map.persist().unwrap();
    assert_eq!(file_names(dir.path()), vec!["json_1_0.perma.gzip"]);
}
