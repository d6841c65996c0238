use std::fs;

use tempfile::tempdir;

use rank_triplets::{InteractionStore, SamplerError, Snapshot, StoreConfig};

const SNAPSHOT_JSON: &str = r#"{
  "users": 4,
  "popularity": { "0": 0.1, "1": 0.2, "2": 0.3, "3": 0.9, "4": 0.5 },
  "thresholds": { "high": 0.5, "low": 0.15 },
  "prefs": {
    "0": { "train": [1, 2] },
    "1": { "train": [0], "test_te": [3] },
    "2": { "vad_tr": [3, 4] },
    "3": { "test_tr": [2], "test_te": [0] }
  }
}"#;

fn json_snapshot() -> Snapshot {
    Snapshot::decode(SNAPSHOT_JSON.as_bytes(), "inline").unwrap()
}

#[test]
fn loads_json_file_and_builds_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    fs::write(&path, SNAPSHOT_JSON).unwrap();

    let store = InteractionStore::load(&path, &StoreConfig::default()).unwrap();
    assert_eq!(store.user_count(), 4);
    assert_eq!(store.item_count(), 5);
    assert_eq!(store.train_size(), 6);
    assert_eq!(store.thresholds().get("high"), Some(&0.5));
    assert_eq!(store.item_users(3), &[2]);
    assert_eq!(store.item_users(2), &[0, 3]);
    assert!(store.is_positive(1, 3));

    let evaluation = store.evaluation_data();
    assert_eq!(evaluation.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    for (&user, case) in evaluation {
        assert_eq!(case.negatives.len(), 100);
        assert!(case.negatives.iter().all(|&item| !store.is_positive(user, item)));
    }
    assert_eq!(evaluation[&1].held_out, vec![3]);
}

#[test]
fn bitcode_and_json_snapshots_build_identical_stores() {
    let dir = tempdir().unwrap();
    let snapshot = json_snapshot();
    let json_path = dir.path().join("a.json");
    let bin_path = dir.path().join("a.bin");
    snapshot.write_json(&json_path).unwrap();
    snapshot.write_bitcode(&bin_path).unwrap();

    let config = StoreConfig::default();
    let from_json = InteractionStore::load(&json_path, &config).unwrap();
    let from_bin = InteractionStore::load(&bin_path, &config).unwrap();
    assert_eq!(from_json.train_pairs(), from_bin.train_pairs());
    assert_eq!(from_json.popularity(), from_bin.popularity());
    assert_eq!(from_json.evaluation_data(), from_bin.evaluation_data());
}

#[test]
fn directory_prefers_bitcode_then_json() {
    let dir = tempdir().unwrap();
    let snapshot = json_snapshot();
    snapshot.write_json(dir.path().join("data.json")).unwrap();
    let store = InteractionStore::load(dir.path(), &StoreConfig::default()).unwrap();
    assert_eq!(store.train_size(), 6);

    let mut smaller = snapshot.clone();
    smaller.prefs.remove(&2);
    smaller.write_bitcode(dir.path().join("data.bin")).unwrap();
    let store = InteractionStore::load(dir.path(), &StoreConfig::default()).unwrap();
    assert_eq!(store.train_size(), 4);
}

#[test]
fn limit_drops_pairs_and_rebuilds_neighbors() {
    let config = StoreConfig {
        limit: Some(2),
        ..StoreConfig::default()
    };
    let store = InteractionStore::from_snapshot(json_snapshot(), &config).unwrap();
    assert_eq!(store.train_size(), 3);
    assert!(store.train_pairs().iter().all(|pair| pair.user < 2));
    assert_eq!(store.item_users(2), &[0]);
    assert!(store.item_users(3).is_empty());
    assert!(store.item_users(4).is_empty());
    assert_eq!(store.max_neighbors_per_item(), 1);
    // Positives still cover every split for every user.
    assert!(store.is_positive(2, 4));
}

#[test]
fn evaluation_negatives_follow_the_store_seed() {
    let seeded = |seed| StoreConfig {
        seed,
        ..StoreConfig::default()
    };
    let a = InteractionStore::from_snapshot(json_snapshot(), &seeded(1)).unwrap();
    let b = InteractionStore::from_snapshot(json_snapshot(), &seeded(1)).unwrap();
    let c = InteractionStore::from_snapshot(json_snapshot(), &seeded(2)).unwrap();
    assert_eq!(a.evaluation_data(), b.evaluation_data());
    assert_ne!(a.evaluation_data(), c.evaluation_data());
}

#[test]
fn missing_and_malformed_files_are_load_errors() {
    let dir = tempdir().unwrap();
    let missing = InteractionStore::load(dir.path().join("nope.json"), &StoreConfig::default());
    assert!(matches!(missing, Err(SamplerError::DataLoad { .. })));

    let empty_dir = InteractionStore::load(dir.path(), &StoreConfig::default());
    assert!(matches!(empty_dir, Err(SamplerError::DataLoad { .. })));

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, b"{ not json").unwrap();
    let err = InteractionStore::load(&garbage, &StoreConfig::default()).unwrap_err();
    match err {
        SamplerError::DataLoad { snapshot, .. } => assert!(snapshot.ends_with("garbage.json")),
        other => panic!("unexpected error {other:?}"),
    }

    let truncated = dir.path().join("truncated.bin");
    let mut bytes = json_snapshot().to_bitcode_vec();
    bytes.truncate(bytes.len() / 2);
    fs::write(&truncated, bytes).unwrap();
    assert!(matches!(
        InteractionStore::load(&truncated, &StoreConfig::default()),
        Err(SamplerError::DataLoad { .. })
    ));
}

#[test]
fn out_of_range_ids_are_rejected() {
    let mut snapshot = json_snapshot();
    snapshot
        .prefs
        .entry(0)
        .or_default()
        .insert("train".into(), vec![1, 9]);
    assert!(matches!(
        InteractionStore::from_snapshot(snapshot, &StoreConfig::default()),
        Err(SamplerError::DataLoad { .. })
    ));

    let mut snapshot = json_snapshot();
    snapshot.prefs.entry(11).or_default().insert("train".into(), vec![0]);
    assert!(matches!(
        InteractionStore::from_snapshot(snapshot, &StoreConfig::default()),
        Err(SamplerError::DataLoad { .. })
    ));
}
