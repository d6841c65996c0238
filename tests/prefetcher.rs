use std::sync::Arc;
use std::thread;

use rank_triplets::{
    Batch, BatchSampler, EpochConfig, EpochPrefetcher, InteractionStore, ItemId, Snapshot,
    StoreConfig,
};

fn shared_store() -> Arc<InteractionStore> {
    let mut snapshot = Snapshot {
        users: 5,
        ..Snapshot::default()
    };
    for item in 0..8u32 {
        snapshot.popularity.insert(item, (item + 1) as f32 / 8.0);
    }
    let prefs: [(u32, &[ItemId]); 5] = [
        (0, &[0, 1, 2]),
        (1, &[2, 3]),
        (2, &[4, 5, 6]),
        (3, &[7, 0]),
        (4, &[1, 3, 5, 7]),
    ];
    for (user, items) in prefs {
        snapshot
            .prefs
            .entry(user)
            .or_default()
            .insert("train".into(), items.to_vec());
    }
    Arc::new(InteractionStore::from_snapshot(snapshot, &StoreConfig::default()).unwrap())
}

fn drain(prefetcher: &EpochPrefetcher) -> Vec<Batch> {
    let mut batches = Vec::new();
    while let Some(batch) = prefetcher.next() {
        batches.push(batch.unwrap());
    }
    batches
}

#[test]
fn prefetcher_matches_inline_epoch() {
    let store = shared_store();
    let config = EpochConfig {
        batch_size: 3,
        with_neighborhood: true,
        neg_per_pos: 3,
        use_popularity: true,
    };
    let prefetcher = EpochPrefetcher::spawn(Arc::clone(&store), config, 17, 2);
    let prefetched = drain(&prefetcher);
    prefetcher.shutdown().unwrap();

    let inline: Vec<Batch> = BatchSampler::new(&store, 17)
        .epoch(config)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(prefetched, inline);
    assert_eq!(
        prefetched.iter().map(Batch::len).sum::<usize>(),
        store.train_size() * 3
    );
}

#[test]
fn concurrent_epochs_share_the_store_without_interference() {
    let store = shared_store();
    let config = EpochConfig {
        batch_size: 4,
        with_neighborhood: true,
        neg_per_pos: 2,
        use_popularity: false,
    };

    let handles: Vec<_> = (0..4u64)
        .map(|seed| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut sampler = BatchSampler::new(&store, seed);
                sampler
                    .epoch(config)
                    .unwrap()
                    .collect::<Result<Vec<Batch>, _>>()
                    .unwrap()
            })
        })
        .collect();

    for (seed, handle) in handles.into_iter().enumerate() {
        let threaded = handle.join().unwrap();
        let expected: Vec<Batch> = BatchSampler::new(&store, seed as u64)
            .epoch(config)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(threaded, expected);
        for batch in &threaded {
            for row in &batch.triples().rows {
                assert!(!store.is_positive(row[0], row[2]));
            }
        }
    }
}

#[test]
fn prefetcher_reports_configuration_errors() {
    let store = shared_store();
    let config = EpochConfig {
        batch_size: 0,
        ..EpochConfig::default()
    };
    let prefetcher = EpochPrefetcher::spawn(store, config, 1, 1);
    assert!(matches!(prefetcher.next(), Some(Err(_))));
    assert!(prefetcher.next().is_none());
    assert_eq!(prefetcher.error_count(), 1);
    assert_eq!(prefetcher.produced_count(), 0);
}

#[test]
fn shutdown_mid_epoch_joins_worker() {
    let store = shared_store();
    let config = EpochConfig {
        batch_size: 1,
        neg_per_pos: 8,
        ..EpochConfig::default()
    };
    let prefetcher = EpochPrefetcher::spawn(store, config, 2, 1);
    let first = prefetcher.next().unwrap().unwrap();
    assert_eq!(first.len(), 1);
    prefetcher.shutdown().unwrap();
}
