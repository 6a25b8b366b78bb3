//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check eviction bounds and ordering over random stores.

use bytes::Bytes;
use proptest::prelude::*;
use std::collections::HashSet;

use crate::cache::{
    enforce_limits, CacheKey, CachedEntry, EvictionLimits, MemoryTileStore, TileStore,
};

// == Strategies ==
/// One seeded entry: optional timestamp and body size.
fn seed_strategy() -> impl Strategy<Value = (Option<u64>, usize)> {
    (
        prop_oneof![
            1 => Just(None),
            6 => (1u64..1_000_000).prop_map(Some),
        ],
        0usize..2_000,
    )
}

fn limits_strategy() -> impl Strategy<Value = EvictionLimits> {
    (0u64..40_000, 0usize..40).prop_map(|(max_size_bytes, max_entries)| EvictionLimits {
        max_size_bytes,
        max_entries,
    })
}

fn key(i: usize) -> CacheKey {
    CacheKey::for_url(&format!("https://tiles.example.com/12/{}/7.png", i)).unwrap()
}

fn seeded_store(seeds: &[(Option<u64>, usize)]) -> MemoryTileStore {
    let store = MemoryTileStore::new();
    tokio_test::block_on(async {
        for (i, (stored_at, size)) in seeds.iter().enumerate() {
            let body = Bytes::from(vec![7u8; *size]);
            let entry =
                CachedEntry::new(key(i), 200, "OK", Vec::new(), body).with_stored_at(*stored_at);
            store.put(entry).await.unwrap();
        }
    });
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // After a pass both bounds hold, or the store has been emptied.
    #[test]
    fn prop_bounds_hold_after_eviction(
        seeds in prop::collection::vec(seed_strategy(), 0..60),
        limits in limits_strategy()
    ) {
        let store = seeded_store(&seeds);
        let report = tokio_test::block_on(enforce_limits(&store, limits)).unwrap();

        let remaining: HashSet<usize> = (0..seeds.len())
            .filter(|i| tokio_test::block_on(store.head(&key(*i))).unwrap().is_some())
            .collect();
        let size: u64 = remaining.iter().map(|i| seeds[*i].1 as u64).sum();

        prop_assert_eq!(report.total_count, remaining.len());
        prop_assert_eq!(report.total_size, size);
        prop_assert!(
            !limits.exceeded(size, remaining.len()) || remaining.is_empty(),
            "size {} count {} still over {:?}", size, remaining.len(), limits
        );
    }

    // Every evicted timestamped entry is no newer than every surviving one,
    // and timestamp-less entries only go once no timestamped entry is left.
    #[test]
    fn prop_eviction_is_oldest_first(
        seeds in prop::collection::vec(seed_strategy(), 1..60),
        limits in limits_strategy()
    ) {
        let store = seeded_store(&seeds);
        tokio_test::block_on(enforce_limits(&store, limits)).unwrap();

        let (kept, evicted): (Vec<usize>, Vec<usize>) = (0..seeds.len())
            .partition(|i| tokio_test::block_on(store.head(&key(*i))).unwrap().is_some());

        let newest_evicted = evicted.iter().filter_map(|i| seeds[*i].0).max();
        let oldest_kept = kept.iter().filter_map(|i| seeds[*i].0).min();
        if let (Some(evicted_ts), Some(kept_ts)) = (newest_evicted, oldest_kept) {
            prop_assert!(evicted_ts <= kept_ts);
        }

        let evicted_untimed = evicted.iter().any(|i| seeds[*i].0.is_none());
        let kept_timed = kept.iter().any(|i| seeds[*i].0.is_some());
        prop_assert!(!(evicted_untimed && kept_timed));
    }

    // The pass stops as soon as the bounds are met: the store as it was
    // just before the last deletion still violated them.
    #[test]
    fn prop_eviction_is_minimal(
        seeds in prop::collection::vec(seed_strategy(), 1..60),
        limits in limits_strategy()
    ) {
        let store = seeded_store(&seeds);
        let report = tokio_test::block_on(enforce_limits(&store, limits)).unwrap();

        if report.evicted > 0 {
            let largest_victim = (0..seeds.len())
                .filter(|i| tokio_test::block_on(store.head(&key(*i))).unwrap().is_none())
                .map(|i| seeds[i].1 as u64)
                .max()
                .unwrap_or(0);
            prop_assert!(
                limits.exceeded(report.total_size + largest_victim, report.total_count + 1)
            );
        }
    }

    // Stored bodies come back byte for byte.
    #[test]
    fn prop_roundtrip_body(body in prop::collection::vec(any::<u8>(), 0..4096)) {
        let store = MemoryTileStore::new();
        let entry = CachedEntry::new(key(0), 200, "OK", Vec::new(), Bytes::from(body.clone()));
        tokio_test::block_on(store.put(entry)).unwrap();

        let fetched = tokio_test::block_on(store.get(&key(0))).unwrap().unwrap();
        prop_assert_eq!(fetched.body.as_ref(), body.as_slice());
    }
}
