//! # Property-Based Tests
//!
//! Delivery and idempotence invariants checked with proptest.

use kettle_core::{Manifest, RowId, Store, StoreError};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn open_store() -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().expect("temp dir");
    let store = Store::open(temp.path().join("kettle.redb")).expect("open");
    (temp, store)
}

fn pending_ids(store: &Store, cursor: &str) -> Vec<RowId> {
    store
        .pending_builds(cursor, "logs/", 0)
        .expect("pending")
        .map(|build| build.map(|b| b.row_id))
        .collect::<Result<Vec<_>, StoreError>>()
        .expect("decode")
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// However commits are split, every finished build is delivered once.
    #[test]
    fn every_build_delivered_exactly_once(
        finish_times in vec(0i64..1_000, 1..30),
        batch in 1usize..8,
    ) {
        let (_temp, store) = open_store();
        {
            let mut writer = store.writer();
            for (i, time) in finish_times.iter().enumerate() {
                let started = Manifest::new().with("timestamp", *time);
                let finished = Manifest::new().with("timestamp", *time + 10);
                writer
                    .upsert_build(&format!("logs/ci-unit/{i}"), Some(&started), Some(&finished))
                    .expect("upsert");
            }
        }

        let mut seen = BTreeSet::new();
        loop {
            let ids: Vec<RowId> = pending_ids(&store, "cursorA").into_iter().take(batch).collect();
            if ids.is_empty() {
                break;
            }
            for id in &ids {
                prop_assert!(seen.insert(*id), "row {} delivered twice", id);
            }
            store.commit_emitted("cursorA", &ids).expect("commit");
        }

        prop_assert_eq!(seen.len(), finish_times.len());
        prop_assert_eq!(pending_ids(&store, "cursorB").len(), finish_times.len());
    }

    /// Pending builds come out in finished-time order.
    #[test]
    fn pending_ordered_by_finished_time(finish_times in vec(0i64..1_000, 1..30)) {
        let (_temp, store) = open_store();
        {
            let mut writer = store.writer();
            for (i, time) in finish_times.iter().enumerate() {
                let started = Manifest::new().with("timestamp", 0);
                let finished = Manifest::new().with("timestamp", *time);
                writer
                    .upsert_build(&format!("logs/ci-unit/{i}"), Some(&started), Some(&finished))
                    .expect("upsert");
            }
        }

        let times: Vec<i64> = store
            .pending_builds("cursorA", "logs/", 0)
            .expect("pending")
            .map(|build| build.expect("decode").finished_time.expect("finished"))
            .collect();
        let mut sorted = times.clone();
        sorted.sort_unstable();
        prop_assert_eq!(times, sorted);
    }

    /// Re-ingesting an unchanged build never allocates a new row.
    #[test]
    fn repeated_upsert_keeps_row(
        started_at in 0i64..1_000_000,
        result in "[A-Z]{4,8}",
        repeats in 1usize..5,
    ) {
        let (_temp, store) = open_store();
        let mut writer = store.writer();
        let started = Manifest::new().with("timestamp", started_at);
        let finished = Manifest::new()
            .with("timestamp", started_at + 60)
            .with("result", result);

        let first = writer
            .upsert_build("logs/ci-unit/1", Some(&started), Some(&finished))
            .expect("upsert")
            .row_id();
        for _ in 0..repeats {
            let again = writer
                .upsert_build("logs/ci-unit/1", Some(&started), Some(&finished))
                .expect("upsert")
                .row_id();
            prop_assert_eq!(again, first);
        }
        drop(writer);
        prop_assert_eq!(store.build_count().expect("count"), 1);
    }
}
