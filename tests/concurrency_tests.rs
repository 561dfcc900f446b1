//! Parallel writers, parallel sync and registry contention

mod common;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Barrier};
use std::thread;

use common::*;

#[test]
fn parallel_sync_persists_every_count() {
    let t = TestDb::new();
    let mut expected = BTreeMap::new();
    for i in 0..8usize {
        let name = format!("col{}", i);
        let collection = t.db.add_collection(&name).unwrap();
        fill(&collection, i * 13 + 1, 32);
        expected.insert(name, (i * 13 + 1) as u64);
    }

    let report = t.sync_clean();
    assert_eq!(report.synced.len(), 8);

    let loaded = t.reload().unwrap();
    for (name, count) in &expected {
        let collection = loaded.get_collection(name).unwrap();
        assert_eq!(collection.size(), *count, "{}", name);
        assert_eq!(collection.descriptor().objects, *count, "{}", name);
    }
}

#[test]
fn concurrent_inserts_get_unique_ids() {
    let t = TestDb::new();
    let items = t.db.add_collection("items").unwrap();
    let threads = 8;
    let per_thread = 200;
    let barrier = Arc::new(Barrier::new(threads));

    let ids: Vec<u64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|n| {
                let items = Arc::clone(&items);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    barrier.wait();
                    (0..per_thread)
                        .map(|i| items.insert(format!("{}:{}", n, i).into_bytes()).unwrap())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), threads * per_thread);
    assert_eq!(items.size(), (threads * per_thread) as u64);
    assert_eq!(*unique.iter().max().unwrap(), (threads * per_thread) as u64);
}

#[test]
fn sync_while_writing_loads_consistently() {
    let t = TestDb::new();
    let items = t.db.add_collection("items").unwrap();
    fill(&items, 100, 16);

    thread::scope(|scope| {
        let writer = scope.spawn(|| {
            for i in 0..500u64 {
                items.put(i % 150, vec![7u8; 16]).unwrap();
            }
        });
        for _ in 0..5 {
            t.sync_clean();
        }
        writer.join().unwrap();
    });
    t.sync_clean();

    let loaded = t.reload().unwrap();
    let reloaded = loaded.get_collection("items").unwrap();
    assert_eq!(reloaded.size(), items.size());
    assert_eq!(reloaded.ids(), items.ids());
}

#[test]
fn concurrent_add_collection_registers_once() {
    let t = TestDb::new();
    let successes: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| t.db.add_collection("shared").is_ok()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum()
    });

    assert_eq!(successes, 1);
    assert_eq!(t.db.collections_count(), 1);
}

#[test]
fn readers_run_alongside_sync() {
    let t = TestDb::new();
    for name in ["a", "b", "c"] {
        let collection = t.db.add_collection(name).unwrap();
        fill(&collection, 50, 8);
    }

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            for _ in 0..200 {
                assert_eq!(t.db.total_objects_count(), 150);
                assert!(t.db.random_collection().is_ok());
            }
        });
        for _ in 0..3 {
            t.sync_clean();
        }
        reader.join().unwrap();
    });
}
