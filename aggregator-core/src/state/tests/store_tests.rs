use super::*;
use crate::types::WindowId;

fn key(business: &[u8], start: EventTime, end: EventTime) -> AggregateKey {
    AggregateKey::new(business.to_vec(), WindowId::new(start, end))
}

fn state(acc: &[u8], updated: EventTime) -> AggregateState {
    AggregateState::new(acc.to_vec(), updated)
}

#[test]
fn test_put_get_delete() {
    let mut store = PartitionStateStore::new(MemoryChangelog::new());
    let k = key(b"DE", 0, 60_000);

    assert_eq!(store.get(&k).unwrap(), None);

    store.put(k.clone(), state(b"acc1", 10)).unwrap();
    assert_eq!(store.get(&k).unwrap(), Some(state(b"acc1", 10)));

    store.put(k.clone(), state(b"acc2", 20)).unwrap();
    assert_eq!(store.get(&k).unwrap(), Some(state(b"acc2", 20)));
    assert_eq!(store.len(), 1);

    store.delete(&k).unwrap();
    assert_eq!(store.get(&k).unwrap(), None);
    assert!(store.is_empty());
}

#[test]
fn test_every_mutation_reaches_the_changelog_first() {
    let changelog = MemoryChangelog::new();
    let mut store = PartitionStateStore::new(changelog.clone());
    let k = key(b"DE", 0, 60_000);

    store.put(k.clone(), state(b"a", 1)).unwrap();
    store.put(k.clone(), state(b"b", 2)).unwrap();
    store.delete(&k).unwrap();

    // Two upserts and one tombstone, in mutation order.
    assert_eq!(changelog.len(), 3);
}

#[test]
fn test_scan_expired_returns_only_ended_windows() {
    let mut store = PartitionStateStore::new(MemoryChangelog::new());
    store.put(key(b"A", 0, 60_000), state(b"1", 1)).unwrap();
    store.put(key(b"B", 0, 60_000), state(b"2", 2)).unwrap();
    store
        .put(key(b"A", 60_000, 120_000), state(b"3", 3))
        .unwrap();

    // Stream time 59_999: nothing has ended yet.
    assert!(store.scan_expired(59_999).is_empty());

    // Stream time 60_000: the [0, 60s) windows are complete.
    let expired = store.scan_expired(60_000);
    assert_eq!(expired.len(), 2);
    assert!(expired.iter().all(|k| k.window.end == 60_000));

    // Stream time 120_000: everything is complete.
    assert_eq!(store.scan_expired(120_000).len(), 3);
}

#[test]
fn test_scan_expired_cost_tracks_open_windows() {
    let mut store = PartitionStateStore::new(MemoryChangelog::new());
    // Many historical keys, all already deleted.
    for i in 0..1_000i64 {
        let k = key(format!("k{i}").as_bytes(), 0, 60_000);
        store.put(k.clone(), state(b"x", i)).unwrap();
        store.delete(&k).unwrap();
    }
    store.put(key(b"live", 0, 60_000), state(b"y", 1)).unwrap();

    // Deleted keys are gone from the expiry index, not just the main index.
    assert_eq!(store.scan_expired(60_000), vec![key(b"live", 0, 60_000)]);
}

#[test]
fn test_recover_rebuilds_identical_state() {
    let changelog = MemoryChangelog::new();
    let mut store = PartitionStateStore::new(changelog.clone());

    store.put(key(b"A", 0, 60_000), state(b"a1", 10)).unwrap();
    store.put(key(b"A", 0, 60_000), state(b"a2", 40)).unwrap();
    store
        .put(key(b"B", 60_000, 120_000), state(b"b1", 65))
        .unwrap();
    store.put(key(b"C", 0, 60_000), state(b"c1", 20)).unwrap();
    store.delete(&key(b"C", 0, 60_000)).unwrap();

    // Crash: drop the store, keep the changelog.
    drop(store);
    let recovered = PartitionStateStore::recover(changelog).unwrap();

    // Latest value per key wins, tombstoned keys stay gone.
    assert_eq!(recovered.len(), 2);
    assert_eq!(
        recovered.get(&key(b"A", 0, 60_000)).unwrap(),
        Some(state(b"a2", 40))
    );
    assert_eq!(
        recovered.get(&key(b"B", 60_000, 120_000)).unwrap(),
        Some(state(b"b1", 65))
    );
    assert_eq!(recovered.get(&key(b"C", 0, 60_000)).unwrap(), None);

    // The expiry index is rebuilt too.
    assert_eq!(recovered.scan_expired(60_000).len(), 1);
    assert_eq!(recovered.scan_expired(120_000).len(), 2);
}

#[test]
fn test_recover_from_empty_changelog() {
    let store = PartitionStateStore::recover(MemoryChangelog::new()).unwrap();
    assert!(store.is_empty());
    assert!(store.scan_expired(EventTime::MAX).is_empty());
}
