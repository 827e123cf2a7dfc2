//! Incremental aggregation: the user-supplied fold and its application to
//! the state store.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AggregateError, Result};
use crate::state::StateStore;
use crate::types::{AggregateKey, AggregateState, Record, WindowId};

/// User-supplied incremental aggregation.
///
/// The accumulator is updated once per incoming record, so only O(1) state
/// is kept per (key, window) instead of the record list. `add` is called in
/// arrival order per partition, which is the only ordering guarantee the
/// engine provides; folds must not rely on any cross-partition order.
pub trait FoldFunction<T, ACC, OUT>: Send + Sync {
    /// Create a fresh accumulator for a new (key, window) entry.
    fn create_accumulator(&self) -> ACC;

    /// Fold one record into the accumulator. `event` is the decoded payload
    /// of `record`.
    fn add(&self, acc: &mut ACC, record: &Record, event: &T);

    /// Convert a final accumulator into the emitted result.
    fn get_result(&self, key: &AggregateKey, acc: ACC) -> OUT;
}

/// Applies a [`FoldFunction`] to the state store, one read-modify-write per
/// (record, window) pair.
pub struct Aggregator<T, ACC, OUT> {
    fold: Arc<dyn FoldFunction<T, ACC, OUT>>,
    _phantom: PhantomData<fn(T) -> (ACC, OUT)>,
}

impl<T, ACC, OUT> Aggregator<T, ACC, OUT>
where
    ACC: Serialize + DeserializeOwned,
{
    pub fn new(fold: Arc<dyn FoldFunction<T, ACC, OUT>>) -> Self {
        Self {
            fold,
            _phantom: PhantomData,
        }
    }

    /// Fold `record` into every window it was assigned to.
    ///
    /// For each window: read the current state (or initialize a fresh
    /// accumulator), apply the fold, write back through the store. A record
    /// assigned to N windows produces N store mutations.
    pub fn apply(
        &self,
        store: &mut dyn StateStore,
        record: &Record,
        event: &T,
        business_key: &[u8],
        windows: &[WindowId],
    ) -> Result<()> {
        for window in windows {
            let key = AggregateKey::new(business_key.to_vec(), *window);
            let mut acc = match store.get(&key)? {
                Some(state) => decode_accumulator(&state.accumulator)?,
                None => self.fold.create_accumulator(),
            };
            self.fold.add(&mut acc, record, event);
            let state = AggregateState::new(encode_accumulator(&acc)?, record.timestamp);
            store.put(key, state)?;
        }
        Ok(())
    }

    /// Turn a stored state back into the user-facing result.
    pub fn result_for(&self, key: &AggregateKey, state: &AggregateState) -> Result<OUT> {
        let acc = decode_accumulator(&state.accumulator)?;
        Ok(self.fold.get_result(key, acc))
    }
}

fn encode_accumulator<ACC: Serialize>(acc: &ACC) -> Result<Vec<u8>> {
    bincode::serialize(acc).map_err(|e| AggregateError::StoreIo(format!("encode accumulator: {e}")))
}

fn decode_accumulator<ACC: DeserializeOwned>(bytes: &[u8]) -> Result<ACC> {
    bincode::deserialize(bytes)
        .map_err(|e| AggregateError::StoreIo(format!("decode accumulator: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MemoryChangelog, PartitionStateStore};
    use crate::types::WindowId;

    struct SumFold;

    impl FoldFunction<i64, i64, i64> for SumFold {
        fn create_accumulator(&self) -> i64 {
            0
        }

        fn add(&self, acc: &mut i64, _record: &Record, event: &i64) {
            *acc += *event;
        }

        fn get_result(&self, _key: &AggregateKey, acc: i64) -> i64 {
            acc
        }
    }

    fn record(ts: i64) -> Record {
        Record::new(b"A".to_vec(), Vec::new(), ts, 0, 0)
    }

    #[test]
    fn test_fold_accumulates_in_arrival_order() {
        let aggregator = Aggregator::new(Arc::new(SumFold));
        let mut store = PartitionStateStore::new(MemoryChangelog::new());
        let windows = [WindowId::new(0, 60_000)];

        aggregator
            .apply(&mut store, &record(10_000), &1, b"A", &windows)
            .unwrap();
        aggregator
            .apply(&mut store, &record(40_000), &2, b"A", &windows)
            .unwrap();

        let key = AggregateKey::new(b"A".to_vec(), windows[0]);
        let state = store.get(&key).unwrap().unwrap();
        // fold(fold(0, 1), 2) = 3
        assert_eq!(aggregator.result_for(&key, &state).unwrap(), 3);
        assert_eq!(state.last_updated, 40_000);
        assert!(!state.emitted);
    }

    #[test]
    fn test_record_in_n_windows_mutates_n_entries() {
        let aggregator = Aggregator::new(Arc::new(SumFold));
        let changelog = MemoryChangelog::new();
        let mut store = PartitionStateStore::new(changelog.clone());
        let windows = [WindowId::new(0, 60_000), WindowId::new(30_000, 90_000)];

        aggregator
            .apply(&mut store, &record(45_000), &5, b"A", &windows)
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(changelog.len(), 2);
        for window in windows {
            let key = AggregateKey::new(b"A".to_vec(), window);
            let state = store.get(&key).unwrap().unwrap();
            assert_eq!(aggregator.result_for(&key, &state).unwrap(), 5);
        }
    }

    #[test]
    fn test_keys_are_isolated() {
        let aggregator = Aggregator::new(Arc::new(SumFold));
        let mut store = PartitionStateStore::new(MemoryChangelog::new());
        let windows = [WindowId::new(0, 60_000)];

        aggregator
            .apply(&mut store, &record(1_000), &10, b"A", &windows)
            .unwrap();
        aggregator
            .apply(&mut store, &record(2_000), &20, b"B", &windows)
            .unwrap();

        let key_a = AggregateKey::new(b"A".to_vec(), windows[0]);
        let key_b = AggregateKey::new(b"B".to_vec(), windows[0]);
        let state_a = store.get(&key_a).unwrap().unwrap();
        let state_b = store.get(&key_b).unwrap().unwrap();
        assert_eq!(aggregator.result_for(&key_a, &state_a).unwrap(), 10);
        assert_eq!(aggregator.result_for(&key_b, &state_b).unwrap(), 20);
    }
}
