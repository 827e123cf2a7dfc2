//! Input-log boundary.
//!
//! The transport to the real broker lives outside this crate; the engine
//! sees an ordered, partitioned, at-least-once log consumed with
//! poll/commit semantics. Progress is committed only after the local state
//! mutation for a record is durable.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use ahash::AHasher;

use crate::error::{AggregateError, Result};
use crate::types::{EventTime, Offset, PartitionId, Record};

/// Route a record key to an input partition, the way the producer side of
/// the log does. Equal keys always land on the same partition, which is
/// what makes per-key aggregation correct under partition parallelism.
pub fn partition_for_key(key: &[u8], num_partitions: usize) -> PartitionId {
    let mut hasher = AHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() as usize % num_partitions) as PartitionId
}

/// One partition's view of the input log.
pub trait LogSource: Send {
    /// Fetch up to `max_records` records in offset order. An empty result
    /// means no records are currently available.
    fn poll(&mut self, max_records: usize) -> Result<Vec<Record>>;

    /// Mark everything up to and including `offset` as processed. Records at
    /// or before a committed offset are not redelivered after restart.
    fn commit(&mut self, offset: Offset) -> Result<()>;
}

/// In-memory log source for tests and the demo runner.
///
/// Clones share the same queue: one side pushes records, the partition
/// worker polls them.
#[derive(Clone)]
pub struct MemoryLogSource {
    partition: PartitionId,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    queue: VecDeque<Record>,
    next_offset: Offset,
    committed: Option<Offset>,
}

impl MemoryLogSource {
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            inner: Arc::new(Mutex::new(Inner {
                queue: VecDeque::new(),
                next_offset: 0,
                committed: None,
            })),
        }
    }

    /// Append one record, assigning it the next offset.
    pub fn push(&self, key: Vec<u8>, value: Vec<u8>, timestamp: EventTime) -> Offset {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let offset = inner.next_offset;
        inner.next_offset += 1;
        let partition = self.partition;
        inner
            .queue
            .push_back(Record::new(key, value, timestamp, partition, offset));
        offset
    }

    /// The highest committed offset, if any progress has been committed.
    pub fn committed(&self) -> Option<Offset> {
        self.inner.lock().ok().and_then(|inner| inner.committed)
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }
}

impl LogSource for MemoryLogSource {
    fn poll(&mut self, max_records: usize) -> Result<Vec<Record>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| AggregateError::StoreIo("input log lock poisoned".into()))?;
        let n = max_records.min(inner.queue.len());
        Ok(inner.queue.drain(..n).collect())
    }

    fn commit(&mut self, offset: Offset) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| AggregateError::StoreIo("input log lock poisoned".into()))?;
        if inner.committed.map_or(true, |c| offset > c) {
            inner.committed = Some(offset);
        }
        Ok(())
    }
}
