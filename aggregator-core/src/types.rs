use serde::{Deserialize, Serialize};

/// Event time in milliseconds since epoch.
pub type EventTime = i64;

/// Identifier of one input-log partition.
pub type PartitionId = i32;

/// Position of a record within its partition's log.
pub type Offset = i64;

/// Ownership epoch for a partition assignment. Bumped on every rebalance.
pub type Epoch = u64;

/// Minimum possible event time. Used as the initial "nothing observed" sentinel.
pub const EVENT_TIME_MIN: EventTime = i64::MIN;

/// Maximum possible event time.
pub const EVENT_TIME_MAX: EventTime = i64::MAX;

/// One record read from the input log.
///
/// Immutable once read; ownership moves from the log source into the
/// processing pipeline record by record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub timestamp: EventTime,
    pub partition: PartitionId,
    pub offset: Offset,
}

impl Record {
    pub fn new(
        key: Vec<u8>,
        value: Vec<u8>,
        timestamp: EventTime,
        partition: PartitionId,
        offset: Offset,
    ) -> Self {
        Self {
            key,
            value,
            timestamp,
            partition,
            offset,
        }
    }
}

/// A half-open event-time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId {
    pub start: EventTime,
    pub end: EventTime,
}

impl WindowId {
    /// Create a window. Callers must uphold `end > start`.
    pub fn new(start: EventTime, end: EventTime) -> Self {
        debug_assert!(end > start, "window end must be after start");
        Self { start, end }
    }

    /// Return true if `timestamp` falls inside this window.
    /// The start bound is inclusive, the end bound exclusive.
    pub fn contains(&self, timestamp: EventTime) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// The maximum timestamp that belongs to this window.
    pub fn max_timestamp(&self) -> EventTime {
        self.end - 1
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Uniquely identifies one aggregate-state entry: a business key inside one window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggregateKey {
    pub business_key: Vec<u8>,
    pub window: WindowId,
}

impl AggregateKey {
    pub fn new(business_key: Vec<u8>, window: WindowId) -> Self {
        Self {
            business_key,
            window,
        }
    }
}

/// Running aggregate for one [`AggregateKey`].
///
/// The accumulator is opaque to the store; the aggregator encodes and decodes
/// it with bincode. `emitted` transitions to `true` exactly once, set by the
/// punctuator after the output sink has acknowledged the emission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateState {
    pub accumulator: Vec<u8>,
    pub last_updated: EventTime,
    pub emitted: bool,
}

impl AggregateState {
    /// Fresh state holding an already-encoded accumulator.
    pub fn new(accumulator: Vec<u8>, last_updated: EventTime) -> Self {
        Self {
            accumulator,
            last_updated,
            emitted: false,
        }
    }
}

/// One mutation of the state store, as written to the changelog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub key: AggregateKey,
    pub op: ChangelogOp,
}

/// Upsert carries the full post-mutation state; replay is last-write-wins
/// per key and a tombstone removes the key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangelogOp {
    Upsert(AggregateState),
    Tombstone,
}

impl ChangelogEntry {
    pub fn upsert(key: AggregateKey, state: AggregateState) -> Self {
        Self {
            key,
            op: ChangelogOp::Upsert(state),
        }
    }

    pub fn tombstone(key: AggregateKey) -> Self {
        Self {
            key,
            op: ChangelogOp::Tombstone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_contains_half_open() {
        let w = WindowId::new(0, 60_000);
        assert!(w.contains(0)); // start is inclusive
        assert!(w.contains(59_999));
        assert!(!w.contains(60_000)); // end is exclusive
    }

    #[test]
    fn test_window_max_timestamp() {
        let w = WindowId::new(60_000, 120_000);
        assert_eq!(w.max_timestamp(), 119_999);
    }

    #[test]
    fn test_aggregate_state_starts_unemitted() {
        let state = AggregateState::new(vec![1, 2, 3], 42);
        assert!(!state.emitted);
        assert_eq!(state.last_updated, 42);
    }

    #[test]
    fn test_changelog_entry_roundtrip() {
        let key = AggregateKey::new(b"DE".to_vec(), WindowId::new(0, 60_000));
        let entry = ChangelogEntry::upsert(key.clone(), AggregateState::new(vec![9], 10));
        let bytes = bincode::serialize(&entry).unwrap();
        let back: ChangelogEntry = bincode::deserialize(&bytes).unwrap();
        assert_eq!(entry, back);

        let tomb = ChangelogEntry::tombstone(key);
        assert!(matches!(tomb.op, ChangelogOp::Tombstone));
    }
}
